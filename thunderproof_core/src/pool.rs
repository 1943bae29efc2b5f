//! 多中继查询与发布
//!
//! - 查询：并发请求所有中继，整体受 `query_timeout` 限制
//! - 发布：向每个中继独立发布，各自受 `publish_timeout` 限制，至少一个确认即成功

use crate::error::{Error, Result};
use crate::event::{Event, Filter};
use crate::relay::RelayTransport;
use crate::types::PublishReport;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 中继池
#[derive(Clone)]
pub struct RelayPool {
    relays: Vec<String>,
    transport: Arc<dyn RelayTransport>,
    query_timeout: Duration,
    publish_timeout: Duration,
}

impl RelayPool {
    pub fn new(
        relays: Vec<String>,
        transport: Arc<dyn RelayTransport>,
        query_timeout: Duration,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            relays,
            transport,
            query_timeout,
            publish_timeout,
        }
    }

    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    /// 查询所有中继，返回通过校验且去重后的事件
    pub async fn query(&self, filter: &Filter) -> Result<Vec<Event>> {
        if self.relays.is_empty() {
            return Err(Error::InvalidState("No relays configured".to_string()));
        }

        let attempts = join_all(self.relays.iter().map(|relay| async move {
            (relay.as_str(), self.transport.query(relay, filter).await)
        }));

        let results = tokio::time::timeout(self.query_timeout, attempts)
            .await
            .map_err(|_| Error::Timeout(format!("relay query exceeded {:?}", self.query_timeout)))?;

        let mut seen = HashSet::new();
        let mut events = Vec::new();
        let mut failures = Vec::new();

        for (relay, result) in results {
            let batch = match result {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Query failed on {}: {}", relay, e);
                    failures.push(format!("{}: {}", relay, e));
                    continue;
                }
            };

            for event in batch {
                if !filter.matches(&event) {
                    debug!("Dropping event {} from {}: does not match filter", event.id, relay);
                    continue;
                }
                if let Err(e) = event.verify() {
                    warn!("Dropping invalid event from {}: {}", relay, e);
                    continue;
                }
                if seen.insert(event.id.clone()) {
                    events.push(event);
                }
            }
        }

        if failures.len() == self.relays.len() {
            return Err(Error::AllRelaysFailed(failures.join("; ")));
        }

        debug!("Query returned {} unique events", events.len());
        Ok(events)
    }

    /// 向所有中继发布同一事件
    pub async fn publish(&self, event: &Event) -> Result<PublishReport> {
        if self.relays.is_empty() {
            return Err(Error::InvalidState("No relays configured".to_string()));
        }

        let attempts = self.relays.iter().map(|relay| async move {
            let outcome = match tokio::time::timeout(self.publish_timeout, self.transport.publish(relay, event)).await {
                Ok(Ok(ack)) if ack.accepted => Ok(()),
                Ok(Ok(ack)) => Err(format!("rejected: {}", ack.message)),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("timed out after {:?}", self.publish_timeout)),
            };
            (relay.clone(), outcome)
        });

        let mut report = PublishReport {
            event_id: event.id.clone(),
            ..Default::default()
        };

        for (relay, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => {
                    debug!("Event {} accepted by {}", event.id, relay);
                    report.accepted.push(relay);
                }
                Err(reason) => {
                    warn!("Publish to {} failed: {}", relay, reason);
                    report.rejected.push((relay, reason));
                }
            }
        }

        if !report.is_success() {
            let reasons: Vec<String> = report
                .rejected
                .iter()
                .map(|(relay, reason)| format!("{}: {}", relay, reason))
                .collect();
            return Err(Error::AllRelaysFailed(reasons.join("; ")));
        }

        info!(
            "Event {} published to {}/{} relays",
            event.id,
            report.accepted.len(),
            self.relays.len()
        );
        Ok(report)
    }
}
