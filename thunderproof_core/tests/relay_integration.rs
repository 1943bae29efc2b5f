//! 集成测试 - 连接进程内的模拟中继

use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thunderproof_core::event::KIND_METADATA;
use thunderproof_core::profile::ABOUT_UNAVAILABLE;
use thunderproof_core::relay::{ClientMessage, RelayMessage};
use thunderproof_core::{
    ClientConfig, Error, Event, Filter, Keys, RelayTransport, ReviewDraft, ThunderproofClient, UnsignedEvent,
    WsTransport,
};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    /// 正常应答并保存事件
    Normal,
    /// 拒绝所有发布
    Reject,
    /// 接受连接但从不应答
    Silent,
    /// 发送事件后在 EOSE 之前断开
    Hangup,
}

struct FakeRelay {
    url: String,
    stored: Arc<Mutex<Vec<Event>>>,
}

async fn spawn_relay(mode: Mode, initial: Vec<Event>) -> FakeRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let stored = Arc::new(Mutex::new(initial));

    let shared = stored.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let stored = shared.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else { return };
                while let Some(Ok(frame)) = ws.next().await {
                    let Message::Text(text) = frame else { continue };
                    let Ok(Some(msg)) = ClientMessage::parse(text.as_str()) else { continue };
                    if mode == Mode::Silent {
                        continue;
                    }

                    let replies = match msg {
                        ClientMessage::Req { subscription_id, filter } => {
                            let mut replies: Vec<RelayMessage> = stored
                                .lock()
                                .unwrap()
                                .iter()
                                .filter(|e| filter.matches(e))
                                .map(|e| RelayMessage::Event {
                                    subscription_id: subscription_id.clone(),
                                    event: e.clone(),
                                })
                                .collect();
                            if mode != Mode::Hangup {
                                replies.push(RelayMessage::Eose { subscription_id });
                            }
                            replies
                        }
                        ClientMessage::Event(event) => {
                            let accepted = mode == Mode::Normal;
                            if accepted {
                                stored.lock().unwrap().push(event.clone());
                            }
                            vec![RelayMessage::Ok {
                                event_id: event.id,
                                accepted,
                                message: if accepted { String::new() } else { "blocked: test relay".into() },
                            }]
                        }
                        ClientMessage::Close { .. } => vec![],
                    };

                    for reply in replies {
                        if ws.send(Message::Text(reply.to_json().unwrap().into())).await.is_err() {
                            return;
                        }
                    }
                    if mode == Mode::Hangup {
                        let _ = ws.close(None).await;
                        return;
                    }
                }
            });
        }
    });

    FakeRelay { url, stored }
}

/// 没有监听者的地址
async fn unreachable_relay() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

fn config(relays: Vec<String>) -> ClientConfig {
    ClientConfig {
        relays,
        query_timeout: Duration::from_millis(500),
        publish_timeout: Duration::from_millis(300),
        ..Default::default()
    }
}

fn metadata(keys: &Keys, created_at: u64, content: &str) -> Event {
    let mut unsigned = UnsignedEvent::new(keys.public_key(), KIND_METADATA, vec![], content);
    unsigned.created_at = created_at;
    unsigned.sign(keys).unwrap()
}

fn review_event(author: &Keys, target: &Keys, rating: u8, created_at: u64) -> Event {
    let mut unsigned = ReviewDraft::new(rating, format!("{} stars from the relay", rating))
        .to_event(author.public_key(), &target.public_key())
        .unwrap();
    unsigned.created_at = created_at;
    unsigned.sign(author).unwrap()
}

#[tokio::test]
async fn test_search_loads_profile_and_reviews() {
    let target = Keys::generate();
    let alice = Keys::generate();
    let bob = Keys::generate();

    let relay_a = spawn_relay(
        Mode::Normal,
        vec![
            metadata(&target, 100, r#"{"name":"Old Shop"}"#),
            review_event(&alice, &target, 5, 1_000),
        ],
    )
    .await;
    let relay_b = spawn_relay(
        Mode::Normal,
        vec![
            metadata(&target, 200, r#"{"name":"Lightning Shop","about":"Bitcoin only"}"#),
            review_event(&alice, &target, 5, 1_000),
            review_event(&bob, &target, 4, 2_000),
        ],
    )
    .await;

    let client = ThunderproofClient::new(config(vec![relay_a.url, relay_b.url])).unwrap();
    let profile = client.search(&target.public_key().to_npub()).await.unwrap();

    assert_eq!(profile.name, "Lightning Shop");
    assert_eq!(profile.about, "Bitcoin only");

    let reviews = client.current_reviews().await;
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0].author, bob.public_key().to_hex());
    assert!(reviews.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let stats = client.stats().await;
    assert_eq!(stats.average, 4.5);
    assert_eq!(stats.breakdown[0].percentage, 50.0);
}

#[tokio::test]
async fn test_silent_relays_fall_back_to_placeholder() {
    let mut relays = Vec::new();
    for _ in 0..5 {
        relays.push(spawn_relay(Mode::Silent, vec![]).await.url);
    }
    let client = ThunderproofClient::new(config(relays)).unwrap();

    let npub = Keys::generate().public_key().to_npub();
    let profile = client.search(&npub).await.unwrap();
    assert_eq!(profile.about, ABOUT_UNAVAILABLE);
    assert_eq!(profile.name, format!("{}...", &npub[..16]));
    assert!(client.current_reviews().await.is_empty());
}

#[tokio::test]
async fn test_publish_succeeds_with_one_ack() {
    let target = Keys::generate();
    let rejecting = spawn_relay(Mode::Reject, vec![]).await;
    let accepting = spawn_relay(Mode::Normal, vec![]).await;
    let dead = unreachable_relay().await;

    let relays = vec![rejecting.url.clone(), accepting.url.clone(), dead];
    let client = ThunderproofClient::new(config(relays)).unwrap();
    client.search(&target.public_key().to_npub()).await.unwrap();
    client.generate_keys().await.unwrap();

    let report = client
        .submit_review(&ReviewDraft::new(5, "Outstanding experience"))
        .await
        .unwrap();
    assert_eq!(report.accepted, vec![accepting.url.clone()]);
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(accepting.stored.lock().unwrap().len(), 1);
    assert!(rejecting.stored.lock().unwrap().is_empty());

    let reviews = client.current_reviews().await;
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].content, "Outstanding experience");
    assert_eq!(reviews[0].id, report.event_id);
}

#[tokio::test]
async fn test_publish_fails_when_nobody_acks() {
    let target = Keys::generate();
    let rejecting = spawn_relay(Mode::Reject, vec![]).await;
    let silent = spawn_relay(Mode::Silent, vec![]).await;
    let dead = unreachable_relay().await;

    let client = ThunderproofClient::new(config(vec![rejecting.url, silent.url, dead])).unwrap();
    client.search(&target.public_key().to_npub()).await.unwrap_or_else(|e| panic!("search: {}", e));
    client.generate_keys().await.unwrap();

    let result = client.submit_review(&ReviewDraft::new(2, "Slow support")).await;
    match result {
        Err(Error::AllRelaysFailed(reasons)) => {
            assert!(reasons.contains("blocked: test relay"));
            assert!(reasons.contains("timed out"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_hangup_before_eose_is_an_error() {
    let target = Keys::generate();
    let relay = spawn_relay(Mode::Hangup, vec![metadata(&target, 100, r#"{"name":"Partial"}"#)]).await;

    let filter = Filter::new().kind(KIND_METADATA).author(&target.public_key());
    match WsTransport::new().query(&relay.url, &filter).await {
        Err(Error::Relay { relay: url, message }) => {
            assert_eq!(url, relay.url);
            assert!(message.contains("before EOSE"));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let client = ThunderproofClient::new(config(vec![relay.url.clone()])).unwrap();
    let profile = client.search(&target.public_key().to_npub()).await.unwrap();
    assert_eq!(profile.about, ABOUT_UNAVAILABLE);
}
