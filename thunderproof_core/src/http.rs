//! HTTP 查询：NIP-05 标识校验、NIP-11 中继信息

use crate::error::{Error, Result};
use crate::keys::PublicKey;
use crate::types::RelayInfo;
use reqwest::{header, Client, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Nip05Response {
    #[serde(default)]
    names: HashMap<String, String>,
}

/// 拆分 `name@domain`，只有域名时名称为 `_`
fn split_nip05(nip05: &str) -> Result<(String, String)> {
    let nip05 = nip05.trim().to_lowercase();
    let (name, domain) = match nip05.split_once('@') {
        Some((name, domain)) => (name.to_string(), domain.to_string()),
        None => ("_".to_string(), nip05),
    };
    if name.is_empty() || domain.is_empty() || domain.contains('/') {
        return Err(Error::InvalidParam(format!("Invalid NIP-05 identifier: {}", name + "@" + &domain)));
    }
    Ok((name, domain))
}

/// `https://<domain>/.well-known/nostr.json?name=<name>`
pub fn nip05_url(nip05: &str) -> Result<String> {
    let (name, domain) = split_nip05(nip05)?;
    let mut url = Url::parse(&format!("https://{}/.well-known/nostr.json", domain))
        .map_err(|e| Error::InvalidParam(e.to_string()))?;
    url.query_pairs_mut().append_pair("name", &name);
    Ok(url.to_string())
}

/// 中继 WebSocket 地址对应的 HTTP 地址
pub fn relay_info_url(relay: &str) -> Result<String> {
    let mut url = Url::parse(relay).map_err(|e| Error::InvalidParam(format!("Invalid relay URL {}: {}", relay, e)))?;
    let scheme = match url.scheme() {
        "wss" => "https",
        "ws" => "http",
        other => return Err(Error::InvalidParam(format!("Unsupported relay scheme: {}", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::InvalidParam(format!("Cannot convert {} to HTTP", relay)))?;
    Ok(url.to_string())
}

/// HTTP 客户端
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    http_client: Client,
}

impl HttpDirectory {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { http_client })
    }

    /// 检查 NIP-05 标识是否指向该公钥
    pub async fn verify_nip05(&self, nip05: &str, pubkey: &PublicKey) -> Result<bool> {
        let (name, _) = split_nip05(nip05)?;
        let url = nip05_url(nip05)?;
        debug!("Verifying NIP-05 via {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to connect to {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("HTTP {} from {}", status, url)));
        }

        let body: Nip05Response = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse response from {}: {}", url, e)))?;

        Ok(body
            .names
            .get(&name)
            .map_or(false, |hex| hex.eq_ignore_ascii_case(&pubkey.to_hex())))
    }

    /// 获取 NIP-11 中继信息
    pub async fn relay_info(&self, relay: &str) -> Result<RelayInfo> {
        let url = relay_info_url(relay)?;
        let response = self
            .http_client
            .get(&url)
            .header(header::ACCEPT, "application/nostr+json")
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to connect to {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("HTTP {} from {}", status, url)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse response from {}: {}", url, e)))
    }
}
