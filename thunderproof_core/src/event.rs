//! Nostr 事件 (NIP-01)
//!
//! 事件 ID = SHA-256(`[0, pubkey, created_at, kind, tags, content]`)，
//! 签名为对 ID 的 BIP-340 Schnorr 签名。

use crate::error::{Error, Result};
use crate::keys::{Keys, PublicKey};
use secp256k1::{schnorr, Message, SECP256K1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 元数据事件
pub const KIND_METADATA: u32 = 0;
/// NIP-32 标签事件，评价使用此类型
pub const KIND_LABEL: u32 = 1985;

/// 当前 Unix 时间（秒）
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// 已签名事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl Event {
    /// 作者公钥
    pub fn author(&self) -> Result<PublicKey> {
        PublicKey::from_hex(&self.pubkey)
    }

    /// 查找第一个名称为 `name` 的标签，返回其第一个值
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    /// 是否存在与 `values` 前缀相同的标签
    pub fn has_tag(&self, values: &[&str]) -> bool {
        self.tags.iter().any(|t| {
            t.len() >= values.len() && t.iter().zip(values).all(|(a, b)| a == b)
        })
    }

    /// 校验事件 ID 和签名
    pub fn verify(&self) -> Result<()> {
        let author = self.author()?;
        let expected = compute_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        if hex::encode(expected) != self.id.to_lowercase() {
            return Err(Error::Crypto(format!("event id mismatch: {}", self.id)));
        }

        let sig_bytes = hex::decode(&self.sig).map_err(|e| Error::Encoding(e.to_string()))?;
        let sig = schnorr::Signature::from_slice(&sig_bytes).map_err(|e| Error::Crypto(e.to_string()))?;
        let msg = Message::from_digest(expected);
        SECP256K1
            .verify_schnorr(&sig, &msg, author.inner())
            .map_err(|e| Error::Crypto(format!("bad signature on {}: {}", self.id, e)))
    }
}

/// 待签名事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    pub pubkey: PublicKey,
    pub created_at: u64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl UnsignedEvent {
    pub fn new(pubkey: PublicKey, kind: u32, tags: Vec<Vec<String>>, content: impl Into<String>) -> Self {
        Self {
            pubkey,
            created_at: unix_now(),
            kind,
            tags,
            content: content.into(),
        }
    }

    /// 事件 ID (十六进制)
    pub fn id(&self) -> Result<String> {
        compute_id(&self.pubkey.to_hex(), self.created_at, self.kind, &self.tags, &self.content)
            .map(hex::encode)
    }

    /// 使用本地密钥签名
    pub fn sign(self, keys: &Keys) -> Result<Event> {
        if keys.public_key() != self.pubkey {
            return Err(Error::InvalidState("signing key does not match event pubkey".to_string()));
        }
        let pubkey = self.pubkey.to_hex();
        let digest = compute_id(&pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        let sig = SECP256K1.sign_schnorr(&Message::from_digest(digest), keys.keypair());

        Ok(Event {
            id: hex::encode(digest),
            pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig: hex::encode(sig.serialize()),
        })
    }

    /// 外部签名器使用的 JSON 形式（不含 id 和 sig）
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "pubkey": self.pubkey.to_hex(),
            "created_at": self.created_at,
            "kind": self.kind,
            "tags": self.tags,
            "content": self.content,
        })
    }
}

fn compute_id(pubkey: &str, created_at: u64, kind: u32, tags: &[Vec<String>], content: &str) -> Result<[u8; 32]> {
    let serialized = serde_json::to_string(&serde_json::json!([0, pubkey, created_at, kind, tags, content]))?;
    Ok(Sha256::digest(serialized.as_bytes()).into())
}

/// 订阅过滤器
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub kinds: Vec<u32>,
    #[serde(rename = "#p", skip_serializing_if = "Vec::is_empty", default)]
    pub p_tags: Vec<String>,
    #[serde(rename = "#L", skip_serializing_if = "Vec::is_empty", default)]
    pub label_namespaces: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn author(mut self, pubkey: &PublicKey) -> Self {
        self.authors.push(pubkey.to_hex());
        self
    }

    pub fn kind(mut self, kind: u32) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn pubkey_tag(mut self, pubkey: &PublicKey) -> Self {
        self.p_tags.push(pubkey.to_hex());
        self
    }

    pub fn label_namespace(mut self, namespace: &str) -> Self {
        self.label_namespaces.push(namespace.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// 本地判断事件是否满足过滤条件
    pub fn matches(&self, event: &Event) -> bool {
        let in_list = |list: &Vec<String>, value: &str| list.is_empty() || list.iter().any(|v| v == value);
        let tag_in = |list: &Vec<String>, name: &str| {
            list.is_empty()
                || event.tags.iter().any(|t| {
                    t.first().map(String::as_str) == Some(name)
                        && t.get(1).map_or(false, |v| list.contains(v))
                })
        };

        in_list(&self.ids, &event.id)
            && in_list(&self.authors, &event.pubkey)
            && (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && tag_in(&self.p_tags, "p")
            && tag_in(&self.label_namespaces, "L")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed(keys: &Keys, content: &str) -> Event {
        UnsignedEvent::new(keys.public_key(), 1, vec![vec!["t".into(), "test".into()]], content)
            .sign(keys)
            .unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = Keys::generate();
        let event = signed(&keys, "hello");
        assert_eq!(event.id.len(), 64);
        assert_eq!(event.sig.len(), 128);
        assert!(event.verify().is_ok());
    }

    #[test]
    fn test_tampered_content_fails_verify() {
        let keys = Keys::generate();
        let mut event = signed(&keys, "hello");
        event.content = "goodbye".to_string();
        assert!(matches!(event.verify(), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_foreign_signature_fails_verify() {
        let alice = Keys::generate();
        let bob = Keys::generate();
        let mut event = signed(&alice, "hello");
        event.sig = signed(&bob, "hello").sig;
        assert!(event.verify().is_err());
    }

    #[test]
    fn test_sign_with_wrong_key() {
        let alice = Keys::generate();
        let bob = Keys::generate();
        let unsigned = UnsignedEvent::new(alice.public_key(), 1, vec![], "x");
        assert!(matches!(unsigned.sign(&bob), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_unsigned_id_matches_signed_id() {
        let keys = Keys::generate();
        let unsigned = UnsignedEvent::new(keys.public_key(), 1, vec![], "same");
        let id = unsigned.id().unwrap();
        assert_eq!(unsigned.sign(&keys).unwrap().id, id);
    }

    #[test]
    fn test_filter_serialization() {
        let keys = Keys::generate();
        let filter = Filter::new()
            .kind(KIND_LABEL)
            .pubkey_tag(&keys.public_key())
            .label_namespace("thunderproof");
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["kinds"], serde_json::json!([1985]));
        assert_eq!(json["#p"], serde_json::json!([keys.public_key().to_hex()]));
        assert_eq!(json["#L"], serde_json::json!(["thunderproof"]));
        assert!(json.get("authors").is_none());
        assert!(json.get("limit").is_none());
    }

    #[test]
    fn test_filter_matches() {
        let keys = Keys::generate();
        let event = signed(&keys, "hi");
        assert!(Filter::new().author(&keys.public_key()).kind(1).matches(&event));
        assert!(!Filter::new().kind(KIND_METADATA).matches(&event));
        assert!(!Filter::new().pubkey_tag(&keys.public_key()).matches(&event));
    }

    #[test]
    fn test_tag_helpers() {
        let keys = Keys::generate();
        let event = signed(&keys, "hi");
        assert_eq!(event.tag_value("t"), Some("test"));
        assert_eq!(event.tag_value("p"), None);
        assert!(event.has_tag(&["t", "test"]));
        assert!(!event.has_tag(&["t", "other"]));
    }
}
