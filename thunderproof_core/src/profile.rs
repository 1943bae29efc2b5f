//! 身份资料查询
//!
//! 取最新的 kind 0 元数据事件；网络失败时返回占位资料，搜索本身不会因此失败。

use crate::event::{Event, Filter, KIND_METADATA};
use crate::format::short_npub;
use crate::keys::PublicKey;
use crate::pool::RelayPool;
use crate::types::Profile;
use serde_json::Value;
use tracing::{debug, warn};

/// 中继上没有资料时的简介
pub const ABOUT_MISSING: &str = "No profile information available";
/// 查询失败时的简介
pub const ABOUT_UNAVAILABLE: &str = "Profile information unavailable";

/// 元数据查询过滤器
pub fn metadata_filter(pubkey: &PublicKey) -> Filter {
    Filter::new().kind(KIND_METADATA).author(pubkey).limit(1)
}

/// 从中继获取资料，失败时降级为占位资料
pub async fn fetch_profile(pool: &RelayPool, pubkey: &PublicKey) -> Profile {
    match pool.query(&metadata_filter(pubkey)).await {
        Ok(events) => {
            debug!("Found {} metadata events for {}", events.len(), pubkey);
            profile_from_events(pubkey, &events)
        }
        Err(e) => {
            warn!("Error fetching profile for {}: {}", pubkey, e);
            fallback_profile(pubkey)
        }
    }
}

/// 由查询结果构建资料，取 `created_at` 最大的事件
pub fn profile_from_events(pubkey: &PublicKey, events: &[Event]) -> Profile {
    let latest = events
        .iter()
        .filter(|e| e.kind == KIND_METADATA && e.pubkey == pubkey.to_hex())
        .max_by_key(|e| e.created_at);

    let raw = match latest {
        Some(event) => match serde_json::from_str::<Value>(&event.content) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => {
                warn!("Profile content of {} is not a JSON object", event.id);
                Value::Object(Default::default())
            }
            Err(e) => {
                warn!("Failed to parse profile data: {}", e);
                Value::Object(Default::default())
            }
        },
        None => Value::Object(Default::default()),
    };

    let npub = pubkey.to_npub();
    let field = |key: &str| {
        raw.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Profile {
        pubkey: pubkey.to_hex(),
        name: field("name")
            .or_else(|| field("display_name"))
            .unwrap_or_else(|| short_npub(&npub)),
        about: field("about").unwrap_or_else(|| ABOUT_MISSING.to_string()),
        picture: field("picture"),
        banner: field("banner"),
        website: field("website"),
        nip05: field("nip05"),
        lud16: field("lud16"),
        npub,
        raw,
    }
}

/// 查询失败时的占位资料
pub fn fallback_profile(pubkey: &PublicKey) -> Profile {
    let npub = pubkey.to_npub();
    Profile {
        pubkey: pubkey.to_hex(),
        name: short_npub(&npub),
        about: ABOUT_UNAVAILABLE.to_string(),
        picture: None,
        banner: None,
        website: None,
        nip05: None,
        lud16: None,
        npub,
        raw: Value::Object(Default::default()),
    }
}
