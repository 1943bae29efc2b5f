//! Thunderproof 客户端核心库
//!
//! 基于 Nostr 的身份评价：
//! - 按 npub 查询身份资料（多中继并发、超时降级）
//! - 读取与发布星级评价（NIP-32 标签事件）
//! - 会话持久化、分享链接与嵌入代码

pub mod client;
pub mod error;
pub mod event;
pub mod format;
pub mod http;
pub mod keys;
pub mod pool;
pub mod profile;
pub mod relay;
pub mod review;
pub mod session;
pub mod share;
pub mod signer;
pub mod types;

pub use client::{parse_search_query, ClientConfig, ThunderproofClient, DEFAULT_RELAYS};
pub use error::{Error, Result};
pub use event::{Event, Filter, UnsignedEvent};
pub use keys::{is_valid_npub, Keys, PublicKey};
pub use pool::RelayPool;
pub use relay::{Ack, RelayTransport, WsTransport};
pub use review::ReviewDraft;
pub use session::SessionStore;
pub use share::EmbedOptions;
pub use signer::{ExternalSigner, LocalSigner, Signer};
pub use types::*;
