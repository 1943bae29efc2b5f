//! 错误类型定义

use thiserror::Error;

/// 错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 密码学错误
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// 网络错误
    #[error("Network error: {0}")]
    Network(String),

    /// 单个中继返回的错误
    #[error("Relay {relay}: {message}")]
    Relay { relay: String, message: String },

    /// 超时
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 所有中继均失败
    #[error("All relays failed: {0}")]
    AllRelaysFailed(String),

    /// 参数错误
    #[error("{0}")]
    InvalidParam(String),

    /// 公钥格式错误
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// 状态错误
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 编解码错误
    #[error("Encoding/Decoding error: {0}")]
    Encoding(String),

    /// 未连接账户
    #[error("Please connect your Nostr account first")]
    NotAuthenticated,

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn relay(relay: &str, message: impl Into<String>) -> Self {
        Error::Relay {
            relay: relay.to_string(),
            message: message.into(),
        }
    }
}

/// 结果类型
pub type Result<T> = std::result::Result<T, Error>;
