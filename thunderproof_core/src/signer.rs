//! 签名器
//!
//! - `LocalSigner`: 本进程持有私钥
//! - `ExternalSigner`: 私钥由外部程序持有，按 NIP-07 的接口形式
//!   (`get_public_key` / `sign_event`) 通过标准输入输出交换一行 JSON

use crate::error::{Error, Result};
use crate::event::{Event, UnsignedEvent};
use crate::keys::{Keys, PublicKey};
use crate::types::SignerMethod;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait Signer: Send + Sync {
    fn method(&self) -> SignerMethod;

    async fn public_key(&self) -> Result<PublicKey>;

    async fn sign(&self, unsigned: UnsignedEvent) -> Result<Event>;
}

/// 本地密钥签名器
#[derive(Debug, Clone)]
pub struct LocalSigner {
    keys: Keys,
}

impl LocalSigner {
    pub fn new(keys: Keys) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn method(&self) -> SignerMethod {
        SignerMethod::LocalKey
    }

    async fn public_key(&self) -> Result<PublicKey> {
        Ok(self.keys.public_key())
    }

    async fn sign(&self, unsigned: UnsignedEvent) -> Result<Event> {
        unsigned.sign(&self.keys)
    }
}

#[derive(Debug, Deserialize)]
struct SignerResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// 外部签名器默认等待时间（可能需要用户确认）
pub const DEFAULT_SIGNER_TIMEOUT: Duration = Duration::from_secs(60);

/// 外部签名器
#[derive(Debug, Clone)]
pub struct ExternalSigner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalSigner {
    /// `command` 为完整命令行，按空白切分
    pub fn new(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::InvalidParam("Signer command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout: DEFAULT_SIGNER_TIMEOUT,
        })
    }

    /// 单次调用的最长等待时间，超时后终止子进程
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        debug!("Calling external signer {} ({})", self.program, method);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Crypto(format!("No signer available ({}): {}", self.program, e)))?;

        let request = serde_json::json!({ "method": method, "params": params });
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(format!("{}\n", request).as_bytes()).await?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(format!("Signer did not respond within {:?}", self.timeout)))??;
        if !output.status.success() {
            return Err(Error::Crypto(format!("Signer exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| Error::Crypto("Signer returned no response".to_string()))?;

        let response: SignerResponse = serde_json::from_str(line)?;
        if let Some(error) = response.error {
            return Err(Error::Crypto(format!("Signer refused {}: {}", method, error)));
        }
        response
            .result
            .ok_or_else(|| Error::Crypto(format!("Signer returned no result for {}", method)))
    }
}

#[async_trait]
impl Signer for ExternalSigner {
    fn method(&self) -> SignerMethod {
        SignerMethod::Extension
    }

    async fn public_key(&self) -> Result<PublicKey> {
        let result = self.call("get_public_key", serde_json::Value::Null).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| Error::Encoding("public key must be a string".to_string()))?;
        PublicKey::parse(hex)
    }

    async fn sign(&self, unsigned: UnsignedEvent) -> Result<Event> {
        let expected_id = unsigned.id()?;
        let result = self.call("sign_event", unsigned.to_json()).await?;
        let event: Event = serde_json::from_value(result)?;

        if event.pubkey != unsigned.pubkey.to_hex() || event.id != expected_id {
            return Err(Error::Crypto("Signer returned a different event".to_string()));
        }
        event.verify()?;
        Ok(event)
    }
}
