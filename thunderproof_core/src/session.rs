//! 会话持久化
//!
//! 只有本地密钥方式会写入会话文件（nsec 及其派生的 npub），
//! 外部签名器方式不落盘。

use crate::error::Result;
use crate::format::short_npub;
use crate::keys::{Keys, PublicKey};
use crate::types::{Session, SignerMethod};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

impl Session {
    pub fn new(pubkey: &PublicKey, method: SignerMethod) -> Self {
        let npub = pubkey.to_npub();
        Self {
            pubkey: pubkey.to_hex(),
            name: short_npub(&npub),
            npub,
            method,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    nsec: String,
    npub: String,
}

/// 会话文件
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 保存本地密钥
    pub fn save(&self, keys: &Keys) -> Result<()> {
        let stored = StoredSession {
            nsec: keys.to_nsec(),
            npub: keys.public_key().to_npub(),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&stored)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!("Session saved to {}", self.path.display());
        Ok(())
    }

    /// 读取会话；文件损坏或公钥不匹配时丢弃并返回 `None`
    pub fn load(&self) -> Result<Option<Keys>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No saved session at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let keys = serde_json::from_slice::<StoredSession>(&data)
            .map_err(|e| e.to_string())
            .and_then(|stored| {
                let keys = Keys::from_nsec(&stored.nsec).map_err(|e| e.to_string())?;
                if keys.public_key().to_npub() != stored.npub {
                    return Err("stored npub does not match private key".to_string());
                }
                Ok(keys)
            });

        match keys {
            Ok(keys) => {
                info!("Restored session for {}", keys.public_key().to_npub());
                Ok(Some(keys))
            }
            Err(reason) => {
                warn!("Discarding saved session {}: {}", self.path.display(), reason);
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// 删除会话文件
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
