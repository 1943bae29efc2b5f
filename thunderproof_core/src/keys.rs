//! 密钥与 NIP-19 编解码
//!
//! - `npub`: bech32 编码的 x-only 公钥
//! - `nsec`: bech32 编码的私钥

use crate::error::{Error, Result};
use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32, Hrp};
use secp256k1::{All, Keypair, Secp256k1, SecretKey, XOnlyPublicKey, SECP256K1};
use std::fmt;

/// 公钥前缀
pub const NPUB_PREFIX: &str = "npub1";
/// npub 的固定长度
pub const NPUB_LENGTH: usize = 63;

const NPUB_HRP: &str = "npub";
const NSEC_HRP: &str = "nsec";

fn secp() -> &'static Secp256k1<All> {
    SECP256K1
}

/// 检查搜索输入是否为合法 npub（只检查前缀和长度）
pub fn is_valid_npub(key: &str) -> bool {
    key.starts_with(NPUB_PREFIX) && key.len() == NPUB_LENGTH
}

fn bech32_encode(hrp: &str, data: &[u8]) -> Result<String> {
    let hrp = Hrp::parse(hrp).map_err(|e| Error::Encoding(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| Error::Encoding(e.to_string()))
}

fn bech32_decode(expected_hrp: &str, s: &str) -> Result<[u8; 32]> {
    // NIP-19 只使用 Bech32 校验和，Bech32m 视为无效
    let checked = CheckedHrpstring::new::<Bech32>(s).map_err(|e| Error::Encoding(e.to_string()))?;
    let hrp = checked.hrp();
    if hrp.to_lowercase() != expected_hrp {
        return Err(Error::Encoding(format!(
            "expected {} prefix, got {}",
            expected_hrp,
            hrp.to_lowercase()
        )));
    }
    let data: Vec<u8> = checked.byte_iter().collect();
    data.try_into()
        .map_err(|v: Vec<u8>| Error::Encoding(format!("expected 32 bytes, got {}", v.len())))
}

fn hex_32(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s).map_err(|e| Error::Encoding(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| Error::Encoding(format!("expected 32 bytes, got {}", v.len())))
}

/// x-only 公钥
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(XOnlyPublicKey);

impl PublicKey {
    /// 从 npub 解码
    pub fn from_npub(npub: &str) -> Result<Self> {
        let bytes = bech32_decode(NPUB_HRP, npub).map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// 从 64 位十六进制字符串解析
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex_32(s).map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// npub 或十六进制均可
    pub fn parse(s: &str) -> Result<Self> {
        if s.starts_with(NPUB_PREFIX) {
            Self::from_npub(s)
        } else {
            Self::from_hex(s)
        }
    }

    fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        XOnlyPublicKey::from_slice(bytes)
            .map(Self)
            .map_err(|e| Error::InvalidPublicKey(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.serialize())
    }

    pub fn to_npub(&self) -> String {
        // 32 字节数据不会超出 bech32 长度限制
        bech32_encode(NPUB_HRP, &self.0.serialize()).unwrap_or_default()
    }

    pub(crate) fn inner(&self) -> &XOnlyPublicKey {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// 本地持有的密钥对
#[derive(Clone)]
pub struct Keys {
    keypair: Keypair,
    public_key: PublicKey,
}

impl Keys {
    /// 随机生成新密钥
    pub fn generate() -> Self {
        let keypair = Keypair::new(secp(), &mut rand::thread_rng());
        Self::from_keypair(keypair)
    }

    /// 从 nsec 导入
    pub fn from_nsec(nsec: &str) -> Result<Self> {
        let bytes = bech32_decode(NSEC_HRP, nsec.trim())?;
        Self::from_secret_bytes(&bytes)
    }

    /// nsec 或十六进制私钥均可
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with("nsec1") {
            Self::from_nsec(s)
        } else {
            Self::from_secret_bytes(&hex_32(s)?)
        }
    }

    fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes).map_err(|e| Error::Crypto(e.to_string()))?;
        Ok(Self::from_keypair(Keypair::from_secret_key(secp(), &secret)))
    }

    fn from_keypair(keypair: Keypair) -> Self {
        let (xonly, _parity) = keypair.x_only_public_key();
        Self {
            keypair,
            public_key: PublicKey(xonly),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn to_nsec(&self) -> String {
        bech32_encode(NSEC_HRP, &self.keypair.secret_bytes()).unwrap_or_default()
    }

    pub(crate) fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
