//! 数据类型定义

use serde::{Deserialize, Serialize};

/// 身份资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// 十六进制公钥
    pub pubkey: String,
    pub npub: String,
    pub name: String,
    pub about: String,
    pub picture: Option<String>,
    pub banner: Option<String>,
    pub website: Option<String>,
    /// NIP-05 标识 (name@domain)
    pub nip05: Option<String>,
    /// 闪电地址
    pub lud16: Option<String>,
    /// 元数据事件原始内容
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// 评价
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// 事件 ID
    pub id: String,
    /// 被评价者公钥 (hex)
    pub target: String,
    /// 作者公钥 (hex)
    pub author: String,
    /// 1-5
    pub rating: u8,
    pub content: String,
    pub created_at: u64,
    /// 暂无计算方式，恒为 false
    pub verified: bool,
    pub sig: String,
}

/// 某一星级的统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingBucket {
    pub stars: u8,
    pub count: usize,
    /// 百分比，保留一位小数
    pub percentage: f64,
}

/// 评分汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingStats {
    pub total: usize,
    /// 平均分，保留一位小数
    pub average: f64,
    /// 从 5 星到 1 星
    pub breakdown: Vec<RatingBucket>,
}

/// 签名方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerMethod {
    /// 外部签名器持有私钥
    Extension,
    /// 本进程持有私钥（导入或生成）
    LocalKey,
}

/// 当前连接的用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub pubkey: String,
    pub npub: String,
    pub name: String,
    pub method: SignerMethod,
}

/// 多中继发布结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub event_id: String,
    /// 已确认的中继
    pub accepted: Vec<String>,
    /// 失败的中继及原因
    pub rejected: Vec<(String, String)>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        !self.accepted.is_empty()
    }
}

/// NIP-11 中继信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RelayInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub software: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub supported_nips: Vec<u32>,
}

/// 中继健康状况
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayHealth {
    pub relay: String,
    /// 成功时为中继信息，失败时为错误描述
    pub info: Result<RelayInfo, String>,
}
