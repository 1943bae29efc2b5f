//! 评价
//!
//! 评价以 NIP-32 标签事件 (kind 1985) 发布：
//! - `["L", "thunderproof"]` 命名空间
//! - `["l", "review", "thunderproof"]` 标签类型
//! - `["p", <被评价者>]`
//! - `["rating", "1".."5"]`
//!
//! 事件内容为评价正文。

use crate::error::{Error, Result};
use crate::event::{Event, Filter, UnsignedEvent, KIND_LABEL};
use crate::keys::PublicKey;
use crate::types::{RatingBucket, RatingStats, Review};
use std::collections::HashSet;
use tracing::debug;

/// 标签命名空间
pub const LABEL_NAMESPACE: &str = "thunderproof";
/// 标签类型
pub const LABEL_TYPE: &str = "review";
/// 评价正文最大字符数
pub const MAX_COMMENT_CHARS: usize = 500;

/// 查询某身份所有评价的过滤器
pub fn reviews_filter(target: &PublicKey) -> Filter {
    Filter::new()
        .kind(KIND_LABEL)
        .pubkey_tag(target)
        .label_namespace(LABEL_NAMESPACE)
}

/// 待提交的评价表单
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewDraft {
    /// 0 表示尚未选择
    pub rating: u8,
    pub comment: String,
}

impl ReviewDraft {
    pub fn new(rating: u8, comment: impl Into<String>) -> Self {
        Self {
            rating,
            comment: comment.into(),
        }
    }

    /// 校验表单，返回去除首尾空白的正文
    pub fn validate(&self) -> Result<&str> {
        if !(1..=5).contains(&self.rating) {
            return Err(Error::InvalidParam("Please select a rating".to_string()));
        }
        let comment = self.comment.trim();
        if comment.is_empty() {
            return Err(Error::InvalidParam("Please write a review comment".to_string()));
        }
        let chars = comment.chars().count();
        if chars > MAX_COMMENT_CHARS {
            return Err(Error::InvalidParam(format!(
                "Review comment is too long ({}/{} characters)",
                chars, MAX_COMMENT_CHARS
            )));
        }
        Ok(comment)
    }

    /// 字数提示，如 `12/500 characters`
    pub fn char_counter(&self) -> String {
        format!("{}/{} characters", self.comment.chars().count(), MAX_COMMENT_CHARS)
    }

    /// 构建待签名的评价事件
    pub fn to_event(&self, author: PublicKey, target: &PublicKey) -> Result<UnsignedEvent> {
        let comment = self.validate()?;
        let tags = vec![
            vec!["L".to_string(), LABEL_NAMESPACE.to_string()],
            vec!["l".to_string(), LABEL_TYPE.to_string(), LABEL_NAMESPACE.to_string()],
            vec!["p".to_string(), target.to_hex()],
            vec!["rating".to_string(), self.rating.to_string()],
        ];
        Ok(UnsignedEvent::new(author, KIND_LABEL, tags, comment))
    }
}

/// 从事件解析评价，不符合格式的返回 `None`
pub fn parse_review(event: &Event, target: &PublicKey) -> Option<Review> {
    if event.kind != KIND_LABEL
        || !event.has_tag(&["L", LABEL_NAMESPACE])
        || !event.has_tag(&["l", LABEL_TYPE, LABEL_NAMESPACE])
    {
        return None;
    }

    let target_hex = target.to_hex();
    if event.tag_value("p") != Some(target_hex.as_str()) {
        return None;
    }

    let rating = event.tag_value("rating")?.trim().parse::<u8>().ok()?;
    if !(1..=5).contains(&rating) {
        return None;
    }

    Some(Review {
        id: event.id.clone(),
        target: target_hex,
        author: event.pubkey.clone(),
        rating,
        content: event.content.clone(),
        created_at: event.created_at,
        verified: false,
        sig: event.sig.clone(),
    })
}

/// 解析一批事件，丢弃无效评价
pub fn reviews_from_events(events: &[Event], target: &PublicKey) -> Vec<Review> {
    let reviews: Vec<Review> = events.iter().filter_map(|e| parse_review(e, target)).collect();
    if reviews.len() != events.len() {
        debug!("Discarded {} malformed review events", events.len() - reviews.len());
    }
    merge_reviews(Vec::new(), reviews)
}

/// 合并评价列表：按 ID 去重，按时间从新到旧排序
pub fn merge_reviews(existing: Vec<Review>, incoming: Vec<Review>) -> Vec<Review> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Review> = existing
        .into_iter()
        .chain(incoming)
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    merged
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// 评分统计
pub fn rating_stats(reviews: &[Review]) -> RatingStats {
    let total = reviews.len();
    let sum: u32 = reviews.iter().map(|r| r.rating as u32).sum();
    let average = if total > 0 {
        round1(sum as f64 / total as f64)
    } else {
        0.0
    };

    let breakdown = (1..=5u8)
        .rev()
        .map(|stars| {
            let count = reviews.iter().filter(|r| r.rating == stars).count();
            let percentage = if total > 0 {
                round1(count as f64 / total as f64 * 100.0)
            } else {
                0.0
            };
            RatingBucket { stars, count, percentage }
        })
        .collect();

    RatingStats { total, average, breakdown }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keys;

    fn review(id: &str, rating: u8, created_at: u64) -> Review {
        Review {
            id: id.to_string(),
            target: "t".into(),
            author: "a".into(),
            rating,
            content: "c".into(),
            created_at,
            verified: false,
            sig: String::new(),
        }
    }

    fn signed_review(author: &Keys, target: &PublicKey, rating: u8) -> Event {
        ReviewDraft::new(rating, "Fast Lightning payments")
            .to_event(author.public_key(), target)
            .unwrap()
            .sign(author)
            .unwrap()
    }

    #[test]
    fn test_draft_validation() {
        assert!(matches!(ReviewDraft::new(0, "great").validate(), Err(Error::InvalidParam(m)) if m == "Please select a rating"));
        assert!(ReviewDraft::new(6, "great").validate().is_err());
        assert!(matches!(ReviewDraft::new(5, "   ").validate(), Err(Error::InvalidParam(m)) if m == "Please write a review comment"));
        assert!(ReviewDraft::new(5, "a".repeat(501)).validate().is_err());
        assert_eq!(ReviewDraft::new(5, "a".repeat(500)).validate().unwrap().len(), 500);
        assert_eq!(ReviewDraft::new(3, "  ok  ").validate().unwrap(), "ok");
        assert!(ReviewDraft::default().validate().is_err());
    }

    #[test]
    fn test_char_counter() {
        assert_eq!(ReviewDraft::new(1, "héllo").char_counter(), "5/500 characters");
    }

    #[test]
    fn test_review_event_roundtrip() {
        let author = Keys::generate();
        let target = Keys::generate().public_key();
        let event = signed_review(&author, &target, 4);
        assert!(event.verify().is_ok());

        let parsed = parse_review(&event, &target).unwrap();
        assert_eq!(parsed.rating, 4);
        assert_eq!(parsed.author, author.public_key().to_hex());
        assert_eq!(parsed.content, "Fast Lightning payments");
        assert!(!parsed.verified);
    }

    #[test]
    fn test_parse_review_rejects() {
        let author = Keys::generate();
        let target = Keys::generate().public_key();
        let other = Keys::generate().public_key();
        let event = signed_review(&author, &target, 4);

        // 其他目标
        assert!(parse_review(&event, &other).is_none());

        // 评分越界
        let mut bad = event.clone();
        for tag in bad.tags.iter_mut() {
            if tag[0] == "rating" {
                tag[1] = "9".into();
            }
        }
        assert!(parse_review(&bad, &target).is_none());

        // 缺少命名空间
        let mut unlabeled = event.clone();
        unlabeled.tags.retain(|t| t[0] != "L");
        assert!(parse_review(&unlabeled, &target).is_none());
    }

    #[test]
    fn test_merge_order_and_dedup() {
        let merged = merge_reviews(
            vec![review("a", 5, 100), review("b", 4, 300)],
            vec![review("c", 3, 200), review("a", 5, 100), review("d", 1, 300)],
        );
        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "c", "a"]);
        assert!(merged.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_rating_stats() {
        let reviews = vec![
            review("1", 5, 1),
            review("2", 4, 2),
            review("3", 5, 3),
        ];
        let stats = rating_stats(&reviews);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.average, 4.7);
        assert_eq!(stats.breakdown[0], RatingBucket { stars: 5, count: 2, percentage: 66.7 });
        assert_eq!(stats.breakdown[1], RatingBucket { stars: 4, count: 1, percentage: 33.3 });
        assert_eq!(stats.breakdown[4], RatingBucket { stars: 1, count: 0, percentage: 0.0 });
    }

    #[test]
    fn test_rating_stats_empty() {
        let stats = rating_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.breakdown.len(), 5);
        assert!(stats.breakdown.iter().all(|b| b.count == 0 && b.percentage == 0.0));
    }
}
