//! 展示辅助函数

use chrono::{DateTime, Utc};

const DAY_SECS: u64 = 60 * 60 * 24;

fn truncate(s: &str, n: usize) -> String {
    let head: String = s.chars().take(n).collect();
    format!("{}...", head)
}

/// 用于默认名称：前 16 个字符 + `...`
pub fn short_npub(npub: &str) -> String {
    truncate(npub, 16)
}

/// 评价作者显示
pub fn format_author(npub: &str) -> String {
    truncate(npub, 16)
}

/// 资料页公钥显示
pub fn format_npub(npub: &str) -> String {
    truncate(npub, 20)
}

/// 相对日期：`Today` / `Yesterday` / `N days ago` / `YYYY-MM-DD`
pub fn format_date(created_at: u64, now: u64) -> String {
    let diff = now.abs_diff(created_at);
    let days = diff.div_ceil(DAY_SECS);
    match days {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => format!("{} days ago", days),
        _ => DateTime::<Utc>::from_timestamp(created_at as i64, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| created_at.to_string()),
    }
}

/// `1 star` / `N stars`
pub fn stars_label(rating: u8) -> String {
    if rating == 1 {
        "1 star".to_string()
    } else {
        format!("{} stars", rating)
    }
}

/// 星级图标档位：评分 * 20 向下取整到 10 的倍数 (0-100)
pub fn star_bucket(rating: f64) -> u8 {
    let percentage = (rating * 20.0).clamp(0.0, 100.0);
    ((percentage / 10.0).floor() as u8) * 10
}

/// 终端内的星级显示
pub fn star_bar(rating: f64) -> String {
    let filled = (star_bucket(rating) / 20) as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const NPUB: &str = "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg";

    #[test]
    fn test_truncation() {
        assert_eq!(format_author(NPUB), "npub10elfcs4fr0l...");
        assert_eq!(format_npub(NPUB), "npub10elfcs4fr0l0r8a...");
        assert_eq!(short_npub("npub1"), "npub1...");
    }

    #[test]
    fn test_format_date() {
        let now = 1_700_000_000;
        assert_eq!(format_date(now, now), "Today");
        assert_eq!(format_date(now - 60, now), "Yesterday");
        assert_eq!(format_date(now - DAY_SECS, now), "Yesterday");
        assert_eq!(format_date(now - DAY_SECS - 1, now), "2 days ago");
        assert_eq!(format_date(now - 6 * DAY_SECS, now), "6 days ago");
        assert_eq!(format_date(now - 30 * DAY_SECS, now), "2023-10-15");
    }

    #[test]
    fn test_star_bucket() {
        assert_eq!(star_bucket(5.0), 100);
        assert_eq!(star_bucket(4.7), 90);
        assert_eq!(star_bucket(4.5), 90);
        assert_eq!(star_bucket(4.4), 80);
        assert_eq!(star_bucket(0.4), 0);
        assert_eq!(star_bucket(0.0), 0);
        assert_eq!(star_bar(3.0), "★★★☆☆");
    }

    #[test]
    fn test_stars_label() {
        assert_eq!(stars_label(1), "1 star");
        assert_eq!(stars_label(4), "4 stars");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & y")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; y&quot;)&lt;/script&gt;"
        );
    }
}
