//! 分享链接与嵌入代码

use crate::error::{Error, Result};
use crate::format::escape_html;
use reqwest::Url;

/// 深链接使用的查询参数
pub const PROFILE_PARAM: &str = "profile";

/// 嵌入参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedOptions {
    pub width: u32,
    pub height: u32,
    /// 最多显示的评价数
    pub max_reviews: u32,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            width: 400,
            height: 600,
            max_reviews: 5,
        }
    }
}

fn parse_base(base_url: &str) -> Result<Url> {
    Url::parse(base_url).map_err(|e| Error::InvalidParam(format!("Invalid base URL {}: {}", base_url, e)))
}

/// `<base>?profile=<npub>`
pub fn share_url(base_url: &str, npub: &str) -> Result<String> {
    let mut url = parse_base(base_url)?;
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair(PROFILE_PARAM, npub);
    Ok(url.to_string())
}

/// `<origin>/embed.html?profile=<npub>&max=<n>`
pub fn embed_url(base_url: &str, npub: &str, max_reviews: u32) -> Result<String> {
    let mut url = parse_base(base_url)?
        .join("/embed.html")
        .map_err(|e| Error::InvalidParam(e.to_string()))?;
    url.query_pairs_mut()
        .clear()
        .append_pair(PROFILE_PARAM, npub)
        .append_pair("max", &max_reviews.to_string());
    Ok(url.to_string())
}

/// iframe 嵌入代码，`src` 按 HTML 属性转义
pub fn embed_code(base_url: &str, npub: &str, options: EmbedOptions) -> Result<String> {
    let src = embed_url(base_url, npub, options.max_reviews)?;
    Ok(format!(
        r#"<iframe
  src="{}"
  width="{}"
  height="{}"
  frameborder="0"
  style="border-radius: 8px; box-shadow: 0 4px 12px rgba(0,0,0,0.1);"
  loading="lazy">
</iframe>"#,
        escape_html(&src),
        options.width,
        options.height
    ))
}

/// 从分享链接中取出 `profile` 参数
pub fn profile_from_link(link: &str) -> Result<Option<String>> {
    let url = Url::parse(link).map_err(|e| Error::InvalidParam(format!("Invalid link {}: {}", link, e)))?;
    Ok(url
        .query_pairs()
        .find(|(key, _)| key == PROFILE_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty()))
}
