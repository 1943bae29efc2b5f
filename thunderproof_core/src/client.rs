//! Thunderproof 客户端
//!
//! 持有当前查看的资料、评价列表和已连接的用户。

use crate::error::{Error, Result};
use crate::event::Event;
use crate::http::HttpDirectory;
use crate::keys::{is_valid_npub, Keys, PublicKey};
use crate::pool::RelayPool;
use crate::profile::fetch_profile;
use crate::relay::{RelayTransport, WsTransport};
use crate::review::{merge_reviews, parse_review, rating_stats, reviews_filter, reviews_from_events, ReviewDraft};
use crate::session::SessionStore;
use crate::share::{embed_code, share_url, EmbedOptions};
use crate::signer::{ExternalSigner, LocalSigner, Signer, DEFAULT_SIGNER_TIMEOUT};
use crate::types::*;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 默认中继
pub const DEFAULT_RELAYS: [&str; 5] = [
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.snort.social",
    "wss://relay.current.fyi",
    "wss://brb.io",
];

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 中继地址，查询与发布共用
    pub relays: Vec<String>,
    /// 资料 / 评价查询超时
    pub query_timeout: Duration,
    /// 单个中继的发布超时
    pub publish_timeout: Duration,
    /// NIP-05 / NIP-11 请求超时
    pub http_timeout: Duration,
    /// 外部签名器单次调用超时
    pub signer_timeout: Duration,
    /// 分享链接的基础地址
    pub base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            query_timeout: Duration::from_secs(10),
            publish_timeout: Duration::from_secs(5),
            http_timeout: Duration::from_secs(10),
            signer_timeout: DEFAULT_SIGNER_TIMEOUT,
            base_url: "http://localhost:8000/".to_string(),
        }
    }
}

/// 校验搜索输入，返回公钥；不做任何网络请求
pub fn parse_search_query(query: &str) -> Result<PublicKey> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::InvalidParam("Please enter a Nostr public key".to_string()));
    }
    if !is_valid_npub(query) {
        return Err(Error::InvalidParam(
            "Please enter a valid npub key (63 characters starting with npub1)".to_string(),
        ));
    }
    PublicKey::from_npub(query)
}

/// Thunderproof 客户端
pub struct ThunderproofClient {
    config: ClientConfig,
    pool: RelayPool,
    directory: HttpDirectory,
    store: Option<SessionStore>,
    /// 当前资料
    profile: Arc<RwLock<Option<Profile>>>,
    /// 当前评价，从新到旧
    reviews: Arc<RwLock<Vec<Review>>>,
    /// 当前签名器与会话
    signer: Arc<RwLock<Option<(Arc<dyn Signer>, Session)>>>,
}

impl ThunderproofClient {
    /// 创建新的客户端实例
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(WsTransport::new()))
    }

    /// 使用指定传输层创建客户端
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn RelayTransport>) -> Result<Self> {
        let pool = RelayPool::new(
            config.relays.clone(),
            transport,
            config.query_timeout,
            config.publish_timeout,
        );
        let directory = HttpDirectory::new(config.http_timeout)?;

        Ok(Self {
            config,
            pool,
            directory,
            store: None,
            profile: Arc::new(RwLock::new(None)),
            reviews: Arc::new(RwLock::new(Vec::new())),
            signer: Arc::new(RwLock::new(None)),
        })
    }

    /// 启用会话文件
    pub fn with_session_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session_store(&self) -> Option<&SessionStore> {
        self.store.as_ref()
    }

    /// 搜索资料并加载评价
    pub async fn search(&self, query: &str) -> Result<Profile> {
        let pubkey = parse_search_query(query)?;
        info!("Searching profile {}", pubkey.to_npub());

        let profile = fetch_profile(&self.pool, &pubkey).await;
        *self.profile.write().await = Some(profile.clone());
        self.load_reviews().await;

        info!("Profile loaded: {}", profile.name);
        Ok(profile)
    }

    /// 查询某身份的评价
    pub async fn fetch_reviews(&self, target: &PublicKey) -> Result<Vec<Review>> {
        let events = self.pool.query(&reviews_filter(target)).await?;
        Ok(reviews_from_events(&events, target))
    }

    /// 重新加载当前资料的评价，失败时为空列表
    pub async fn load_reviews(&self) -> Vec<Review> {
        let Some(target) = self.current_target().await else {
            return Vec::new();
        };

        let reviews = match self.fetch_reviews(&target).await {
            Ok(reviews) => reviews,
            Err(e) => {
                warn!("Error loading reviews: {}", e);
                Vec::new()
            }
        };
        debug!("Loaded {} reviews", reviews.len());

        *self.reviews.write().await = reviews.clone();
        reviews
    }

    async fn current_target(&self) -> Option<PublicKey> {
        let profile = self.profile.read().await;
        profile.as_ref().and_then(|p| PublicKey::from_hex(&p.pubkey).ok())
    }

    pub async fn current_profile(&self) -> Option<Profile> {
        self.profile.read().await.clone()
    }

    pub async fn current_reviews(&self) -> Vec<Review> {
        self.reviews.read().await.clone()
    }

    /// 当前评价的统计
    pub async fn stats(&self) -> RatingStats {
        rating_stats(&self.reviews.read().await)
    }

    /// 返回首页：清除当前资料
    pub async fn clear_profile(&self) {
        *self.profile.write().await = None;
        self.reviews.write().await.clear();
    }

    /// 使用 nsec 连接
    pub async fn connect_local(&self, nsec: &str) -> Result<Session> {
        let keys = Keys::parse(nsec).map_err(|e| Error::InvalidParam(format!("Invalid private key: {}", e)))?;
        self.connect_keys(keys).await
    }

    /// 生成新密钥并连接
    pub async fn generate_keys(&self) -> Result<(Keys, Session)> {
        let keys = Keys::generate();
        let session = self.connect_keys(keys.clone()).await?;
        Ok((keys, session))
    }

    async fn connect_keys(&self, keys: Keys) -> Result<Session> {
        if let Some(store) = &self.store {
            store.save(&keys)?;
        }
        self.connect_signer(Arc::new(LocalSigner::new(keys))).await
    }

    /// 通过外部签名器连接（不保存会话）
    pub async fn connect_external(&self, command: &str) -> Result<Session> {
        let signer = ExternalSigner::new(command)?.with_timeout(self.config.signer_timeout);
        let session = self.connect_signer(Arc::new(signer)).await?;
        if let Some(store) = &self.store {
            store.clear()?;
        }
        Ok(session)
    }

    /// 使用任意签名器连接
    pub async fn connect_signer(&self, signer: Arc<dyn Signer>) -> Result<Session> {
        let pubkey = signer.public_key().await?;
        let session = Session::new(&pubkey, signer.method());
        *self.signer.write().await = Some((signer, session.clone()));

        info!("Connected as {} ({:?})", session.npub, session.method);
        Ok(session)
    }

    /// 从会话文件恢复
    pub async fn restore_session(&self) -> Result<Option<Session>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        match store.load()? {
            Some(keys) => Ok(Some(self.connect_signer(Arc::new(LocalSigner::new(keys))).await?)),
            None => Ok(None),
        }
    }

    /// 断开连接并清除会话文件
    pub async fn disconnect(&self) -> Result<()> {
        *self.signer.write().await = None;
        if let Some(store) = &self.store {
            store.clear()?;
        }
        info!("Disconnected");
        Ok(())
    }

    pub async fn session(&self) -> Option<Session> {
        self.signer.read().await.as_ref().map(|(_, s)| s.clone())
    }

    /// 提交评价：校验、签名、发布到所有中继，然后重新加载评价
    pub async fn submit_review(&self, draft: &ReviewDraft) -> Result<PublishReport> {
        let (signer, session) = self.signer.read().await.clone().ok_or(Error::NotAuthenticated)?;
        let target = self
            .current_target()
            .await
            .ok_or_else(|| Error::InvalidState("No profile selected".to_string()))?;

        let author = PublicKey::from_hex(&session.pubkey)?;
        let unsigned = draft.to_event(author, &target)?;
        let event: Event = signer.sign(unsigned).await?;

        let report = self.pool.publish(&event).await?;
        info!(
            "Review {} published ({} accepted, {} rejected)",
            report.event_id,
            report.accepted.len(),
            report.rejected.len()
        );

        let fetched = self.load_reviews().await;
        let own: Vec<Review> = parse_review(&event, &target).into_iter().collect();
        *self.reviews.write().await = merge_reviews(fetched, own);

        Ok(report)
    }

    /// 当前资料的分享链接
    pub async fn share_url(&self) -> Result<String> {
        let npub = self.current_npub().await?;
        share_url(&self.config.base_url, &npub)
    }

    /// 当前资料的嵌入代码
    pub async fn embed_code(&self, options: EmbedOptions) -> Result<String> {
        let npub = self.current_npub().await?;
        embed_code(&self.config.base_url, &npub, options)
    }

    async fn current_npub(&self) -> Result<String> {
        self.profile
            .read()
            .await
            .as_ref()
            .map(|p| p.npub.clone())
            .ok_or_else(|| Error::InvalidState("No profile selected".to_string()))
    }

    /// 校验当前资料的 NIP-05 标识，没有标识时返回 `None`
    pub async fn verify_nip05(&self) -> Result<Option<bool>> {
        let Some(profile) = self.current_profile().await else {
            return Ok(None);
        };
        let Some(nip05) = profile.nip05.as_deref() else {
            return Ok(None);
        };
        let pubkey = PublicKey::from_hex(&profile.pubkey)?;
        self.directory.verify_nip05(nip05, &pubkey).await.map(Some)
    }

    /// 获取每个中继的 NIP-11 信息
    pub async fn relay_health(&self) -> Vec<RelayHealth> {
        join_all(self.pool.relays().iter().map(|relay| async move {
            let info = self.directory.relay_info(relay).await.map_err(|e| e.to_string());
            RelayHealth {
                relay: relay.clone(),
                info,
            }
        }))
        .await
    }
}
