//! 增量对账 - 把单条 webhook 事件合并进当前快照
//!
//! 只增不减：同一订单先 processing 后 completed 会在两个桶中各计一次，
//! 直到下一个刷新周期从远端重新计算。
//!
//! 处理顺序（任一步失败都不修改快照、不发布）：
//!
//! | 步骤 | 失败 | 状态码 |
//! |------|------|--------|
//! | 来源头缺失/为空 | MissingSource | 400 |
//! | 来源 URL 未配置 | UnknownSite | 404 |
//! | 站点配置了密钥但签名不符 | InvalidSignature | 401 |
//! | 载荷不是带 `status` 的 JSON | MalformedPayload | 400 |

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono_tz::Tz;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use shared::{Bucket, OrderStatus};
use std::sync::Arc;

use crate::core::config::{Config, SiteConfig};
use crate::live::SnapshotStore;
use crate::utils::AppError;
use crate::utils::time::{Clock, ReferenceDay};

/// 对账错误
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("webhook source is missing")]
    MissingSource,

    #[error("unknown site: {0}")]
    UnknownSite(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("webhook signature mismatch")]
    InvalidSignature,
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::MissingSource | ReconcileError::MalformedPayload(_) => {
                AppError::validation(err.to_string())
            }
            ReconcileError::UnknownSite(_) => AppError::not_found(err.to_string()),
            ReconcileError::InvalidSignature => AppError::Unauthorized(err.to_string()),
        }
    }
}

/// 一条订单事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// 来源站点 URL（X-WC-Webhook-Source）
    pub source_url: Option<String>,
    pub status: OrderStatus,
    pub date_completed: Option<String>,
}

/// 载荷中用到的字段（其余忽略）
#[derive(Debug, Deserialize)]
struct OrderPayload {
    status: OrderStatus,
    #[serde(default)]
    date_completed: Option<String>,
}

impl WebhookEvent {
    /// 解析 WooCommerce 订单载荷
    pub fn parse(source_url: Option<&str>, body: &[u8]) -> Result<Self, ReconcileError> {
        let payload: OrderPayload = serde_json::from_slice(body)
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;
        Ok(Self {
            source_url: source_url.map(str::to_string),
            status: payload.status,
            date_completed: payload.date_completed,
        })
    }
}

/// 一次原始投递（HTTP 层提取的头 + 原始 body）
#[derive(Debug, Clone, Copy)]
pub struct WebhookDelivery<'a> {
    pub source: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

/// 已接受事件的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub site: String,
    /// 被 +1 的桶；None 表示仅刷新（计数不变）
    pub bucket: Option<Bucket>,
    pub generation: u64,
}

/// 增量对账器
#[derive(Clone)]
pub struct Reconciler {
    sites: Arc<Vec<SiteConfig>>,
    store: SnapshotStore,
    clock: Arc<dyn Clock>,
    tz: Tz,
}

impl Reconciler {
    pub fn new(config: &Config, store: SnapshotStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            sites: Arc::new(config.sites.clone()),
            store,
            clock,
            tz: config.timezone,
        }
    }

    /// 来源 URL → 站点（规范化后精确匹配，不看载荷内容）
    fn resolve(&self, source: Option<&str>) -> Result<&SiteConfig, ReconcileError> {
        let source = source
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ReconcileError::MissingSource)?;
        self.sites
            .iter()
            .find(|s| s.matches_source(source))
            .ok_or_else(|| ReconcileError::UnknownSite(source.to_string()))
    }

    /// 处理一次原始投递：识别站点 → 校验签名 → 解析 → 合并
    pub fn ingest(&self, delivery: WebhookDelivery<'_>) -> Result<ReconcileOutcome, ReconcileError> {
        let site = self.resolve(delivery.source)?;
        if let Some(secret) = site.webhook_secret.as_deref() {
            verify_signature(secret, delivery.body, delivery.signature)?;
        }
        let event = WebhookEvent::parse(delivery.source, delivery.body)?;
        self.apply(event)
    }

    /// 把事件合并进快照
    ///
    /// processing → +1 processing；今天完成的 completed → +1 completed_today；
    /// 其他状态不改计数，但仍然提交并发布。
    pub fn apply(&self, event: WebhookEvent) -> Result<ReconcileOutcome, ReconcileError> {
        let site = self.resolve(event.source_url.as_deref())?;

        let bucket = match event.status {
            OrderStatus::Processing => Some(Bucket::Processing),
            OrderStatus::Completed => {
                let day = ReferenceDay::resolve(self.clock.as_ref(), self.tz);
                event
                    .date_completed
                    .as_deref()
                    .filter(|d| day.is_today(d))
                    .map(|_| Bucket::CompletedToday)
            }
            _ => None,
        };

        let snapshot = self
            .store
            .patch_site(&site.name, |counts| {
                if let Some(bucket) = bucket {
                    counts.increment(bucket);
                }
            })
            .ok_or_else(|| ReconcileError::UnknownSite(site.url.clone()))?;

        tracing::info!(
            site = %site.name,
            status = %event.status,
            bucket = bucket.map(|b| b.as_str()).unwrap_or("none"),
            generation = snapshot.generation,
            "Webhook reconciled"
        );

        Ok(ReconcileOutcome {
            site: site.name.clone(),
            bucket,
            generation: snapshot.generation,
        })
    }
}

/// 校验 `X-WC-Webhook-Signature` = base64(HMAC-SHA256(secret, body))
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), ReconcileError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ReconcileError::InvalidSignature)?;
    let expected = BASE64
        .decode(signature)
        .map_err(|_| ReconcileError::InvalidSignature)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| ReconcileError::InvalidSignature)?;
    mac.update(body);
    // 常量时间比较
    mac.verify_slice(&expected)
        .map_err(|_| ReconcileError::InvalidSignature)
}
