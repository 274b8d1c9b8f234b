//! WooClient - WooCommerce REST API (wc/v3) 订单拉取

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use shared::OrderRecord;
use std::time::Duration;

use super::{FetchMeta, FetchOutcome, OrderFilter, OrderSource};
use crate::core::config::SiteConfig;

const HEADER_TOTAL: &str = "x-wp-total";
const HEADER_TOTAL_PAGES: &str = "x-wp-totalpages";
/// ISO 8601 站点本地时间（不带偏移）
const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// 拉取失败原因（只在客户端内部流转）
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("malformed body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// WooCommerce 订单客户端
///
/// 复用同一个 reqwest Client（连接池），每个请求有超时上限。
#[derive(Debug, Clone)]
pub struct WooClient {
    client: Client,
}

impl WooClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dashboard-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    fn request(&self, site: &SiteConfig, filter: &OrderFilter, page: u32) -> RequestBuilder {
        let mut query: Vec<(&str, String)> = vec![
            ("per_page", filter.per_page.clamp(1, super::MAX_PER_PAGE).to_string()),
            ("page", page.to_string()),
        ];
        if let Some(status) = filter.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(after) = filter.created_after {
            query.push(("after", after.format(QUERY_TIME_FORMAT).to_string()));
        }
        if let Some(after) = filter.modified_after {
            query.push(("modified_after", after.format(QUERY_TIME_FORMAT).to_string()));
        }

        self.client
            .get(site.orders_endpoint())
            .basic_auth(&site.consumer_key, Some(&site.consumer_secret))
            .query(&query)
    }

    async fn fetch_page(
        &self,
        site: &SiteConfig,
        filter: &OrderFilter,
        page: u32,
    ) -> Result<(Vec<OrderRecord>, FetchMeta), FetchError> {
        let response = self.request(site, filter, page).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        };
        let meta = FetchMeta {
            total: header(HEADER_TOTAL).and_then(|v| v.parse().ok()),
            total_pages: header(HEADER_TOTAL_PAGES).and_then(|v| v.parse().ok()),
            truncated: false,
        };

        let body = response.bytes().await?;
        let records: Vec<OrderRecord> = serde_json::from_slice(&body)?;
        Ok((records, meta))
    }

    /// 拉取全部页（受 `max_pages` 限制）
    ///
    /// 任一页失败则整体失败，不使用部分结果。
    /// 总页数超过上限时 `meta.truncated` 置位。
    async fn fetch_all(
        &self,
        site: &SiteConfig,
        filter: &OrderFilter,
    ) -> Result<(Vec<OrderRecord>, FetchMeta), FetchError> {
        let (mut records, mut meta) = self.fetch_page(site, filter, 1).await?;

        let total_pages = meta.total_pages.unwrap_or(1);
        let last_page = total_pages.min(filter.max_pages.max(1));
        meta.truncated = total_pages > last_page;
        for page in 2..=last_page {
            let (more, _) = self.fetch_page(site, filter, page).await?;
            if more.is_empty() {
                break;
            }
            records.extend(more);
        }

        Ok((records, meta))
    }
}

#[async_trait]
impl OrderSource for WooClient {
    async fn fetch(&self, site: &SiteConfig, filter: &OrderFilter) -> FetchOutcome {
        match self.fetch_all(site, filter).await {
            Ok((records, meta)) => {
                if meta.truncated && !filter.counts_from_header() {
                    tracing::warn!(
                        site = %site.name,
                        filter = %filter,
                        total = ?meta.total,
                        total_pages = ?meta.total_pages,
                        max_pages = filter.max_pages,
                        records = records.len(),
                        "Order listing truncated at max_pages, counts may be low"
                    );
                }
                tracing::debug!(
                    site = %site.name,
                    filter = %filter,
                    records = records.len(),
                    total = ?meta.total,
                    "Fetched orders"
                );
                FetchOutcome::Fetched { records, meta }
            }
            Err(e) => {
                tracing::warn!(
                    site = %site.name,
                    filter = %filter,
                    error = %e,
                    "Failed fetching orders, site degraded"
                );
                FetchOutcome::Degraded {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode as AxumStatus, header};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    fn order(id: u64, status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "status": status,
            "date_created": "2026-10-19T10:00:00",
            "date_completed": null,
        })
    }

    async fn orders(
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        // "ck:cs" base64
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            == Some("Basic Y2s6Y3M=");
        if !authorized {
            return AxumStatus::UNAUTHORIZED.into_response();
        }

        let page: u32 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        match query.get("status").map(String::as_str) {
            Some("processing") => (
                [("X-WP-Total", "42"), ("X-WP-TotalPages", "42")],
                Json(vec![order(1, "processing")]),
            )
                .into_response(),
            Some("completed") => {
                if query.get("modified_after").map(String::as_str) != Some("2026-10-19T00:00:00") {
                    return AxumStatus::BAD_REQUEST.into_response();
                }
                let body = match page {
                    1 => vec![order(10, "completed"), order(11, "completed")],
                    2 => vec![order(12, "completed")],
                    _ => vec![order(99, "completed")],
                };
                ([("X-WP-Total", "5"), ("X-WP-TotalPages", "3")], Json(body)).into_response()
            }
            _ => {
                let after_ok = query.get("after").map(String::as_str) == Some("2026-10-18T00:00:00");
                if after_ok {
                    Json(vec![order(20, "on-hold")]).into_response()
                } else {
                    AxumStatus::BAD_REQUEST.into_response()
                }
            }
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn site(url: &str) -> SiteConfig {
        SiteConfig::new("S1", url, "ck", "cs")
    }

    fn midnight(day: u32) -> chrono::NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn reads_total_header_for_processing() {
        let url = serve(Router::new().route("/wp-json/wc/v3/orders", get(orders))).await;
        let client = WooClient::new(Duration::from_secs(5)).unwrap();

        let outcome = client
            .fetch(&site(&url), &OrderFilter::processing_total())
            .await;
        let (records, meta) = outcome.into_parts();
        assert_eq!(records.len(), 1);
        assert_eq!(meta.total, Some(42));
        // 只取一页是预期行为，但仍如实标记
        assert!(meta.truncated);
    }

    #[tokio::test]
    async fn follows_pages_up_to_max_pages() {
        let url = serve(Router::new().route("/wp-json/wc/v3/orders", get(orders))).await;
        let client = WooClient::new(Duration::from_secs(5)).unwrap();

        let (records, meta) = client
            .fetch(&site(&url), &OrderFilter::completed_since(midnight(19), 2))
            .await
            .into_parts();
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert!(meta.truncated, "page 3 of 3 was never fetched");

        let (records, meta) = client
            .fetch(&site(&url), &OrderFilter::completed_since(midnight(19), 3))
            .await
            .into_parts();
        assert_eq!(records.len(), 4);
        assert!(!meta.truncated);
    }

    #[tokio::test]
    async fn sends_created_after_bound() {
        let url = serve(Router::new().route("/wp-json/wc/v3/orders", get(orders))).await;
        let client = WooClient::new(Duration::from_secs(5)).unwrap();
        let outcome = client
            .fetch(&site(&url), &OrderFilter::created_since(midnight(18), 1))
            .await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_parts().0[0].id, 20);
    }

    #[tokio::test]
    async fn completed_listing_is_bounded_by_modification_time() {
        let url = serve(Router::new().route("/wp-json/wc/v3/orders", get(orders))).await;
        let client = WooClient::new(Duration::from_secs(5)).unwrap();

        // 服务端只接受 modified_after=今天 00:00
        let wrong_day = client
            .fetch(&site(&url), &OrderFilter::completed_since(midnight(18), 1))
            .await;
        assert!(wrong_day.is_degraded());
    }

    #[tokio::test]
    async fn failures_degrade_instead_of_erroring() {
        let app = Router::new()
            .route(
                "/broken/wp-json/wc/v3/orders",
                get(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
            )
            .route(
                "/garbled/wp-json/wc/v3/orders",
                get(|| async { "<html>maintenance</html>" }),
            )
            .route(
                "/slow/wp-json/wc/v3/orders",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Json(Vec::<serde_json::Value>::new())
                }),
            );
        let url = serve(app).await;
        let client = WooClient::new(Duration::from_millis(200)).unwrap();
        let filter = OrderFilter::processing_total();

        for path in ["broken", "garbled", "slow"] {
            let outcome = client.fetch(&site(&format!("{url}/{path}")), &filter).await;
            assert!(outcome.is_degraded(), "{path} should degrade");
        }

        // 无人监听的端口
        let outcome = client.fetch(&site("http://127.0.0.1:1"), &filter).await;
        assert!(outcome.is_degraded());
    }
}
