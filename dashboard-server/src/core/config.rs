use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use shared::util::normalize_site_url;

/// 配置加载错误 - 启动阶段致命
///
/// 站点配置不完整时直接拒绝启动：缺凭证的站点只会显示 0，
/// 与"健康但没有订单"无法区分。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(String),

    #[error("invalid site entry '{0}', expected NAME=URL")]
    InvalidSiteEntry(String),

    #[error("duplicate site name '{0}'")]
    DuplicateSite(String),

    #[error("sites '{first}' and '{second}' share the URL {url}")]
    DuplicateSiteUrl {
        first: String,
        second: String,
        url: String,
    },

    #[error("sites '{first}' and '{second}' both read credentials from {prefix}_*")]
    ConflictingEnvPrefix {
        first: String,
        second: String,
        prefix: String,
    },

    #[error("credentials for site '{site}' are not set ({var})")]
    MissingCredentials { site: String, var: String },

    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: String, value: String },
}

/// 站点配置 - 启动时加载，运行期不可变
#[derive(Clone)]
pub struct SiteConfig {
    /// 站点名称（唯一键）
    pub name: String,
    /// 站点根 URL（已去掉末尾 `/`）
    pub url: String,
    /// WooCommerce REST API consumer key
    pub consumer_key: String,
    /// WooCommerce REST API consumer secret
    pub consumer_secret: String,
    /// Webhook 签名密钥（可选，设置后校验 X-WC-Webhook-Signature）
    pub webhook_secret: Option<String>,
}

impl SiteConfig {
    pub fn new(
        name: impl Into<String>,
        url: impl AsRef<str>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: normalize_site_url(url.as_ref()).to_string(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            webhook_secret: None,
        }
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// 来源 URL 是否指向本站点（规范化后精确相等）
    pub fn matches_source(&self, source_url: &str) -> bool {
        normalize_site_url(source_url) == self.url
    }

    /// 订单集合端点
    pub fn orders_endpoint(&self) -> String {
        format!("{}/wp-json/wc/v3/orders", self.url)
    }
}

impl fmt::Debug for SiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// 服务配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | HTTP_PORT | 5001 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | SITES | (必填) | `NAME=URL`，逗号分隔 |
/// | WC_{NAME}_CONSUMER_KEY | (必填) | 站点 consumer key |
/// | WC_{NAME}_CONSUMER_SECRET | (必填) | 站点 consumer secret |
/// | WC_{NAME}_WEBHOOK_SECRET | - | 站点 webhook 签名密钥 |
/// | TIMEZONE | Europe/London | "今天"所在的时区 |
/// | FETCH_TIMEOUT_SECS | 15 | 单次请求超时(秒) |
/// | FETCH_MAX_PAGES | 5 | 列表拉取最大页数 |
/// | REFRESH_INTERVAL_SECS | 0 | 定时刷新间隔(秒)，0 关闭 |
/// | TIME_UPDATE_INTERVAL_SECS | 30 | time_update 推送间隔(秒)，0 关闭 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | - | 日志目录（按天滚动） |
///
/// # 示例
///
/// ```ignore
/// SITES="S1=https://shop-one.example,S2=https://shop-two.example" \
/// WC_S1_CONSUMER_KEY=ck_xxx WC_S1_CONSUMER_SECRET=cs_xxx \
/// WC_S2_CONSUMER_KEY=ck_yyy WC_S2_CONSUMER_SECRET=cs_yyy \
/// cargo run -p dashboard-server
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 已配置站点（保持配置顺序）
    pub sites: Vec<SiteConfig>,
    /// 业务时区
    pub timezone: Tz,
    /// 单次请求超时 (秒)
    pub fetch_timeout_secs: u64,
    /// 列表拉取最大页数
    pub fetch_max_pages: u32,
    /// 定时刷新间隔 (秒)，0 = 关闭
    pub refresh_interval_secs: u64,
    /// time_update 推送间隔 (秒)，0 = 关闭
    pub time_update_interval_secs: u64,
    /// 日志级别
    pub log_level: String,
    /// 日志目录
    pub log_dir: Option<String>,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载配置（测试用 HashMap 注入）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sites_raw = var("SITES").ok_or_else(|| ConfigError::MissingVar("SITES".into()))?;
        let sites = parse_sites(&sites_raw, &var)?;

        let timezone = match var("TIMEZONE") {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(name.clone()))?,
            None => chrono_tz::Europe::London,
        };

        Ok(Self {
            http_port: parse_number(&var, "HTTP_PORT", 5001)?,
            environment: var("ENVIRONMENT").unwrap_or_else(|| "development".into()),
            sites,
            timezone,
            fetch_timeout_secs: parse_number(&var, "FETCH_TIMEOUT_SECS", 15)?,
            fetch_max_pages: parse_number(&var, "FETCH_MAX_PAGES", 5)?,
            refresh_interval_secs: parse_number(&var, "REFRESH_INTERVAL_SECS", 0)?,
            time_update_interval_secs: parse_number(&var, "TIME_UPDATE_INTERVAL_SECS", 30)?,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: var("LOG_DIR"),
        })
    }

    /// 使用给定站点构造配置，其余取默认值
    ///
    /// 常用于测试场景
    pub fn with_sites(sites: Vec<SiteConfig>) -> Self {
        Self {
            http_port: 5001,
            environment: "development".into(),
            sites,
            timezone: chrono_tz::Europe::London,
            fetch_timeout_secs: 15,
            fetch_max_pages: 5,
            refresh_interval_secs: 0,
            time_update_interval_secs: 30,
            log_level: "info".into(),
            log_dir: None,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

/// 站点名 → 环境变量前缀 (`S1` → `WC_S1`, `shop-two` → `WC_SHOP_TWO`)
fn env_prefix(site_name: &str) -> String {
    let upper: String = site_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("WC_{upper}")
}

fn parse_sites<F>(raw: &str, var: &F) -> Result<Vec<SiteConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut seen = HashSet::new();
    let mut urls: HashMap<String, String> = HashMap::new();
    let mut prefixes: HashMap<String, String> = HashMap::new();
    let mut sites = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, url) = entry
            .split_once('=')
            .map(|(n, u)| (n.trim(), u.trim()))
            .filter(|(n, u)| !n.is_empty() && !u.is_empty())
            .ok_or_else(|| ConfigError::InvalidSiteEntry(entry.to_string()))?;

        if !seen.insert(name.to_string()) {
            return Err(ConfigError::DuplicateSite(name.to_string()));
        }

        let prefix = env_prefix(name);
        if let Some(first) = prefixes.insert(prefix.clone(), name.to_string()) {
            return Err(ConfigError::ConflictingEnvPrefix {
                first,
                second: name.to_string(),
                prefix,
            });
        }
        let normalized = normalize_site_url(url).to_string();
        if let Some(first) = urls.insert(normalized.clone(), name.to_string()) {
            return Err(ConfigError::DuplicateSiteUrl {
                first,
                second: name.to_string(),
                url: normalized,
            });
        }

        let required = |suffix: &str| {
            let key = format!("{prefix}_{suffix}");
            var(&key).ok_or(ConfigError::MissingCredentials {
                site: name.to_string(),
                var: key,
            })
        };
        let consumer_key = required("CONSUMER_KEY")?;
        let consumer_secret = required("CONSUMER_SECRET")?;

        let mut site = SiteConfig::new(name, url, consumer_key, consumer_secret);
        site.webhook_secret = var(&format!("{prefix}_WEBHOOK_SECRET"));
        sites.push(site);
    }

    Ok(sites)
}

fn parse_number<F, N>(var: &F, key: &str, default: N) -> Result<N, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    N: std::str::FromStr,
{
    match var(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_sites_with_credentials() {
        let config = Config::from_lookup(lookup(&[
            ("SITES", "S1=https://one.example/, shop-two=https://two.example"),
            ("WC_S1_CONSUMER_KEY", "ck_1"),
            ("WC_S1_CONSUMER_SECRET", "cs_1"),
            ("WC_SHOP_TWO_CONSUMER_KEY", "ck_2"),
            ("WC_SHOP_TWO_CONSUMER_SECRET", "cs_2"),
            ("WC_SHOP_TWO_WEBHOOK_SECRET", "whsec"),
            ("TIMEZONE", "Europe/Madrid"),
            ("FETCH_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.sites.len(), 2);
        assert_eq!(config.sites[0].name, "S1");
        assert_eq!(config.sites[0].url, "https://one.example");
        assert!(config.sites[0].webhook_secret.is_none());
        assert_eq!(config.sites[1].name, "shop-two");
        assert_eq!(config.sites[1].webhook_secret.as_deref(), Some("whsec"));
        assert_eq!(config.timezone, chrono_tz::Europe::Madrid);
        assert_eq!(config.fetch_timeout_secs, 5);
        assert_eq!(config.http_port, 5001);
        assert_eq!(config.refresh_interval_secs, 0);
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let err = Config::from_lookup(lookup(&[
            ("SITES", "S1=https://one.example"),
            ("WC_S1_CONSUMER_KEY", "ck_1"),
        ]))
        .unwrap_err();
        match err {
            ConfigError::MissingCredentials { site, var } => {
                assert_eq!(site, "S1");
                assert_eq!(var, "WC_S1_CONSUMER_SECRET");
            }
            other => panic!("Expected MissingCredentials, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_and_duplicate_sites() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("SITES", "S1https://one.example")])),
            Err(ConfigError::InvalidSiteEntry(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[
                ("SITES", "S1=https://one.example,S1=https://two.example"),
                ("WC_S1_CONSUMER_KEY", "ck"),
                ("WC_S1_CONSUMER_SECRET", "cs"),
            ])),
            Err(ConfigError::DuplicateSite(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::MissingVar(_))
        ));
    }

    #[test]
    fn rejects_sites_sharing_a_url() {
        let err = Config::from_lookup(lookup(&[
            ("SITES", "S1=https://one.example,S2=https://one.example/"),
            ("WC_S1_CONSUMER_KEY", "ck"),
            ("WC_S1_CONSUMER_SECRET", "cs"),
            ("WC_S2_CONSUMER_KEY", "ck"),
            ("WC_S2_CONSUMER_SECRET", "cs"),
        ]))
        .unwrap_err();
        match err {
            ConfigError::DuplicateSiteUrl { first, second, url } => {
                assert_eq!(first, "S1");
                assert_eq!(second, "S2");
                assert_eq!(url, "https://one.example");
            }
            other => panic!("Expected DuplicateSiteUrl, got {other:?}"),
        }
    }

    #[test]
    fn rejects_names_with_the_same_env_prefix() {
        let err = Config::from_lookup(lookup(&[
            ("SITES", "shop-two=https://a.example,shop_two=https://b.example"),
            ("WC_SHOP_TWO_CONSUMER_KEY", "ck"),
            ("WC_SHOP_TWO_CONSUMER_SECRET", "cs"),
        ]))
        .unwrap_err();
        match err {
            ConfigError::ConflictingEnvPrefix {
                first,
                second,
                prefix,
            } => {
                assert_eq!(first, "shop-two");
                assert_eq!(second, "shop_two");
                assert_eq!(prefix, "WC_SHOP_TWO");
            }
            other => panic!("Expected ConflictingEnvPrefix, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_timezone_and_numbers() {
        let base = [
            ("SITES", "S1=https://one.example"),
            ("WC_S1_CONSUMER_KEY", "ck"),
            ("WC_S1_CONSUMER_SECRET", "cs"),
        ];

        let mut with_tz = base.to_vec();
        with_tz.push(("TIMEZONE", "Mars/Olympus"));
        assert!(matches!(
            Config::from_lookup(lookup(&with_tz)),
            Err(ConfigError::InvalidTimezone(_))
        ));

        let mut with_port = base.to_vec();
        with_port.push(("HTTP_PORT", "eighty"));
        assert!(matches!(
            Config::from_lookup(lookup(&with_port)),
            Err(ConfigError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn site_matching_ignores_trailing_slash() {
        let site = SiteConfig::new("S1", "https://one.example/", "ck", "cs");
        assert!(site.matches_source("https://one.example"));
        assert!(site.matches_source("https://one.example///"));
        assert!(!site.matches_source("https://one.example/shop"));
        assert!(!site.matches_source("http://one.example"));
        assert_eq!(site.orders_endpoint(), "https://one.example/wp-json/wc/v3/orders");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let site = SiteConfig::new("S1", "https://one.example", "ck_live", "cs_live")
            .with_webhook_secret("whsec_live");
        let printed = format!("{site:?}");
        assert!(!printed.contains("ck_live"));
        assert!(!printed.contains("cs_live"));
        assert!(!printed.contains("whsec_live"));
    }
}
