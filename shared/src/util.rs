/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 规范化站点 URL：去掉末尾的 `/`
///
/// 站点匹配（webhook 来源识别）与请求拼接统一使用该形式。
pub fn normalize_site_url(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}
