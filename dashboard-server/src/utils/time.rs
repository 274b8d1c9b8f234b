//! 时间工具函数 - 业务时区与可注入时钟
//!
//! "今天/昨天"统一在配置时区下按日历日判断（不是滚动 24 小时），
//! 每个刷新周期只解析一次 [`ReferenceDay`]，避免周期中途跨越午夜。

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// 时钟 - 提供当前 UTC 时间
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时钟（测试用，可手动拨动）
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// 以业务时区的本地时间构造
    ///
    /// 本地时间不存在（夏令时跳跃）时返回 None
    pub fn at_local(tz: Tz, local: NaiveDateTime) -> Option<Self> {
        local
            .and_local_timezone(tz)
            .latest()
            .map(|dt| Self::new(dt.with_timezone(&Utc)))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// 参考日 - 一个刷新周期内固定的"今天/昨天"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDay {
    pub tz: Tz,
    /// 参考时刻（业务时区）
    pub now: DateTime<Tz>,
    pub today: NaiveDate,
    pub yesterday: NaiveDate,
}

impl ReferenceDay {
    /// 按时钟与业务时区解析参考日
    pub fn resolve(clock: &dyn Clock, tz: Tz) -> Self {
        Self::at(clock.now(), tz)
    }

    pub fn at(now: DateTime<Utc>, tz: Tz) -> Self {
        let now = now.with_timezone(&tz);
        let today = now.date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        Self {
            tz,
            now,
            today,
            yesterday,
        }
    }

    /// 今日 00:00:00（本地），用作"修改时间下限"过滤
    pub fn today_start(&self) -> NaiveDateTime {
        self.today.and_time(chrono::NaiveTime::MIN)
    }

    /// 昨日 00:00:00（本地），用作"创建时间下限"过滤
    pub fn yesterday_start(&self) -> NaiveDateTime {
        self.yesterday.and_time(chrono::NaiveTime::MIN)
    }

    pub fn is_today(&self, raw: &str) -> bool {
        local_date(raw, self.tz) == Some(self.today)
    }

    pub fn is_yesterday(&self, raw: &str) -> bool {
        local_date(raw, self.tz) == Some(self.yesterday)
    }
}

/// 时间戳字符串 → 业务时区下的日历日
///
/// - 带偏移（RFC 3339，如 `2026-10-19T23:30:00Z`）→ 换算到业务时区后取日期
/// - 不带偏移（WooCommerce `date_created`，已是站点本地时间）→ 取前缀 `YYYY-MM-DD`
///
/// 无法解析返回 None（调用方视为"不计入"）。
pub fn local_date(raw: &str, tz: Tz) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&tz).date_naive());
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}
