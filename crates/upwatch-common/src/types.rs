use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Service availability state.
///
/// `Unknown` is both the initial state and the state a service returns to
/// when resumed from `Paused`: a resumed service must re-earn `Up` through
/// a fresh successful check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Unknown,
    Up,
    Down,
    Paused,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Unknown => write!(f, "unknown"),
            ServiceState::Up => write!(f, "up"),
            ServiceState::Down => write!(f, "down"),
            ServiceState::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for ServiceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(ServiceState::Unknown),
            "up" => Ok(ServiceState::Up),
            "down" => Ok(ServiceState::Down),
            "paused" => Ok(ServiceState::Paused),
            _ => Err(format!("unknown service state: {s}")),
        }
    }
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use upwatch_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.to_string(), "high");
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Monitor check style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    /// Push: the monitored service reports fail/recover explicitly.
    Webhook,
    /// Push: the monitored service pings periodically; silence is failure.
    Heartbeat,
    /// Pull: the engine polls an HTTP endpoint on an interval.
    HealthCheck,
    /// Push: numeric readings judged against a threshold strategy.
    Metric,
}

impl std::fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorKind::Webhook => write!(f, "webhook"),
            MonitorKind::Heartbeat => write!(f, "heartbeat"),
            MonitorKind::HealthCheck => write!(f, "health_check"),
            MonitorKind::Metric => write!(f, "metric"),
        }
    }
}

/// Why an alert was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Failure,
    MissedHeartbeat,
    FailedHealthCheck,
    Recovery,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::Failure => write!(f, "failure"),
            AlertType::MissedHeartbeat => write!(f, "missed_heartbeat"),
            AlertType::FailedHealthCheck => write!(f, "failed_health_check"),
            AlertType::Recovery => write!(f, "recovery"),
        }
    }
}

/// What produced a monitor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Inbound webhook or heartbeat check-in.
    CheckIn,
    /// Active health-check poll performed by the engine.
    Poll,
    /// Metric ingest carrying a numeric reading.
    Metric,
    /// Service state transition recorded for the audit trail.
    StateChange,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::CheckIn => write!(f, "check_in"),
            EventKind::Poll => write!(f, "poll"),
            EventKind::Metric => write!(f, "metric"),
            EventKind::StateChange => write!(f, "state_change"),
        }
    }
}

/// Rollup period size.
///
/// # Examples
///
/// ```
/// use upwatch_common::types::Granularity;
/// use chrono::{TimeZone, Utc};
///
/// let at = Utc.with_ymd_and_hms(2024, 3, 6, 14, 35, 9).unwrap(); // a Wednesday
/// let week = Granularity::Weekly.period_start(at);
/// assert_eq!(week, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()); // Monday
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// Truncates `at` to the start of the period containing it.
    /// Weekly periods are Monday-anchored.
    pub fn period_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let day = Utc
            .with_ymd_and_hms(at.year(), at.month(), at.day(), 0, 0, 0)
            .unwrap();
        match self {
            Granularity::Hourly => day + Duration::hours(i64::from(at.hour())),
            Granularity::Daily => day,
            Granularity::Weekly => {
                let back = at.weekday().num_days_from_monday();
                day - Duration::days(i64::from(back))
            }
            Granularity::Monthly => Utc
                .with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
                .unwrap(),
        }
    }

    /// Returns the start of the period following the one containing `at`.
    pub fn period_end(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.period_start(at);
        match self {
            Granularity::Hourly => start + Duration::hours(1),
            Granularity::Daily => start + Duration::days(1),
            Granularity::Weekly => start + Duration::days(7),
            Granularity::Monthly => {
                let (year, month) = if start.month() == 12 {
                    (start.year() + 1, 1)
                } else {
                    (start.year(), start.month() + 1)
                };
                Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
            }
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Hourly => write!(f, "hourly"),
            Granularity::Daily => write!(f, "daily"),
            Granularity::Weekly => write!(f, "weekly"),
            Granularity::Monthly => write!(f, "monthly"),
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" => Ok(Granularity::Hourly),
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            _ => Err(format!("unknown granularity: {s}")),
        }
    }
}

/// How a metric monitor decides a reading is an alert-worthy breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStrategy {
    /// Breach on any single out-of-range reading.
    Immediate,
    /// Breach only after N consecutive out-of-range readings.
    ConsecutiveCount,
    /// Breach when the average over a trailing time window is out of range.
    TimeDurationAverage,
    /// Breach when the average of the last N readings is out of range.
    SampleCountAverage,
}

impl std::fmt::Display for ThresholdStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdStrategy::Immediate => write!(f, "immediate"),
            ThresholdStrategy::ConsecutiveCount => write!(f, "consecutive_count"),
            ThresholdStrategy::TimeDurationAverage => write!(f, "time_duration_average"),
            ThresholdStrategy::SampleCountAverage => write!(f, "sample_count_average"),
        }
    }
}

impl std::str::FromStr for ThresholdStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "immediate" => Ok(ThresholdStrategy::Immediate),
            "consecutive_count" => Ok(ThresholdStrategy::ConsecutiveCount),
            "time_duration_average" => Ok(ThresholdStrategy::TimeDurationAverage),
            "sample_count_average" => Ok(ThresholdStrategy::SampleCountAverage),
            _ => Err(format!("unknown threshold strategy: {s}")),
        }
    }
}

/// 被监控的服务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// 唯一标识
    pub id: String,
    /// 服务名称
    pub name: String,
    /// 当前可用性状态（仅通过状态机变更）
    pub state: ServiceState,
    /// 上一次状态（用于识别 Down→Up 恢复）
    pub previous_state: ServiceState,
    /// 告警级别
    pub severity: Severity,
    /// 暂停截止时间
    pub paused_until: Option<DateTime<Utc>>,
    /// 到期后是否自动恢复
    pub auto_resume: bool,
    /// 抑制标记（由外部依赖评估器维护）
    pub suppressed: bool,
    /// 抑制原因
    pub suppression_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn new(name: impl Into<String>, severity: Severity) -> Self {
        let now = Utc::now();
        Self {
            id: crate::id::next_id(),
            name: name.into(),
            state: ServiceState::Unknown,
            previous_state: ServiceState::Unknown,
            severity,
            paused_until: None,
            auto_resume: false,
            suppressed: false,
            suppression_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// HealthCheck 监控配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckSettings {
    /// 探测地址
    pub url: String,
    /// HTTP 方法（GET/HEAD/POST...）
    pub method: String,
    /// 期望的状态码集合
    pub expected_status_codes: Vec<u16>,
    /// 响应体需匹配的正则（可选）
    pub body_pattern: Option<String>,
    /// 单次探测超时（秒）
    pub timeout_secs: u64,
}

/// Metric 监控配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSettings {
    /// 下界（可选）
    pub min_value: Option<f64>,
    /// 上界（可选）
    pub max_value: Option<f64>,
    /// 越界判定策略
    pub strategy: ThresholdStrategy,
    /// consecutive_count / sample_count_average 的样本数 N
    pub threshold_count: u32,
    /// time_duration_average 的时间窗口（秒）
    pub window_secs: u64,
    /// 原始读数保留天数（按监控项配置，非全局）
    pub retention_days: u32,
}

/// 服务下的单个监控项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    pub service_id: String,
    pub kind: MonitorKind,
    /// 入站上报用的唯一 token
    pub token: String,
    pub interval_secs: u64,
    pub grace_period_secs: u64,
    /// 最后一次上报/探测时间
    pub last_check_in: Option<DateTime<Utc>>,
    /// 仅 HealthCheck 类型有值
    pub health_check: Option<HealthCheckSettings>,
    /// 仅 Metric 类型有值
    pub metric: Option<MetricSettings>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only fact recorded for every check-in, poll, metric ingest or
/// state change. Source of truth for rollups and threshold lookbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorEvent {
    pub id: String,
    pub monitor_id: String,
    pub service_id: String,
    pub kind: EventKind,
    pub success: bool,
    /// Numeric reading, present for metric ingests and poll latencies.
    pub value: Option<f64>,
    /// Immediate bounds violation flag (set at ingest time so consecutive-
    /// count lookbacks never re-derive it against edited bounds).
    pub out_of_range: bool,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Pre-aggregated statistics for one (monitor, granularity, period).
///
/// Upserted, never appended: at most one row exists per key. Statistics
/// fields are `None` when no event in the period carried a value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorRollup {
    pub id: String,
    pub monitor_id: String,
    pub service_id: String,
    pub granularity: Granularity,
    pub period_start: DateTime<Utc>,
    pub count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub uptime_percent: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub p80: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub std_dev: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 告警记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub service_id: String,
    pub alert_type: AlertType,
    /// 级别（创建时从服务复制）
    pub severity: Severity,
    pub message: String,
    /// 全部通知渠道发送成功后才会写入
    pub dispatched_at: Option<DateTime<Utc>>,
    /// 由外部（UI / peer 通道动作）写入
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(service: &Service, alert_type: AlertType, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::id::next_id(),
            service_id: service.id.clone(),
            alert_type,
            severity: service.severity,
            message: message.into(),
            dispatched_at: None,
            acknowledged_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Mute interval `[starts_at, ends_at)` for one service. While active,
/// alerts are computed but never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteWindow {
    pub id: String,
    pub service_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl MuteWindow {
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at
    }
}

/// 已配对的远端实例
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub id: String,
    /// 代表该远端的本地服务
    pub service_id: String,
    pub name: String,
    /// 远端实例的基础 URL
    pub url: String,
    /// 向远端推送心跳用的 bearer token
    pub heartbeat_token: String,
    /// 向远端推送 fail/recover 用的 bearer token
    pub webhook_token: String,
    pub heartbeat_interval_secs: u64,
    pub paired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// 通知联系人
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    /// 服务未关联任何联系人时的兜底联系人
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// 联系人名下的一条通知渠道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactChannel {
    pub id: String,
    pub contact_id: String,
    /// 渠道类型（telegram / webhook / ...），对应 ChannelPlugin::name
    pub channel_type: String,
    pub enabled: bool,
    /// 渠道配置 JSON，由对应插件校验
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Directed dependency edge: the dependent service relies on the
/// dependency service. The stored edge set never contains a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDependency {
    pub id: String,
    pub dependent_service_id: String,
    pub dependency_service_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn weekly_period_is_monday_anchored() {
        // 2024-03-10 is a Sunday; its week starts Monday 2024-03-04.
        let sunday = Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 0).unwrap();
        let start = Granularity::Weekly.period_start(sunday);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(start.weekday(), Weekday::Mon);
    }

    #[test]
    fn monthly_period_end_rolls_over_year() {
        let december = Utc.with_ymd_and_hms(2023, 12, 15, 8, 0, 0).unwrap();
        let end = Granularity::Monthly.period_end(december);
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn hourly_period_truncates_minutes() {
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 9, 42, 31).unwrap();
        assert_eq!(
            Granularity::Hourly.period_start(at),
            Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn mute_window_bounds_are_half_open() {
        let window = MuteWindow {
            id: "w1".into(),
            service_id: "s1".into(),
            starts_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            created_at: Utc::now(),
        };
        assert!(window.is_active(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()));
        assert!(window.is_active(Utc.with_ymd_and_hms(2024, 1, 1, 11, 59, 59).unwrap()));
        assert!(!window.is_active(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()));
        assert!(!window.is_active(Utc.with_ymd_and_hms(2024, 1, 1, 9, 59, 59).unwrap()));
    }
}
