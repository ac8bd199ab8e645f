use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Snowflake 机器标识 (0-31)
    #[serde(default = "default_machine_id")]
    pub machine_id: i32,
    /// Snowflake 节点标识 (0-31)
    #[serde(default = "default_node_id")]
    pub node_id: i32,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub http: HttpClientConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub pairing: PairingConfig,
}

/// 各调度任务的执行间隔（秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_heartbeat_tick_secs")]
    pub heartbeat_tick_secs: u64,
    #[serde(default = "default_health_check_tick_secs")]
    pub health_check_tick_secs: u64,
    #[serde(default = "default_maintenance_tick_secs")]
    pub maintenance_tick_secs: u64,
    #[serde(default = "default_dispatch_tick_secs")]
    pub dispatch_tick_secs: u64,
    #[serde(default = "default_rollup_tick_secs")]
    pub rollup_tick_secs: u64,
    #[serde(default = "default_retention_tick_secs")]
    pub retention_tick_secs: u64,
    #[serde(default = "default_retention_tick_secs")]
    pub metric_retention_tick_secs: u64,
    #[serde(default = "default_peer_heartbeat_tick_secs")]
    pub peer_heartbeat_tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_tick_secs: default_heartbeat_tick_secs(),
            health_check_tick_secs: default_health_check_tick_secs(),
            maintenance_tick_secs: default_maintenance_tick_secs(),
            dispatch_tick_secs: default_dispatch_tick_secs(),
            rollup_tick_secs: default_rollup_tick_secs(),
            retention_tick_secs: default_retention_tick_secs(),
            metric_retention_tick_secs: default_retention_tick_secs(),
            peer_heartbeat_tick_secs: default_peer_heartbeat_tick_secs(),
        }
    }
}

fn default_heartbeat_tick_secs() -> u64 {
    10
}

fn default_health_check_tick_secs() -> u64 {
    10
}

fn default_maintenance_tick_secs() -> u64 {
    60
}

fn default_dispatch_tick_secs() -> u64 {
    5
}

fn default_rollup_tick_secs() -> u64 {
    3600
}

fn default_retention_tick_secs() -> u64 {
    3600
}

fn default_peer_heartbeat_tick_secs() -> u64 {
    10
}

/// 各逻辑 HTTP 客户端的超时配置（秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// HealthCheck 客户端默认超时；单个监控项可覆盖
    #[serde(default = "default_health_check_timeout_secs")]
    pub health_check_timeout_secs: u64,
    #[serde(default = "default_peer_timeout_secs")]
    pub peer_heartbeat_timeout_secs: u64,
    #[serde(default = "default_peer_timeout_secs")]
    pub peer_notification_timeout_secs: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            health_check_timeout_secs: default_health_check_timeout_secs(),
            peer_heartbeat_timeout_secs: default_peer_timeout_secs(),
            peer_notification_timeout_secs: default_peer_timeout_secs(),
        }
    }
}

fn default_health_check_timeout_secs() -> u64 {
    30
}

fn default_peer_timeout_secs() -> u64 {
    10
}

/// 数据保留窗口（Monthly rollup 永久保留）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_event_days")]
    pub event_days: u32,
    #[serde(default = "default_hourly_rollup_days")]
    pub hourly_rollup_days: u32,
    #[serde(default = "default_daily_rollup_days")]
    pub daily_rollup_days: u32,
    #[serde(default = "default_weekly_rollup_days")]
    pub weekly_rollup_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            event_days: default_event_days(),
            hourly_rollup_days: default_hourly_rollup_days(),
            daily_rollup_days: default_daily_rollup_days(),
            weekly_rollup_days: default_weekly_rollup_days(),
        }
    }
}

fn default_event_days() -> u32 {
    7
}

fn default_hourly_rollup_days() -> u32 {
    30
}

fn default_daily_rollup_days() -> u32 {
    365
}

fn default_weekly_rollup_days() -> u32 {
    730
}

/// 实例配对配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    /// 本实例对外可达的基础 URL（写入配对 token）
    #[serde(default = "default_pairing_url")]
    pub url: String,
    /// 本实例名称（对端用作服务名）
    #[serde(default = "default_pairing_name")]
    pub name: String,
    /// 配对 secret 有效期（秒）
    #[serde(default = "default_secret_ttl_secs")]
    pub secret_ttl_secs: u64,
    /// 发给对端的心跳间隔（秒）
    #[serde(default = "default_pairing_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            url: default_pairing_url(),
            name: default_pairing_name(),
            secret_ttl_secs: default_secret_ttl_secs(),
            heartbeat_interval_secs: default_pairing_heartbeat_interval_secs(),
        }
    }
}

fn default_pairing_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_pairing_name() -> String {
    "upwatch".to_string()
}

fn default_secret_ttl_secs() -> u64 {
    600
}

fn default_pairing_heartbeat_interval_secs() -> u64 {
    60
}

fn default_machine_id() -> i32 {
    1
}

fn default_node_id() -> i32 {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            machine_id: default_machine_id(),
            node_id: default_node_id(),
            scheduler: SchedulerConfig::default(),
            http: HttpClientConfig::default(),
            retention: RetentionConfig::default(),
            pairing: PairingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
