//! Typed payloads returned by the appliance API.
//!
//! Every field carries a serde default so a partial or older payload still
//! decodes. Defaults are resolved here, once, instead of at each place the
//! data is displayed.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// Metrics Types
// =============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadAverage {
    #[serde(rename = "1_min")]
    pub one_min: f64,
    #[serde(rename = "5_min")]
    pub five_min: f64,
    #[serde(rename = "15_min")]
    pub fifteen_min: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CpuMetrics {
    pub overall_usage: f64,
    pub per_core_usage: Vec<f64>,
    pub current_frequency: f64,
    pub load_average: LoadAverage,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryMetrics {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_percent: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TemperatureMetrics {
    pub cpu_temp: f64,
    pub unit: String,
    /// Set when no sensor could be read (cpu_temp is then 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for TemperatureMetrics {
    fn default() -> Self {
        Self {
            cpu_temp: 0.0,
            unit: "C".to_string(),
            error: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Filesystem {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiskIoStats {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_count: u64,
    pub write_count: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiskMetrics {
    pub filesystems: Vec<Filesystem>,
    /// Empty object on hosts without block-device counters
    pub io_stats: Option<DiskIoStats>,
}

impl DiskMetrics {
    /// Usage of the first (root) filesystem, 0 when none is reported
    pub fn root_percent(&self) -> f64 {
        self.filesystems.first().map(|fs| fs.percent).unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterfaceAddress {
    /// "IPv4" or "IPv6"
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkInterface {
    pub name: String,
    pub addresses: Vec<InterfaceAddress>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetIoStats {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkMetrics {
    pub interfaces: Vec<NetworkInterface>,
    /// Per-interface counters keyed by interface name
    pub stats: BTreeMap<String, NetIoStats>,
}

/// Response of `/api/metrics/summary`
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsSummary {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub temperature: TemperatureMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Overall appliance health as classified by the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Unknown,
}

/// Response of `/api/health`
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Health {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Health {
    pub fn level(&self) -> HealthStatus {
        match self.status.as_str() {
            "healthy" => HealthStatus::Healthy,
            "warning" => HealthStatus::Warning,
            "critical" => HealthStatus::Critical,
            _ => HealthStatus::Unknown,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UsbDevice {
    pub bus: String,
    pub device: String,
    pub vendor_id: String,
    pub product_id: String,
    pub description: String,
}

/// Response of `/api/usb/devices`
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UsbDevices {
    pub devices: Vec<UsbDevice>,
}

// =============================================================================
// Docker Types
// =============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub image: String,
    /// "running", "exited", "paused", ...
    pub status: String,
    /// Raw docker state object
    pub state: Value,
    pub ports: Value,
    pub created: String,
    pub stats: ContainerStats,
}

impl Container {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Response of `/api/docker/containers`
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContainerList {
    pub containers: Vec<Container>,
    /// Set when the docker daemon is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lifecycle action for `POST /api/docker/containers/{id}/{action}`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
}

impl ContainerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
        }
    }

    /// Past tense for user-facing messages
    pub fn past_tense(&self) -> &'static str {
        match self {
            ContainerAction::Start => "started",
            ContainerAction::Stop => "stopped",
            ContainerAction::Restart => "restarted",
        }
    }
}

// =============================================================================
// Dongle Types
// =============================================================================

/// `#[serde(default)]` only covers a missing key; this also maps an explicit
/// `null` to the field's default. The modem API passes through whatever the
/// dongle reports, which is `null` for unparseable PDUs.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalInfo {
    /// Raw modem signal report (rsrp, rsrq, sinr, ...)
    pub status: Value,
    /// 0-5 bars
    #[serde(deserialize_with = "null_as_default")]
    pub strength: u8,
    #[serde(deserialize_with = "null_as_default")]
    pub color: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SmsMessage {
    #[serde(deserialize_with = "null_as_default")]
    pub index: String,
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: String,
    pub raw_timestamp: Option<String>,
    #[serde(rename = "from")]
    pub sender: Option<String>,
    pub message: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub unread: bool,
}

/// Response of `/api/dongle/status`
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DongleStatus {
    pub connected: bool,
    /// Set when the modem or its API is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalInfo>,
    pub device: Value,
    pub network: Value,
    pub traffic: Value,
    pub sms_messages: Vec<SmsMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl DongleStatus {
    pub fn unread_count(&self) -> usize {
        self.sms_messages.iter().filter(|m| m.unread).count()
    }
}

// =============================================================================
// Settings Types
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_icon() -> Option<String> {
    Some("🔗".to_string())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceLink {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default = "default_icon")]
    pub icon: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub show_on_dashboard: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Fields of a new link before the backend assigns an id
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewServiceLink {
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub enabled: bool,
    pub show_on_dashboard: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for NewServiceLink {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            icon: default_icon(),
            enabled: true,
            show_on_dashboard: true,
            container_name: None,
            description: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    /// "ssl" or "starttls"
    pub secure: String,
    pub username: String,
    pub app_password: String,
    pub email_from: String,
    pub email_from_name: String,
    pub email_to: String,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            server: "smtp.gmail.com".to_string(),
            port: 465,
            secure: "ssl".to_string(),
            username: String::new(),
            app_password: String::new(),
            email_from: String::new(),
            email_from_name: String::new(),
            email_to: String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiKeys {
    pub google_calendar_credentials: Option<String>,
    pub anilist_client_id: Option<String>,
    pub anilist_client_secret: Option<String>,
    pub myanimelist_client_id: Option<String>,
}

/// Response of `GET /api/settings/`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Seconds
    pub refresh_rate: u64,
    pub service_links: Vec<ServiceLink>,
    pub smtp_settings: SmtpSettings,
    pub api_keys: ApiKeys,
    pub temperature_warning_threshold: u32,
    pub temperature_critical_threshold: u32,
    pub cpu_warning_threshold: u32,
    pub cpu_critical_threshold: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            id: None,
            refresh_rate: 2,
            service_links: Vec::new(),
            smtp_settings: SmtpSettings::default(),
            api_keys: ApiKeys::default(),
            temperature_warning_threshold: 70,
            temperature_critical_threshold: 80,
            cpu_warning_threshold: 80,
            cpu_critical_threshold: 95,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForwardedSms {
    #[serde(rename = "from")]
    pub sender: Option<String>,
    pub timestamp: Option<String>,
    pub preview: Option<String>,
}

/// Response of `GET /api/settings/smtp/status` (SMS-to-email forwarder)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SmtpStatus {
    pub active: bool,
    pub configured: bool,
    pub last_error: Option<String>,
    pub last_sent_at: Option<String>,
    pub last_forwarded_sms: Option<ForwardedSms>,
}

/// Response of `GET /api/settings/resolved/{hostname}`; the backend answers
/// either with the bare list or wrapped in `service_links`
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResolvedLinks {
    Wrapped { service_links: Vec<ServiceLink> },
    Bare(Vec<ServiceLink>),
}

impl ResolvedLinks {
    pub fn into_links(self) -> Vec<ServiceLink> {
        match self {
            ResolvedLinks::Wrapped { service_links } => service_links,
            ResolvedLinks::Bare(links) => links,
        }
    }
}

/// Generic `{ "message": "..." }` acknowledgement
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Ack {
    pub message: String,
}

// =============================================================================
// User Types
// =============================================================================

fn default_role() -> String {
    "admin".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub username: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Response of `GET /api/users`
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserList {
    pub users: Vec<User>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: String,
    pub is_active: bool,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role: default_role(),
            is_active: true,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}
