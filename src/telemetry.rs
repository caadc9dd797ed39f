//! Temperature and fan telemetry from the iLO Redfish thermal resource

use crate::errors::{FanControlError, Result};
use crate::settings::Settings;
use log::{debug, warn};
use serde::Deserialize;

/// Chassis thermal resource on the management interface
pub const THERMAL_PATH: &str = "/redfish/v1/chassis/1/Thermal";

/// Fan count assumed when the iLO reports no enabled fans
pub const FALLBACK_FAN_COUNT: usize = 8;

const ENABLED_STATE: &str = "Enabled";

/// What a temperature sensor means to the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCategory {
    Cpu,
    Ambient,
    Other,
}

/// Evaluated top to bottom, first match wins
const CATEGORY_PATTERNS: &[(SensorCategory, &[&str])] = &[
    (SensorCategory::Cpu, &["cpu"]),
    (SensorCategory::Ambient, &["inlet", "ambient"]),
];

impl SensorCategory {
    /// Classify a sensor by case-insensitive substring match on its name
    pub fn classify(name: &str) -> Self {
        let name = name.to_lowercase();
        CATEGORY_PATTERNS
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| name.contains(p)))
            .map(|(category, _)| *category)
            .unwrap_or(SensorCategory::Other)
    }
}

/// One temperature sensor as reported in a single poll
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub name: String,
    pub category: SensorCategory,
    /// Degrees Celsius
    pub value: f64,
    pub enabled: bool,
    pub critical: Option<f64>,
}

/// One chassis fan as reported in a single poll
#[derive(Debug, Clone, PartialEq)]
pub struct FanReading {
    pub name: String,
    /// Current duty in percent, when reported
    pub reading: Option<f64>,
    pub enabled: bool,
}

/// Normalized result of one thermal poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub sensors: Vec<SensorReading>,
    pub fans: Vec<FanReading>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ThermalDocument {
    #[serde(default)]
    temperatures: Vec<RawTemperature>,
    #[serde(default)]
    fans: Vec<RawFan>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStatus {
    state: Option<String>,
}

impl RawStatus {
    fn is_enabled(&self) -> bool {
        self.state.as_deref() == Some(ENABLED_STATE)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawTemperature {
    #[serde(default)]
    name: String,
    reading_celsius: Option<f64>,
    #[serde(default)]
    status: RawStatus,
    upper_threshold_critical: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawFan {
    fan_name: Option<String>,
    name: Option<String>,
    current_reading: Option<f64>,
    #[serde(default)]
    status: RawStatus,
}

impl TelemetrySnapshot {
    /// Parse a Redfish `Thermal` document
    pub fn from_thermal_json(json: &str) -> Result<Self> {
        let document: ThermalDocument = serde_json::from_str(json)?;

        let sensors = document
            .temperatures
            .into_iter()
            .filter_map(|raw| {
                // Sensors without a reading are absent slots
                let value = raw.reading_celsius?;
                Some(SensorReading {
                    category: SensorCategory::classify(&raw.name),
                    enabled: raw.status.is_enabled(),
                    name: raw.name,
                    value,
                    critical: raw.upper_threshold_critical,
                })
            })
            .collect();

        let fans = document
            .fans
            .into_iter()
            .enumerate()
            .map(|(index, raw)| FanReading {
                enabled: raw.status.is_enabled(),
                name: raw
                    .fan_name
                    .or(raw.name)
                    .unwrap_or_else(|| format!("Fan {}", index + 1)),
                reading: raw.current_reading,
            })
            .collect();

        Ok(Self { sensors, fans })
    }

    /// Sensors whose status is `Enabled`
    pub fn enabled_sensors(&self) -> impl Iterator<Item = &SensorReading> {
        self.sensors.iter().filter(|s| s.enabled)
    }

    pub fn cpu_temperatures(&self) -> Vec<f64> {
        self.enabled_sensors()
            .filter(|s| s.category == SensorCategory::Cpu)
            .map(|s| s.value)
            .collect()
    }

    pub fn max_cpu_temperature(&self) -> Option<f64> {
        self.cpu_temperatures().into_iter().reduce(f64::max)
    }

    /// Inlet/ambient temperature; the last matching sensor wins
    pub fn ambient_temperature(&self) -> Option<f64> {
        self.enabled_sensors()
            .filter(|s| s.category == SensorCategory::Ambient)
            .map(|s| s.value)
            .last()
    }

    pub fn enabled_fan_count(&self) -> usize {
        self.fans.iter().filter(|f| f.enabled).count()
    }

    /// Number of fans to address, never zero
    pub fn fan_count(&self) -> usize {
        match self.enabled_fan_count() {
            0 => FALLBACK_FAN_COUNT,
            n => n,
        }
    }
}

/// Anything able to produce a telemetry snapshot
#[allow(async_fn_in_trait)]
pub trait TelemetrySource {
    async fn fetch(&self) -> Result<TelemetrySnapshot>;
}

/// HTTPS client for the iLO Redfish API
pub struct RedfishClient {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl RedfishClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        if settings.accept_invalid_certs {
            warn!(
                "TLS certificate validation disabled for {} (acceptInvalidCerts)",
                settings.host
            );
        }

        let client = reqwest::Client::builder()
            .timeout(settings.telemetry_timeout())
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            url: format!("{}{}", base_url(&settings.host), THERMAL_PATH),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// `https://` unless the host already names a scheme
fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

impl TelemetrySource for RedfishClient {
    async fn fetch(&self) -> Result<TelemetrySnapshot> {
        debug!("GET {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| FanControlError::TelemetryUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FanControlError::TelemetryUnavailable(format!(
                "{} returned HTTP {}",
                self.url,
                status.as_u16()
            )));
        }

        let body = response.text().await.map_err(|e| {
            FanControlError::TelemetryUnavailable(format!("failed to read response: {}", e))
        })?;

        TelemetrySnapshot::from_thermal_json(&body).map_err(|e| {
            FanControlError::TelemetryUnavailable(format!("malformed thermal document: {}", e))
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    pub(crate) const THERMAL_FIXTURE: &str = r#"{
        "@odata.id": "/redfish/v1/Chassis/1/Thermal/",
        "Fans": [
            {"FanName": "Fan 1", "CurrentReading": 23, "Status": {"Health": "OK", "State": "Enabled"}},
            {"FanName": "Fan 2", "CurrentReading": 23, "Status": {"Health": "OK", "State": "Enabled"}},
            {"FanName": "Fan 3", "CurrentReading": 0, "Status": {"State": "Absent"}},
            {"FanName": "Fan 4", "CurrentReading": 31, "Status": {"Health": "OK", "State": "Enabled"}}
        ],
        "Temperatures": [
            {"Name": "01-Inlet Ambient", "ReadingCelsius": 24, "Status": {"State": "Enabled"}, "UpperThresholdCritical": 42},
            {"Name": "02-CPU 1", "ReadingCelsius": 48, "Status": {"State": "Enabled"}, "UpperThresholdCritical": 70},
            {"Name": "03-CPU 2", "ReadingCelsius": 53, "Status": {"State": "Enabled"}, "UpperThresholdCritical": 70},
            {"Name": "04-P1 DIMM 1-6", "ReadingCelsius": 35, "Status": {"State": "Enabled"}, "UpperThresholdCritical": 89},
            {"Name": "05-CPU 3", "ReadingCelsius": 99, "Status": {"State": "Absent"}},
            {"Name": "06-Chipset", "ReadingCelsius": null, "Status": {"State": "Enabled"}}
        ]
    }"#;

    #[test]
    fn classifies_by_priority_table() {
        assert_eq!(SensorCategory::classify("02-CPU 1"), SensorCategory::Cpu);
        assert_eq!(SensorCategory::classify("01-Inlet Ambient"), SensorCategory::Ambient);
        assert_eq!(SensorCategory::classify("Ambient"), SensorCategory::Ambient);
        assert_eq!(SensorCategory::classify("04-P1 DIMM 1-6"), SensorCategory::Other);
        // Both patterns match: cpu is checked first
        assert_eq!(SensorCategory::classify("CPU Inlet"), SensorCategory::Cpu);
    }

    #[test]
    fn parses_thermal_document() {
        let snapshot = TelemetrySnapshot::from_thermal_json(THERMAL_FIXTURE).unwrap();

        // Null readings are dropped, disabled ones are kept but flagged
        assert_eq!(snapshot.sensors.len(), 5);
        assert_eq!(snapshot.cpu_temperatures(), vec![48.0, 53.0]);
        assert_eq!(snapshot.max_cpu_temperature(), Some(53.0));
        assert_eq!(snapshot.ambient_temperature(), Some(24.0));
        assert_eq!(snapshot.enabled_fan_count(), 3);
        assert_eq!(snapshot.fan_count(), 3);
        assert_eq!(snapshot.fans[2].name, "Fan 3");
        assert!(!snapshot.fans[2].enabled);
    }

    #[test]
    fn zero_fans_falls_back() {
        let snapshot = TelemetrySnapshot::from_thermal_json(r#"{"Temperatures": []}"#).unwrap();
        assert_eq!(snapshot.enabled_fan_count(), 0);
        assert_eq!(snapshot.fan_count(), FALLBACK_FAN_COUNT);
        assert!(snapshot.cpu_temperatures().is_empty());
        assert_eq!(snapshot.max_cpu_temperature(), None);
        assert_eq!(snapshot.ambient_temperature(), None);
    }

    #[test]
    fn last_ambient_sensor_wins() {
        let json = r#"{"Temperatures": [
            {"Name": "Inlet", "ReadingCelsius": 22, "Status": {"State": "Enabled"}},
            {"Name": "Ambient 2", "ReadingCelsius": 27, "Status": {"State": "Enabled"}}
        ]}"#;
        let snapshot = TelemetrySnapshot::from_thermal_json(json).unwrap();
        assert_eq!(snapshot.ambient_temperature(), Some(27.0));
    }

    #[test]
    fn fan_name_falls_back_to_name_field() {
        let json = r#"{"Fans": [
            {"Name": "Chassis Fan", "Status": {"State": "Enabled"}},
            {"Status": {"State": "Enabled"}}
        ]}"#;
        let snapshot = TelemetrySnapshot::from_thermal_json(json).unwrap();
        assert_eq!(snapshot.fans[0].name, "Chassis Fan");
        assert_eq!(snapshot.fans[1].name, "Fan 2");
        assert_eq!(snapshot.fans[0].reading, None);
    }

    #[test]
    fn rejects_non_json() {
        assert!(TelemetrySnapshot::from_thermal_json("<html>login</html>").is_err());
    }

    #[test]
    fn client_targets_thermal_resource() {
        let settings = Settings {
            host: "10.0.0.5".to_string(),
            ..Settings::default()
        };
        let client = RedfishClient::new(&settings).unwrap();
        assert_eq!(client.url(), "https://10.0.0.5/redfish/v1/chassis/1/Thermal");
    }

    fn settings_for(host: &str) -> Settings {
        Settings {
            host: host.to_string(),
            username: "Administrator".to_string(),
            password: "secret".to_string(),
            telemetry_timeout_secs: 1,
            ..Settings::default()
        }
    }

    /// Answer a single HTTP request with `response`; returns the base URL
    async fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}", address)
    }

    #[test]
    fn url_defaults_to_https() {
        let client = RedfishClient::new(&settings_for("192.168.1.69")).unwrap();
        assert_eq!(client.url(), "https://192.168.1.69/redfish/v1/chassis/1/Thermal");

        let client = RedfishClient::new(&settings_for("http://ilo.lan:8080/")).unwrap();
        assert_eq!(client.url(), "http://ilo.lan:8080/redfish/v1/chassis/1/Thermal");
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        let client = RedfishClient::new(&settings_for("127.0.0.1:1")).unwrap();
        assert!(matches!(
            client.fetch().await,
            Err(FanControlError::TelemetryUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn rejected_credentials_are_unavailable() {
        let base = serve_once(
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_string(),
        )
        .await;
        let client = RedfishClient::new(&settings_for(&base)).unwrap();

        match client.fetch().await {
            Err(FanControlError::TelemetryUnavailable(message)) => {
                assert!(message.contains("401"), "{}", message)
            }
            other => panic!("expected TelemetryUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn garbage_body_is_unavailable() {
        let body = "<html>login</html>";
        let base = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ))
        .await;
        let client = RedfishClient::new(&settings_for(&base)).unwrap();
        assert!(matches!(
            client.fetch().await,
            Err(FanControlError::TelemetryUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn fetches_thermal_document() {
        let base = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            THERMAL_FIXTURE.len(),
            THERMAL_FIXTURE
        ))
        .await;
        let client = RedfishClient::new(&settings_for(&base)).unwrap();

        let snapshot = client.fetch().await.unwrap();
        assert_eq!(snapshot.max_cpu_temperature(), Some(53.0));
        assert_eq!(snapshot.fan_count(), 3);
    }
}
