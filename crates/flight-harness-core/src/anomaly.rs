//! Heuristic anomaly detection over telemetry records.
//!
//! [`summarize`] makes one pass over a record sequence and classifies each
//! record by its type:
//!
//! | Message type | Field | Condition | Finding |
//! |--------------|-------|-----------|---------|
//! | `GPS_RAW_INT`, `GLOBAL_POSITION_INT` | `alt` / `altitude` | present | altitude range only |
//! | `BATTERY_STATUS` | `temperature` | `>= battery_temp_high` | `battery_overheat` |
//! | `GPS_RAW_INT` | `fix_type` | `== gps_fix_lost` | `gps_loss` |
//! | `RC_CHANNELS` | `rssi` | `< rc_rssi_low` | `rc_signal_weak` |
//! | `STATUSTEXT` | `severity` | `>= status_severity_min` | `status_error` |
//!
//! `altitude` is consulted only when the record has no `alt` key at all; an
//! explicit `"alt": null` hides it. Non-numeric altitudes are not observed.
//!
//! The result is advisory. Only the first [`MAX_EXAMPLES`] findings are kept
//! as examples, in scan order, while `counts` covers every finding.

use serde::{Deserialize, Serialize};

use crate::models::message_types::{
    BATTERY_STATUS, GLOBAL_POSITION_INT, GPS_RAW_INT, RC_CHANNELS, STATUSTEXT,
};
use crate::models::TelemetryMessage;

/// Maximum findings carried in [`AnomalySummary::examples`].
pub const MAX_EXAMPLES: usize = 5;

const NOTE_NO_DATA: &str = "No telemetry available.";
const NOTE_CLEAN: &str = "No obvious anomalies detected by heuristics.";
const NOTE_FINDINGS: &str = "Heuristic findings included; verify with LLM reasoning.";

/// Detection thresholds.
///
/// These are part of the detection contract and are exposed as the
/// `[anomaly]` configuration table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyThresholds {
    /// Battery temperature at or above which a record is flagged (source units, nominally °C).
    #[serde(default = "default_battery_temp_high")]
    pub battery_temp_high: f64,
    /// `fix_type` value meaning "no GPS fix".
    #[serde(default = "default_gps_fix_lost")]
    pub gps_fix_lost: i64,
    /// RC RSSI strictly below which the link is considered weak.
    #[serde(default = "default_rc_rssi_low")]
    pub rc_rssi_low: f64,
    /// Minimum STATUSTEXT severity reported as an error.
    #[serde(default = "default_status_severity_min")]
    pub status_severity_min: i64,
}

fn default_battery_temp_high() -> f64 {
    60.0
}
fn default_gps_fix_lost() -> i64 {
    0
}
fn default_rc_rssi_low() -> f64 {
    50.0
}
fn default_status_severity_min() -> i64 {
    4
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            battery_temp_high: default_battery_temp_high(),
            gps_fix_lost: default_gps_fix_lost(),
            rc_rssi_low: default_rc_rssi_low(),
            status_severity_min: default_status_severity_min(),
        }
    }
}

/// Kind of a heuristic finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    BatteryOverheat,
    GpsLoss,
    RcSignalWeak,
    StatusError,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::BatteryOverheat => "battery_overheat",
            FindingKind::GpsLoss => "gps_loss",
            FindingKind::RcSignalWeak => "rc_signal_weak",
            FindingKind::StatusError => "status_error",
        }
    }
}

/// A single heuristic anomaly event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFinding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub timestamp: f64,
    pub detail: String,
}

/// Overall outcome of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    /// The input sequence was empty.
    NoData,
    /// Records were scanned and nothing triggered.
    Clean,
    /// At least one finding was produced.
    Ok,
}

impl AnomalyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyStatus::NoData => "no_data",
            AnomalyStatus::Clean => "clean",
            AnomalyStatus::Ok => "ok",
        }
    }
}

/// Number of findings per category, uncapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyCounts {
    pub gps_loss: u64,
    pub rc_loss: u64,
    pub high_severity_errors: u64,
    pub battery_temp_high: u64,
}

impl AnomalyCounts {
    pub fn total(&self) -> u64 {
        self.gps_loss + self.rc_loss + self.high_severity_errors + self.battery_temp_high
    }
}

/// Running min/max of a reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValueRange {
    fn observe(&mut self, value: f64) {
        if self.max.map_or(true, |m| value > m) {
            self.max = Some(value);
        }
        if self.min.map_or(true, |m| value < m) {
            self.min = Some(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Aggregate of heuristic findings for one record sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub status: AnomalyStatus,
    pub counts: AnomalyCounts,
    pub altitude_range: ValueRange,
    pub battery_temp_max: Option<f64>,
    /// First findings in scan order, at most [`MAX_EXAMPLES`].
    pub examples: Vec<AnomalyFinding>,
    pub notes: Vec<String>,
}

impl AnomalySummary {
    fn no_data() -> Self {
        Self {
            status: AnomalyStatus::NoData,
            counts: AnomalyCounts::default(),
            altitude_range: ValueRange::default(),
            battery_temp_max: None,
            examples: Vec::new(),
            notes: vec![NOTE_NO_DATA.to_string()],
        }
    }
}

/// Accumulates findings during a scan, keeping only the first examples.
struct Scan<'a> {
    thresholds: &'a AnomalyThresholds,
    counts: AnomalyCounts,
    altitude: ValueRange,
    battery_temp_max: Option<f64>,
    examples: Vec<AnomalyFinding>,
}

impl<'a> Scan<'a> {
    fn new(thresholds: &'a AnomalyThresholds) -> Self {
        Self {
            thresholds,
            counts: AnomalyCounts::default(),
            altitude: ValueRange::default(),
            battery_temp_max: None,
            examples: Vec::with_capacity(MAX_EXAMPLES),
        }
    }

    fn record(&mut self, kind: FindingKind, timestamp: f64, detail: String) {
        match kind {
            FindingKind::BatteryOverheat => self.counts.battery_temp_high += 1,
            FindingKind::GpsLoss => self.counts.gps_loss += 1,
            FindingKind::RcSignalWeak => self.counts.rc_loss += 1,
            FindingKind::StatusError => self.counts.high_severity_errors += 1,
        }
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.push(AnomalyFinding {
                kind,
                timestamp,
                detail,
            });
        }
    }

    fn visit(&mut self, msg: &TelemetryMessage) {
        let ts = msg.timestamp.unwrap_or(0.0);
        let t = self.thresholds;

        match msg.message_type.as_str() {
            GPS_RAW_INT | GLOBAL_POSITION_INT => {
                let alt = match msg.fields.get("alt") {
                    Some(v) => v.as_f64(),
                    None => msg.number("altitude"),
                };
                if let Some(alt) = alt {
                    self.altitude.observe(alt);
                }
                if msg.is_type(GPS_RAW_INT)
                    && msg.number("fix_type") == Some(t.gps_fix_lost as f64)
                {
                    self.record(
                        FindingKind::GpsLoss,
                        ts,
                        format!("GPS fix lost (fix_type={})", t.gps_fix_lost),
                    );
                }
            }
            BATTERY_STATUS => {
                if let Some(temp) = msg.number("temperature") {
                    if self.battery_temp_max.map_or(true, |m| temp > m) {
                        self.battery_temp_max = Some(temp);
                    }
                    if temp >= t.battery_temp_high {
                        self.record(
                            FindingKind::BatteryOverheat,
                            ts,
                            format!("Battery temp high ({}C)", temp),
                        );
                    }
                }
            }
            RC_CHANNELS => {
                if let Some(rssi) = msg.number("rssi") {
                    if rssi < t.rc_rssi_low {
                        self.record(
                            FindingKind::RcSignalWeak,
                            ts,
                            format!("RC RSSI low ({})", rssi),
                        );
                    }
                }
            }
            STATUSTEXT => {
                if let Some(severity) = msg.number("severity") {
                    if severity >= t.status_severity_min as f64 {
                        let text = msg.text("text").unwrap_or_default();
                        self.record(
                            FindingKind::StatusError,
                            ts,
                            format!("Severity {}: {}", severity, text),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> AnomalySummary {
        let (status, note) = if self.counts.total() == 0 {
            (AnomalyStatus::Clean, NOTE_CLEAN)
        } else {
            (AnomalyStatus::Ok, NOTE_FINDINGS)
        };
        AnomalySummary {
            status,
            counts: self.counts,
            altitude_range: self.altitude,
            battery_temp_max: self.battery_temp_max,
            examples: self.examples,
            notes: vec![note.to_string()],
        }
    }
}

/// Scan `messages` once and summarize heuristic findings.
///
/// Deterministic: the same input and thresholds always yield the same
/// summary. An empty input yields [`AnomalyStatus::NoData`].
pub fn summarize(messages: &[TelemetryMessage], thresholds: &AnomalyThresholds) -> AnomalySummary {
    if messages.is_empty() {
        return AnomalySummary::no_data();
    }

    let mut scan = Scan::new(thresholds);
    for msg in messages {
        scan.visit(msg);
    }
    scan.finish()
}
