use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type DeviceId = i64;
pub type PlanId = i64;
pub type ReadingId = i64;
pub type AlertId = i64;

pub const ALERT_TYPE_MAINTENANCE_DUE: &str = "maintenance_due";
pub const ALERT_LEVEL_HIGH: &str = "HIGH";
pub const ALERT_LEVEL_LOW: &str = "LOW";

/// Operational status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Active,
    /// Scheduled maintenance in progress
    Maintenance,
    /// Unplanned repair in progress
    Repair,
    MidRepair,
    Decommissioned,
}

impl DeviceStatus {
    pub const ALL: [DeviceStatus; 5] = [
        DeviceStatus::Active,
        DeviceStatus::Maintenance,
        DeviceStatus::Repair,
        DeviceStatus::MidRepair,
        DeviceStatus::Decommissioned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Maintenance => "maintenance",
            DeviceStatus::Repair => "repair",
            DeviceStatus::MidRepair => "mid_repair",
            DeviceStatus::Decommissioned => "decommissioned",
        }
    }

    /// Technical work is underway; the device must not be deleted.
    pub fn is_under_work(&self) -> bool {
        matches!(self, DeviceStatus::Maintenance | DeviceStatus::Repair)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid status '{}'", s))
    }
}

/// Static facts about the hardware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub year: i32,
    pub commission_date: Option<NaiveDate>,
}

/// Usage counters and location, updated as the device is operated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalState {
    pub location: Option<String>,
    pub total_hours: i32,
    pub after_overhaul_hours: i32,
    pub last_reading_at: Option<DateTime<Utc>>,
    pub last_service_at: Option<DateTime<Utc>>,
    pub expected_next_maintenance: Option<DateTime<Utc>>,
    pub avg_daily_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditMeta {
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub deleted_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub serial_number: String,
    pub name: String,
    #[serde(flatten)]
    pub profile: DeviceProfile,
    #[serde(flatten)]
    pub state: OperationalState,
    pub status: DeviceStatus,
    pub plan_id: Option<PlanId>,
    #[serde(flatten)]
    pub audit: AuditMeta,
}

/// Maintenance policy. `interval_hours` drives the maintenance-due check,
/// the optional value range drives reading breaches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub interval_hours: i32,
    pub threshold_min: Option<f64>,
    pub threshold_max: Option<f64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of checking a value against a plan's range
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    pub level: &'static str,
    pub message: String,
}

impl Plan {
    pub fn range(&self) -> Option<(f64, f64)> {
        match (self.threshold_min, self.threshold_max) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }

    /// Bounds are inclusive. Plans without a range never breach.
    pub fn breach(&self, value: f64) -> Option<Breach> {
        let (min, max) = self.range()?;
        if value >= min && value <= max {
            return None;
        }
        let level = if value > max {
            ALERT_LEVEL_HIGH
        } else {
            ALERT_LEVEL_LOW
        };
        Some(Breach {
            level,
            message: format!("Value {:.2} out of range [{:.2}, {:.2}]", value, min, max),
        })
    }

    pub fn is_due(&self, after_overhaul_hours: i32) -> bool {
        self.interval_hours > 0 && after_overhaul_hours >= self.interval_hours
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    pub id: ReadingId,
    pub device_id: DeviceId,
    pub at: DateTime<Utc>,
    pub value: f64,
    pub location: Option<String>,
    pub operator_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Serviced,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Serviced => "serviced",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(AlertStatus::Open),
            "serviced" => Ok(AlertStatus::Serviced),
            other => Err(format!("invalid alert status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub device_id: DeviceId,
    pub reading_id: Option<ReadingId>,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub message: String,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub serviced_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_open(&self) -> bool {
        self.status == AlertStatus::Open
    }
}

/// Maintenance work performed on a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MaintenanceEvent {
    pub id: i64,
    pub device_id: DeviceId,
    pub at: DateTime<Utc>,
    pub interval_hours: Option<i32>,
    pub notes: Option<String>,
    pub performed_by: Option<String>,
    pub cost: Option<f64>,
}
