//! Fixtures shared by the unit tests

use crate::model::{
    Alert, AlertStatus, AuditMeta, Device, DeviceId, DeviceProfile, DeviceStatus,
    OperationalState, Plan, PlanId, Reading,
};
use chrono::Utc;

pub fn device(id: DeviceId, status: DeviceStatus, after_overhaul_hours: i32) -> Device {
    let now = Utc::now();
    Device {
        id,
        serial_number: format!("SN-{}", id),
        name: format!("device-{}", id),
        profile: DeviceProfile {
            model: None,
            manufacturer: None,
            year: 2020,
            commission_date: None,
        },
        state: OperationalState {
            location: None,
            total_hours: after_overhaul_hours,
            after_overhaul_hours,
            last_reading_at: None,
            last_service_at: None,
            expected_next_maintenance: None,
            avg_daily_hours: 0.0,
        },
        status,
        plan_id: None,
        audit: AuditMeta {
            created_by: None,
            updated_by: None,
            deleted_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        },
    }
}

pub fn device_with_plan(id: DeviceId, plan_id: PlanId) -> Device {
    Device {
        plan_id: Some(plan_id),
        ..device(id, DeviceStatus::Active, 0)
    }
}

pub fn interval_plan(id: PlanId, interval_hours: i32) -> Plan {
    Plan {
        id,
        name: format!("plan-{}", id),
        interval_hours,
        threshold_min: None,
        threshold_max: None,
        description: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn range_plan(id: PlanId, min: f64, max: f64) -> Plan {
    Plan {
        threshold_min: Some(min),
        threshold_max: Some(max),
        ..interval_plan(id, 0)
    }
}

pub fn reading(id: i64, device_id: DeviceId, value: f64) -> Reading {
    Reading {
        id,
        device_id,
        at: Utc::now(),
        value,
        location: None,
        operator_id: None,
    }
}

pub fn open_alert(id: i64, device_id: DeviceId, alert_type: &str) -> Alert {
    Alert {
        id,
        device_id,
        reading_id: None,
        alert_type: alert_type.to_string(),
        message: "test".to_string(),
        status: AlertStatus::Open,
        created_at: Utc::now(),
        serviced_at: None,
    }
}
