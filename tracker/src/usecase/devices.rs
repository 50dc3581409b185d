use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::errors::{Error, Result};
use crate::metrics::{ALERTS_CREATED_TOTAL, DEVICES_CREATED_TOTAL};
use crate::model::{Device, DeviceId, DeviceStatus, Plan, PlanId, ALERT_TYPE_MAINTENANCE_DUE};
use crate::ports::{
    AlertRepository, Clock, CreateAlertInput, CreateDeviceInput, DeviceRepository,
    PlanRepository, SystemClock, UpdateDeviceBasicInput,
};
use crate::validate::{
    non_empty, parse_status, require_non_empty, validate_commission_date, validate_hours,
    validate_year,
};

pub const MAINTENANCE_DUE_MESSAGE: &str =
    "Device has exceeded the maintenance interval of its newly assigned plan";

/// Upper bound on open alerts scanned when looking for a maintenance-due alert
const OPEN_ALERT_SCAN_LIMIT: i64 = 50;

#[derive(Debug, Clone, Default)]
pub struct CreateDeviceCommand {
    pub serial_number: String,
    pub name: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub year: i32,
    pub commission_date: Option<NaiveDate>,
    /// Defaults to `active`
    pub status: Option<String>,
    pub location: Option<String>,
    pub plan_id: Option<PlanId>,
    pub total_hours: Option<i32>,
    pub after_overhaul_hours: Option<i32>,
    pub actor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateDeviceBasicCommand {
    pub id: DeviceId,
    pub name: String,
    pub status: String,
    pub location: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateDevicePlanCommand {
    pub id: DeviceId,
    /// `None` removes the plan
    pub plan_id: Option<PlanId>,
    pub actor: Option<String>,
}

/// Device lifecycle: creation, updates, plan assignment and soft deletion
pub struct DeviceService {
    devices: Arc<dyn DeviceRepository>,
    plans: Arc<dyn PlanRepository>,
    alerts: Arc<dyn AlertRepository>,
    clock: Arc<dyn Clock>,
}

impl DeviceService {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        plans: Arc<dyn PlanRepository>,
        alerts: Arc<dyn AlertRepository>,
    ) -> Self {
        Self {
            devices,
            plans,
            alerts,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn create(&self, cmd: CreateDeviceCommand) -> Result<Device> {
        let serial_number = require_non_empty("serial_number", &cmd.serial_number)?;
        let name = require_non_empty("name", &cmd.name)?;
        validate_year(cmd.year)?;
        validate_commission_date(cmd.commission_date, self.clock.now().date_naive())?;

        let status = match cmd.status.as_deref().map(str::trim) {
            None | Some("") => DeviceStatus::Active,
            Some(s) => parse_status(s)?,
        };

        let total_hours = cmd.total_hours.unwrap_or(0);
        let after_overhaul_hours = cmd.after_overhaul_hours.unwrap_or(0);
        validate_hours("total_hours", total_hours)?;
        validate_hours("after_overhaul_hours", after_overhaul_hours)?;

        if let Some(plan_id) = cmd.plan_id {
            self.plans.get_by_id(plan_id).await?;
        }

        debug!(serial_number = %serial_number, "Creating device");

        let device = self
            .devices
            .create(CreateDeviceInput {
                serial_number,
                name,
                model: non_empty(cmd.model),
                manufacturer: non_empty(cmd.manufacturer),
                year: cmd.year,
                commission_date: cmd.commission_date,
                status,
                location: non_empty(cmd.location),
                total_hours,
                after_overhaul_hours,
                plan_id: cmd.plan_id,
                created_by: cmd.actor,
            })
            .await?;

        DEVICES_CREATED_TOTAL.inc();
        info!(device_id = device.id, serial_number = %device.serial_number, "Device created");
        Ok(device)
    }

    pub async fn get(&self, id: DeviceId) -> Result<Device> {
        self.devices.get_by_id(id).await
    }

    /// Paging bounds are clamped by the caller
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Device>> {
        self.devices.list(limit, offset).await
    }

    /// Any status transition is allowed, including decommissioned -> active.
    pub async fn update_basic(&self, cmd: UpdateDeviceBasicCommand) -> Result<Device> {
        let name = require_non_empty("name", &cmd.name)?;
        let status = parse_status(cmd.status.trim())?;

        self.devices
            .update_basic(UpdateDeviceBasicInput {
                id: cmd.id,
                name,
                status,
                location: cmd.location,
                updated_by: cmd.actor,
            })
            .await
    }

    /// Assigns or removes the device's plan. When a newly assigned plan is
    /// already due, a `maintenance_due` alert is opened unless one is open.
    pub async fn update_plan(&self, cmd: UpdateDevicePlanCommand) -> Result<Device> {
        let plan = match cmd.plan_id {
            Some(plan_id) => Some(self.plans.get_by_id(plan_id).await?),
            None => None,
        };

        let device = self
            .devices
            .update_plan(cmd.id, cmd.plan_id, cmd.actor)
            .await?;

        match &plan {
            Some(plan) if plan.is_due(device.state.after_overhaul_hours) => {
                self.open_maintenance_due_alert(&device, plan).await;
            }
            Some(_) => {}
            None => debug!(device_id = device.id, "Plan removed from device"),
        }

        Ok(device)
    }

    // Best effort: failures are logged, the plan update itself already succeeded.
    async fn open_maintenance_due_alert(&self, device: &Device, plan: &Plan) {
        let open = match self
            .alerts
            .list_open_by_device(device.id, OPEN_ALERT_SCAN_LIMIT, 0)
            .await
        {
            Ok(open) => open,
            Err(e) => {
                warn!(device_id = device.id, error = %e, "Failed to list open alerts");
                return;
            }
        };

        if open
            .iter()
            .any(|a| a.alert_type == ALERT_TYPE_MAINTENANCE_DUE)
        {
            debug!(device_id = device.id, "Maintenance-due alert already open");
            return;
        }

        let input = CreateAlertInput {
            device_id: device.id,
            reading_id: None,
            alert_type: ALERT_TYPE_MAINTENANCE_DUE.to_string(),
            message: MAINTENANCE_DUE_MESSAGE.to_string(),
        };

        match self.alerts.create(input).await {
            Ok(alert) => {
                ALERTS_CREATED_TOTAL
                    .with_label_values(&[ALERT_TYPE_MAINTENANCE_DUE])
                    .inc();
                info!(
                    device_id = device.id,
                    alert_id = alert.id,
                    plan_id = plan.id,
                    after_overhaul_hours = device.state.after_overhaul_hours,
                    interval_hours = plan.interval_hours,
                    "Maintenance-due alert opened"
                );
            }
            Err(e) => {
                warn!(device_id = device.id, error = %e, "Failed to open maintenance-due alert");
            }
        }
    }

    /// Refuses while technical work is in progress or alerts are open.
    /// `mid_repair` devices may be deleted.
    pub async fn soft_delete(&self, id: DeviceId, actor: Option<String>) -> Result<()> {
        let device = self.devices.get_by_id(id).await?;

        if device.status.is_under_work() {
            return Err(Error::Validation(format!(
                "cannot delete device {} while it is under {}",
                id, device.status
            )));
        }

        let open = self.alerts.list_open_by_device(id, 1, 0).await?;
        if !open.is_empty() {
            return Err(Error::Validation(format!(
                "cannot delete device {} while it has open alerts",
                id
            )));
        }

        self.devices.soft_delete(id, actor).await?;
        info!(device_id = id, "Device soft-deleted");
        Ok(())
    }
}
