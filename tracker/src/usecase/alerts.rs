use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::metrics::{ALERTS_CREATED_TOTAL, NOTIFY_FAILURES_TOTAL};
use crate::model::{Alert, AlertId, DeviceId};
use crate::ports::{
    AlertRepository, CreateAlertInput, DeviceRepository, Notifier, PlanRepository,
    ReadingRepository,
};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ComputeAlertInput {
    pub device_id: DeviceId,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComputeAlertOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    pub created: bool,
}

impl ComputeAlertOutput {
    fn none() -> Self {
        Self {
            alert: None,
            created: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarkServicedInput {
    pub alert_id: AlertId,
    /// `None` stamps the current database time
    pub serviced_at: Option<DateTime<Utc>>,
}

/// Evaluates a device's latest reading against its plan
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertComputer: Send + Sync {
    async fn compute(&self, input: ComputeAlertInput) -> Result<ComputeAlertOutput>;
}

/// Alert computation and resolution
pub struct AlertService {
    readings: Arc<dyn ReadingRepository>,
    devices: Arc<dyn DeviceRepository>,
    plans: Arc<dyn PlanRepository>,
    alerts: Arc<dyn AlertRepository>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl AlertService {
    pub fn new(
        readings: Arc<dyn ReadingRepository>,
        devices: Arc<dyn DeviceRepository>,
        plans: Arc<dyn PlanRepository>,
        alerts: Arc<dyn AlertRepository>,
    ) -> Self {
        Self {
            readings,
            devices,
            plans,
            alerts,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Marks the alert serviced. Resolving an already serviced alert succeeds
    /// and restamps `serviced_at`.
    pub async fn resolve(&self, input: MarkServicedInput) -> Result<Alert> {
        let alert = self
            .alerts
            .resolve(input.alert_id, input.serviced_at)
            .await?;
        info!(alert_id = alert.id, device_id = alert.device_id, "Alert serviced");
        Ok(alert)
    }

    pub async fn list_open(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Alert>> {
        self.alerts
            .list_open_by_device(device_id, limit, offset)
            .await
    }

    async fn notify(&self, alert: &Alert) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(e) = notifier.notify_alert(alert).await {
            NOTIFY_FAILURES_TOTAL.inc();
            warn!(alert_id = alert.id, error = %e, "Alert notification failed");
        }
    }
}

#[async_trait]
impl AlertComputer for AlertService {
    async fn compute(&self, input: ComputeAlertInput) -> Result<ComputeAlertOutput> {
        let device_id = input.device_id;

        let Some(reading) = self.readings.last_by_device(device_id).await? else {
            debug!(device_id, "No readings, nothing to compute");
            return Ok(ComputeAlertOutput::none());
        };

        let device = self.devices.get_by_id(device_id).await?;
        let Some(plan_id) = device.plan_id else {
            debug!(device_id, "No plan assigned, nothing to compute");
            return Ok(ComputeAlertOutput::none());
        };
        let plan = self.plans.get_by_id(plan_id).await?;

        let Some(breach) = plan.breach(reading.value) else {
            return Ok(ComputeAlertOutput::none());
        };

        // One open alert per device at a time
        if let Some(open) = self.alerts.get_open_by_device(device_id).await? {
            if open.is_open() {
                debug!(device_id, alert_id = open.id, "Reusing open alert");
                return Ok(ComputeAlertOutput {
                    alert: Some(open),
                    created: false,
                });
            }
        }

        let alert = self
            .alerts
            .create(CreateAlertInput {
                device_id,
                reading_id: Some(reading.id),
                alert_type: breach.level.to_string(),
                message: breach.message,
            })
            .await?;

        ALERTS_CREATED_TOTAL.with_label_values(&[breach.level]).inc();
        info!(
            device_id,
            alert_id = alert.id,
            reading_id = reading.id,
            level = breach.level,
            "Breach alert opened"
        );

        self.notify(&alert).await;

        Ok(ComputeAlertOutput {
            alert: Some(alert),
            created: true,
        })
    }
}
