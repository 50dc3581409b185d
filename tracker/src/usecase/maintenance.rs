use std::sync::Arc;

use tracing::info;

use crate::errors::Result;
use crate::model::{DeviceId, MaintenanceEvent};
use crate::ports::{CreateMaintenanceInput, DeviceRepository, MaintenanceRepository};
use crate::validate::{non_empty, validate_maintenance};

/// Records performed maintenance. Recording an event resets the device's
/// after-overhaul hours.
pub struct MaintenanceService {
    devices: Arc<dyn DeviceRepository>,
    maintenance: Arc<dyn MaintenanceRepository>,
}

impl MaintenanceService {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        maintenance: Arc<dyn MaintenanceRepository>,
    ) -> Self {
        Self {
            devices,
            maintenance,
        }
    }

    pub async fn record(&self, input: CreateMaintenanceInput) -> Result<MaintenanceEvent> {
        validate_maintenance(&input)?;

        // Soft-deleted devices are rejected here as NotFound
        self.devices.get_by_id(input.device_id).await?;

        let event = self
            .maintenance
            .record(CreateMaintenanceInput {
                notes: non_empty(input.notes),
                performed_by: non_empty(input.performed_by),
                ..input
            })
            .await?;

        info!(device_id = event.device_id, event_id = event.id, "Maintenance recorded");
        Ok(event)
    }

    pub async fn list(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MaintenanceEvent>> {
        self.maintenance
            .list_by_device(device_id, limit, offset)
            .await
    }
}
