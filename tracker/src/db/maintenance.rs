use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::model::{DeviceId, MaintenanceEvent};
use crate::ports::{CreateMaintenanceInput, MaintenanceRepository};

const EVENT_COLUMNS: &str = "id, device_id, at, interval_hours, notes, performed_by, cost";

#[derive(Debug, Clone)]
pub struct PgMaintenanceRepository {
    pool: PgPool,
}

impl PgMaintenanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MaintenanceRepository for PgMaintenanceRepository {
    async fn record(&self, input: CreateMaintenanceInput) -> Result<MaintenanceEvent> {
        let mut tx = self.pool.begin().await?;

        // A back-filled event never moves last_service_at backwards.
        let at: DateTime<Utc> = sqlx::query_scalar(
            "UPDATE devices SET after_overhaul_hours = 0, \
             last_service_at = GREATEST(last_service_at, COALESCE($2, NOW())), \
             updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING COALESCE($2::timestamptz, NOW())",
        )
        .bind(input.device_id)
        .bind(input.at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("device {} not found", input.device_id)))?;

        let query = format!(
            "INSERT INTO maintenance_events \
             (device_id, at, interval_hours, notes, performed_by, cost) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            EVENT_COLUMNS
        );

        let event = sqlx::query_as::<_, MaintenanceEvent>(&query)
            .bind(input.device_id)
            .bind(at)
            .bind(input.interval_hours)
            .bind(&input.notes)
            .bind(&input.performed_by)
            .bind(input.cost)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(device_id = event.device_id, event_id = event.id, "Maintenance recorded");
        Ok(event)
    }

    async fn list_by_device(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MaintenanceEvent>> {
        let query = format!(
            "SELECT {} FROM maintenance_events WHERE device_id = $1 \
             ORDER BY at DESC, id DESC LIMIT $2 OFFSET $3",
            EVENT_COLUMNS
        );

        let events = sqlx::query_as::<_, MaintenanceEvent>(&query)
            .bind(device_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }
}
