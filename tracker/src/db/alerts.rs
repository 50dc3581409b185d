use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::is_foreign_key_violation;
use crate::errors::{Error, Result};
use crate::model::{Alert, AlertId, DeviceId};
use crate::ports::{AlertRepository, CreateAlertInput};

const ALERT_COLUMNS: &str =
    "id, device_id, reading_id, alert_type, message, status, created_at, serviced_at";

#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    id: i64,
    device_id: i64,
    reading_id: Option<i64>,
    alert_type: String,
    message: String,
    status: String,
    created_at: DateTime<Utc>,
    serviced_at: Option<DateTime<Utc>>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = Error;

    fn try_from(row: AlertRow) -> Result<Self> {
        let status = row
            .status
            .parse()
            .map_err(|e| Error::Internal(format!("alert {}: {}", row.id, e)))?;

        Ok(Alert {
            id: row.id,
            device_id: row.device_id,
            reading_id: row.reading_id,
            alert_type: row.alert_type,
            message: row.message,
            status,
            created_at: row.created_at,
            serviced_at: row.serviced_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgAlertRepository {
    pool: PgPool,
}

impl PgAlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRepository for PgAlertRepository {
    async fn create(&self, input: CreateAlertInput) -> Result<Alert> {
        let query = format!(
            "INSERT INTO alerts (device_id, reading_id, alert_type, message, status) \
             VALUES ($1, $2, $3, $4, 'open') RETURNING {}",
            ALERT_COLUMNS
        );

        sqlx::query_as::<_, AlertRow>(&query)
            .bind(input.device_id)
            .bind(input.reading_id)
            .bind(&input.alert_type)
            .bind(&input.message)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::NotFound(format!("device {} not found", input.device_id))
                } else {
                    Error::Database(e)
                }
            })?
            .try_into()
    }

    async fn get_open_by_device(&self, device_id: DeviceId) -> Result<Option<Alert>> {
        let query = format!(
            "SELECT {} FROM alerts WHERE device_id = $1 AND status = 'open' \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            ALERT_COLUMNS
        );

        sqlx::query_as::<_, AlertRow>(&query)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Alert::try_from)
            .transpose()
    }

    async fn list_open_by_device(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Alert>> {
        let query = format!(
            "SELECT {} FROM alerts WHERE device_id = $1 AND status = 'open' \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            ALERT_COLUMNS
        );

        sqlx::query_as::<_, AlertRow>(&query)
            .bind(device_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Alert::try_from)
            .collect()
    }

    async fn resolve(&self, id: AlertId, serviced_at: Option<DateTime<Utc>>) -> Result<Alert> {
        let query = format!(
            "UPDATE alerts SET status = 'serviced', serviced_at = COALESCE($2, NOW()) \
             WHERE id = $1 RETURNING {}",
            ALERT_COLUMNS
        );

        sqlx::query_as::<_, AlertRow>(&query)
            .bind(id)
            .bind(serviced_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("alert {} not found", id)))?
            .try_into()
    }
}
