use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::{Error, Result};
use crate::model::{DeviceId, Reading};
use crate::ports::{CreateReadingInput, ReadingRepository};

const READING_COLUMNS: &str = "id, device_id, at, value, location, operator_id";

#[derive(Debug, Clone)]
pub struct PgReadingRepository {
    pool: PgPool,
}

impl PgReadingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingRepository for PgReadingRepository {
    async fn create(&self, input: CreateReadingInput) -> Result<Reading> {
        let mut tx = self.pool.begin().await?;

        // Selecting from devices keeps readings off soft-deleted rows
        let query = format!(
            "INSERT INTO readings (device_id, at, value, location, operator_id) \
             SELECT id, COALESCE($2, NOW()), $3, $4, $5 FROM devices \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {}",
            READING_COLUMNS
        );

        let reading = sqlx::query_as::<_, Reading>(&query)
            .bind(input.device_id)
            .bind(input.at)
            .bind(input.value)
            .bind(&input.location)
            .bind(&input.operator_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("device {} not found", input.device_id)))?;

        sqlx::query(
            "UPDATE devices SET last_reading_at = GREATEST(last_reading_at, $2) WHERE id = $1",
        )
        .bind(reading.device_id)
        .bind(reading.at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(reading)
    }

    async fn last_by_device(&self, device_id: DeviceId) -> Result<Option<Reading>> {
        let query = format!(
            "SELECT {} FROM readings WHERE device_id = $1 ORDER BY at DESC, id DESC LIMIT 1",
            READING_COLUMNS
        );

        let reading = sqlx::query_as::<_, Reading>(&query)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(reading)
    }

    async fn list_by_device(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Reading>> {
        let query = format!(
            "SELECT {} FROM readings WHERE device_id = $1 \
             ORDER BY at DESC, id DESC LIMIT $2 OFFSET $3",
            READING_COLUMNS
        );

        let readings = sqlx::query_as::<_, Reading>(&query)
            .bind(device_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(readings)
    }
}
