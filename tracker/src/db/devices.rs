use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::debug;

use super::{is_foreign_key_violation, is_unique_violation};
use crate::errors::{Error, Result};
use crate::model::{AuditMeta, Device, DeviceId, DeviceProfile, OperationalState, PlanId};
use crate::ports::{CreateDeviceInput, DeviceRepository, UpdateDeviceBasicInput};

const DEVICE_COLUMNS: &str = "id, serial_number, name, model, manufacturer, year_of_manufacture, \
     commission_date, location, total_hours, after_overhaul_hours, last_reading_at, \
     last_service_at, expected_next_maint, avg_daily_hours, status, plan_id, \
     created_by, updated_by, deleted_by, created_at, updated_at, deleted_at";

#[derive(Debug, sqlx::FromRow)]
struct DeviceRow {
    id: i64,
    serial_number: String,
    name: String,
    model: Option<String>,
    manufacturer: Option<String>,
    year_of_manufacture: i32,
    commission_date: Option<NaiveDate>,
    location: Option<String>,
    total_hours: i32,
    after_overhaul_hours: i32,
    last_reading_at: Option<DateTime<Utc>>,
    last_service_at: Option<DateTime<Utc>>,
    expected_next_maint: Option<DateTime<Utc>>,
    avg_daily_hours: f64,
    status: String,
    plan_id: Option<i64>,
    created_by: Option<String>,
    updated_by: Option<String>,
    deleted_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DeviceRow> for Device {
    type Error = Error;

    fn try_from(row: DeviceRow) -> Result<Self> {
        let status = row.status.parse().map_err(|e| {
            Error::Internal(format!("device {} has corrupt status: {}", row.id, e))
        })?;

        Ok(Device {
            id: row.id,
            serial_number: row.serial_number,
            name: row.name,
            profile: DeviceProfile {
                model: row.model,
                manufacturer: row.manufacturer,
                year: row.year_of_manufacture,
                commission_date: row.commission_date,
            },
            state: OperationalState {
                location: row.location,
                total_hours: row.total_hours,
                after_overhaul_hours: row.after_overhaul_hours,
                last_reading_at: row.last_reading_at,
                last_service_at: row.last_service_at,
                expected_next_maintenance: row.expected_next_maint,
                avg_daily_hours: row.avg_daily_hours,
            },
            status,
            plan_id: row.plan_id,
            audit: AuditMeta {
                created_by: row.created_by,
                updated_by: row.updated_by,
                deleted_by: row.deleted_by,
                created_at: row.created_at,
                updated_at: row.updated_at,
                deleted_at: row.deleted_at,
            },
        })
    }
}

fn device_not_found(id: DeviceId) -> Error {
    Error::NotFound(format!("device {} not found", id))
}

#[derive(Debug, Clone)]
pub struct PgDeviceRepository {
    pool: PgPool,
}

impl PgDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRepository for PgDeviceRepository {
    async fn create(&self, input: CreateDeviceInput) -> Result<Device> {
        let query = format!(
            "INSERT INTO devices (serial_number, name, model, manufacturer, year_of_manufacture, \
             commission_date, status, location, total_hours, after_overhaul_hours, plan_id, \
             created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12) \
             RETURNING {}",
            DEVICE_COLUMNS
        );

        let row = sqlx::query_as::<_, DeviceRow>(&query)
            .bind(&input.serial_number)
            .bind(&input.name)
            .bind(&input.model)
            .bind(&input.manufacturer)
            .bind(input.year)
            .bind(input.commission_date)
            .bind(input.status.as_str())
            .bind(&input.location)
            .bind(input.total_hours)
            .bind(input.after_overhaul_hours)
            .bind(input.plan_id)
            .bind(&input.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict(format!(
                        "serial number {} already exists",
                        input.serial_number
                    ))
                } else if is_foreign_key_violation(&e) {
                    Error::NotFound(format!("plan {:?} not found", input.plan_id))
                } else {
                    Error::Database(e)
                }
            })?;

        debug!(device_id = row.id, "Device row inserted");
        row.try_into()
    }

    async fn get_by_id(&self, id: DeviceId) -> Result<Device> {
        let query = format!(
            "SELECT {} FROM devices WHERE id = $1 AND deleted_at IS NULL",
            DEVICE_COLUMNS
        );

        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| device_not_found(id))?
            .try_into()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Device>> {
        let query = format!(
            "SELECT {} FROM devices WHERE deleted_at IS NULL ORDER BY id LIMIT $1 OFFSET $2",
            DEVICE_COLUMNS
        );

        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Device::try_from)
            .collect()
    }

    async fn update_basic(&self, input: UpdateDeviceBasicInput) -> Result<Device> {
        let query = format!(
            "UPDATE devices SET name = $2, status = $3, location = COALESCE($4, location), \
             updated_by = $5, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            DEVICE_COLUMNS
        );

        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(input.id)
            .bind(&input.name)
            .bind(input.status.as_str())
            .bind(&input.location)
            .bind(&input.updated_by)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| device_not_found(input.id))?
            .try_into()
    }

    async fn update_plan(
        &self,
        id: DeviceId,
        plan_id: Option<PlanId>,
        updated_by: Option<String>,
    ) -> Result<Device> {
        let query = format!(
            "UPDATE devices SET plan_id = $2, updated_by = $3, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            DEVICE_COLUMNS
        );

        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(id)
            .bind(plan_id)
            .bind(&updated_by)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::NotFound(format!("plan {:?} not found", plan_id))
                } else {
                    Error::Database(e)
                }
            })?
            .ok_or_else(|| device_not_found(id))?
            .try_into()
    }

    async fn soft_delete(&self, id: DeviceId, deleted_by: Option<String>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE devices SET deleted_at = NOW(), deleted_by = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(&deleted_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(device_not_found(id));
        }
        Ok(())
    }
}
