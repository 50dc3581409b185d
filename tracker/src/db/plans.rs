use async_trait::async_trait;
use sqlx::PgPool;

use super::is_foreign_key_violation;
use crate::errors::{Error, Result};
use crate::model::{Plan, PlanId};
use crate::ports::{PlanInput, PlanRepository};

const PLAN_COLUMNS: &str =
    "id, name, interval_hours, threshold_min, threshold_max, description, created_at, updated_at";

fn plan_not_found(id: PlanId) -> Error {
    Error::NotFound(format!("plan {} not found", id))
}

#[derive(Debug, Clone)]
pub struct PgPlanRepository {
    pool: PgPool,
}

impl PgPlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanRepository for PgPlanRepository {
    async fn create(&self, input: PlanInput) -> Result<Plan> {
        let query = format!(
            "INSERT INTO plans (name, interval_hours, threshold_min, threshold_max, description) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            PLAN_COLUMNS
        );

        let plan = sqlx::query_as::<_, Plan>(&query)
            .bind(&input.name)
            .bind(input.interval_hours)
            .bind(input.threshold_min)
            .bind(input.threshold_max)
            .bind(&input.description)
            .fetch_one(&self.pool)
            .await?;

        Ok(plan)
    }

    async fn get_by_id(&self, id: PlanId) -> Result<Plan> {
        let query = format!("SELECT {} FROM plans WHERE id = $1", PLAN_COLUMNS);

        sqlx::query_as::<_, Plan>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| plan_not_found(id))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Plan>> {
        let query = format!(
            "SELECT {} FROM plans ORDER BY id LIMIT $1 OFFSET $2",
            PLAN_COLUMNS
        );

        let plans = sqlx::query_as::<_, Plan>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(plans)
    }

    async fn update(&self, id: PlanId, input: PlanInput) -> Result<Plan> {
        let query = format!(
            "UPDATE plans SET name = $2, interval_hours = $3, threshold_min = $4, \
             threshold_max = $5, description = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            PLAN_COLUMNS
        );

        sqlx::query_as::<_, Plan>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(input.interval_hours)
            .bind(input.threshold_min)
            .bind(input.threshold_max)
            .bind(&input.description)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| plan_not_found(id))
    }

    async fn delete(&self, id: PlanId) -> Result<()> {
        let result = sqlx::query("DELETE FROM plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::Conflict(format!("plan {} is still assigned to devices", id))
                } else {
                    Error::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(plan_not_found(id));
        }
        Ok(())
    }
}
