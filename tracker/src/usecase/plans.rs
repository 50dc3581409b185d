use std::sync::Arc;

use tracing::info;

use crate::errors::Result;
use crate::model::{Plan, PlanId};
use crate::ports::{PlanInput, PlanRepository};
use crate::validate::validate_plan;

pub struct PlanService {
    plans: Arc<dyn PlanRepository>,
}

impl PlanService {
    pub fn new(plans: Arc<dyn PlanRepository>) -> Self {
        Self { plans }
    }

    pub async fn create(&self, input: PlanInput) -> Result<Plan> {
        let input = validate_plan(input)?;
        let plan = self.plans.create(input).await?;
        info!(plan_id = plan.id, name = %plan.name, "Plan created");
        Ok(plan)
    }

    pub async fn get(&self, id: PlanId) -> Result<Plan> {
        self.plans.get_by_id(id).await
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Plan>> {
        self.plans.list(limit, offset).await
    }

    /// Changing a plan does not re-evaluate devices that already use it
    pub async fn update(&self, id: PlanId, input: PlanInput) -> Result<Plan> {
        let input = validate_plan(input)?;
        self.plans.update(id, input).await
    }

    pub async fn delete(&self, id: PlanId) -> Result<()> {
        self.plans.delete(id).await?;
        info!(plan_id = id, "Plan deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::ports::MockPlanRepository;
    use crate::test_support::range_plan;

    fn input(min: Option<f64>, max: Option<f64>) -> PlanInput {
        PlanInput {
            name: "Hydraulics".to_string(),
            interval_hours: 500,
            threshold_min: min,
            threshold_max: max,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_valid_plan() {
        let mut repo = MockPlanRepository::new();
        repo.expect_create()
            .withf(|input: &PlanInput| input.name == "Hydraulics")
            .times(1)
            .returning(|input| {
                Ok(range_plan(
                    1,
                    input.threshold_min.unwrap_or_default(),
                    input.threshold_max.unwrap_or_default(),
                ))
            });

        let svc = PlanService::new(Arc::new(repo));
        let plan = svc.create(input(Some(10.0), Some(90.0))).await.unwrap();
        assert_eq!(plan.range(), Some((10.0, 90.0)));
    }

    #[tokio::test]
    async fn test_invalid_plan_never_reaches_repository() {
        let mut repo = MockPlanRepository::new();
        repo.expect_create().never();
        repo.expect_update().never();

        let svc = PlanService::new(Arc::new(repo));
        assert!(matches!(
            svc.create(input(Some(90.0), Some(10.0))).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            svc.update(1, input(None, Some(10.0))).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_in_use_plan_conflicts() {
        let mut repo = MockPlanRepository::new();
        repo.expect_delete()
            .returning(|id| Err(Error::Conflict(format!("plan {} is assigned to devices", id))));

        let svc = PlanService::new(Arc::new(repo));
        assert!(matches!(svc.delete(4).await, Err(Error::Conflict(_))));
    }
}
