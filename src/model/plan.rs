use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::validator::validate_plan;
use crate::core::{PlanError, Result};

/// Root benefit document. `object_id` is the primary store key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Plan {
    pub object_id: String,
    pub object_type: String,
    #[serde(rename = "_org")]
    pub org: String,
    pub plan_status: String,
    pub creation_date: String,
    pub plan_cost_shares: CostShares,
    pub linked_plan_services: Vec<LinkedPlanService>,
}

/// Used both for the plan-level and the per-service cost shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CostShares {
    pub object_id: String,
    pub object_type: String,
    #[serde(rename = "_org")]
    pub org: String,
    pub deductible: Number,
    pub copay: Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkedPlanService {
    pub object_id: String,
    pub object_type: String,
    #[serde(rename = "_org")]
    pub org: String,
    pub linked_service: LinkedService,
    pub planservice_cost_shares: CostShares,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkedService {
    pub object_id: String,
    pub object_type: String,
    #[serde(rename = "_org")]
    pub org: String,
    pub name: String,
}

impl Plan {
    /// Validates `value` against the closed Plan schema, then decodes it.
    /// Every entity `objectId` in the tree must be distinct.
    pub fn from_value(value: Value) -> Result<Self> {
        validate_plan(&value).map_err(|err| PlanError::Validation(err.to_string()))?;
        let plan: Plan =
            serde_json::from_value(value).map_err(|err| PlanError::Validation(err.to_string()))?;
        plan.check_unique_ids()?;
        Ok(plan)
    }

    /// Every entity id in the tree, parents before children.
    pub fn entity_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.object_id.as_str(), self.plan_cost_shares.object_id.as_str()];
        for service in &self.linked_plan_services {
            ids.push(&service.object_id);
            ids.push(&service.linked_service.object_id);
            ids.push(&service.planservice_cost_shares.object_id);
        }
        ids
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for id in self.entity_ids() {
            if !seen.insert(id) {
                return Err(PlanError::Validation(format!(
                    "objectId '{id}' appears more than once in plan '{}'",
                    self.object_id
                )));
            }
        }
        Ok(())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|err| PlanError::Internal(err.to_string()))
    }

    pub fn linked_plan_service(&self, object_id: &str) -> Option<&LinkedPlanService> {
        self.linked_plan_services
            .iter()
            .find(|service| service.object_id == object_id)
    }
}
