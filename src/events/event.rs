use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::{PlanError, Result};
use crate::model::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Wire envelope: full plan for create/update, `{objectId}` for delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: Operation,
    pub data: Value,
}

impl ChangeEvent {
    pub fn created(plan: &Plan) -> Result<Self> {
        Ok(Self {
            operation: Operation::Create,
            data: plan.to_value()?,
        })
    }

    pub fn updated(plan: &Plan) -> Result<Self> {
        Ok(Self {
            operation: Operation::Update,
            data: plan.to_value()?,
        })
    }

    pub fn deleted(object_id: &str) -> Self {
        Self {
            operation: Operation::Delete,
            data: json!({ "objectId": object_id }),
        }
    }

    pub fn object_id(&self) -> Option<&str> {
        self.data.get("objectId").and_then(Value::as_str)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|err| PlanError::Internal(err.to_string()))
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}
