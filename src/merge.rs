//! Deep merge of a partial Plan document into a stored Plan.
//!
//! Rules, applied key by key over the patch:
//! - nested objects merge recursively; base fields missing from the patch survive
//! - `linkedPlanServices` at the plan root behaves as a set keyed by `objectId`:
//!   entries with an unseen id are appended, entries whose id is already present
//!   are left exactly as stored (no in-place update through this path)
//! - any other array, and every scalar, replaces the base value
//!
//! The merged document is validated against the full schema before it is
//! returned, so callers never persist an invalid merge.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::core::{PlanError, Result};
use crate::model::Plan;

pub const LINKED_PLAN_SERVICES: &str = "linkedPlanServices";
const OBJECT_ID: &str = "objectId";

pub fn merge(base: &Plan, patch: &Value) -> Result<Plan> {
    let Value::Object(patch) = patch else {
        return Err(PlanError::Validation(
            "patch body must be a JSON object".to_string(),
        ));
    };

    let requested_id = patch.get(OBJECT_ID).map(Value::as_str);
    if requested_id.is_some_and(|id| id != Some(base.object_id.as_str())) {
        return Err(PlanError::ImmutableField(OBJECT_ID.to_string()));
    }

    let mut merged = match base.to_value()? {
        Value::Object(map) => map,
        _ => return Err(PlanError::Internal("plan did not encode as an object".to_string())),
    };
    merge_object(&mut merged, patch, true);

    Plan::from_value(Value::Object(merged))
}

fn merge_object(target: &mut Map<String, Value>, patch: &Map<String, Value>, plan_root: bool) {
    for (key, patch_value) in patch {
        match patch_value {
            Value::Object(nested) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(existing) = slot {
                    merge_object(existing, nested, false);
                }
            }
            Value::Array(entries) if plan_root && key == LINKED_PLAN_SERVICES => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(existing) = slot {
                    append_unseen_by_id(existing, entries);
                }
            }
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

fn append_unseen_by_id(existing: &mut Vec<Value>, incoming: &[Value]) {
    let mut seen: HashSet<String> = existing
        .iter()
        .filter_map(|entry| entry.get(OBJECT_ID).and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    for entry in incoming {
        match entry.get(OBJECT_ID).and_then(Value::as_str) {
            Some(id) if seen.contains(id) => continue,
            Some(id) => {
                seen.insert(id.to_string());
                existing.push(entry.clone());
            }
            // No id: keep it so schema validation reports the problem.
            None => existing.push(entry.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{linked_plan_service_json, sample_plan};
    use serde_json::json;

    #[test]
    fn scalar_fields_overwrite() {
        let base = sample_plan("plan-1", 1);
        let merged = merge(&base, &json!({"planStatus": "outOfNetwork"})).unwrap();
        assert_eq!(merged.plan_status, "outOfNetwork");
        assert_eq!(merged.creation_date, base.creation_date);
        assert_eq!(merged.linked_plan_services, base.linked_plan_services);
    }

    #[test]
    fn nested_objects_merge_and_keep_untouched_fields() {
        let base = sample_plan("plan-1", 0);
        let merged = merge(&base, &json!({"planCostShares": {"copay": 50}})).unwrap();
        assert_eq!(merged.plan_cost_shares.copay, serde_json::Number::from(50));
        assert_eq!(merged.plan_cost_shares.deductible, base.plan_cost_shares.deductible);
        assert_eq!(merged.plan_cost_shares.object_id, "plan-1-pcs");
    }

    #[test]
    fn existing_linked_plan_service_is_not_duplicated_or_updated() {
        let base = sample_plan("plan-1", 2);
        let mut changed = linked_plan_service_json("plan-1", 0);
        changed["linkedService"]["name"] = json!("renamed");

        let merged = merge(&base, &json!({"linkedPlanServices": [changed]})).unwrap();
        assert_eq!(merged.linked_plan_services.len(), 2);
        assert_eq!(merged.linked_plan_services[0].linked_service.name, "service 0");
    }

    #[test]
    fn new_linked_plan_service_is_appended_after_existing() {
        let base = sample_plan("plan-1", 2);
        let added = linked_plan_service_json("plan-1", 7);

        let merged = merge(&base, &json!({"linkedPlanServices": [added.clone(), added]})).unwrap();
        let ids: Vec<&str> = merged
            .linked_plan_services
            .iter()
            .map(|service| service.object_id.as_str())
            .collect();
        assert_eq!(ids, ["plan-1-lps-0", "plan-1-lps-1", "plan-1-lps-7"]);
    }

    #[test]
    fn rejects_object_id_change() {
        let base = sample_plan("plan-1", 0);
        let err = merge(&base, &json!({"objectId": "plan-2"})).unwrap_err();
        assert!(matches!(err, PlanError::ImmutableField(field) if field == "objectId"));
        assert!(merge(&base, &json!({"objectId": "plan-1"})).is_ok());
    }

    #[test]
    fn invalid_merge_result_is_rejected() {
        let base = sample_plan("plan-1", 1);
        let unknown = merge(&base, &json!({"planCostShares": {"coinsurance": 3}}));
        assert!(matches!(unknown, Err(PlanError::Validation(_))));

        let wrong_type = merge(&base, &json!({"planStatus": 5}));
        assert!(matches!(wrong_type, Err(PlanError::Validation(_))));

        let partial_entry = merge(&base, &json!({"linkedPlanServices": [{"objectId": "new"}]}));
        assert!(matches!(partial_entry, Err(PlanError::Validation(_))));
    }

    #[test]
    fn appended_service_cannot_reuse_an_existing_entity_id() {
        let base = sample_plan("plan-1", 1);
        let mut added = linked_plan_service_json("plan-1", 4);
        added["linkedService"]["objectId"] = json!("plan-1-ls-0");

        let err = merge(&base, &json!({"linkedPlanServices": [added]})).unwrap_err();
        assert!(matches!(err, PlanError::Validation(msg) if msg.contains("plan-1-ls-0")));
    }

    #[test]
    fn non_object_patch_is_rejected() {
        let base = sample_plan("plan-1", 0);
        assert!(matches!(merge(&base, &json!([1])), Err(PlanError::Validation(_))));
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let base = sample_plan("plan-1", 3);
        assert_eq!(merge(&base, &json!({})).unwrap(), base);
    }
}
