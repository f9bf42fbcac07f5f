use serde_json::{Value, json};

use crate::model::Plan;

pub(crate) fn linked_plan_service_json(plan_id: &str, idx: usize) -> Value {
    json!({
        "linkedService": {
            "_org": "example.com",
            "objectId": format!("{plan_id}-ls-{idx}"),
            "objectType": "service",
            "name": format!("service {idx}")
        },
        "planserviceCostShares": {
            "deductible": 10 + idx,
            "_org": "example.com",
            "copay": 0,
            "objectId": format!("{plan_id}-scs-{idx}"),
            "objectType": "membercostshare"
        },
        "_org": "example.com",
        "objectId": format!("{plan_id}-lps-{idx}"),
        "objectType": "planservice"
    })
}

pub(crate) fn sample_plan_json(plan_id: &str, services: usize) -> Value {
    let linked: Vec<Value> = (0..services)
        .map(|idx| linked_plan_service_json(plan_id, idx))
        .collect();
    json!({
        "planCostShares": {
            "deductible": 2000,
            "_org": "example.com",
            "copay": 23,
            "objectId": format!("{plan_id}-pcs"),
            "objectType": "membercostshare"
        },
        "linkedPlanServices": linked,
        "_org": "example.com",
        "objectId": plan_id,
        "objectType": "plan",
        "planStatus": "inNetwork",
        "creationDate": "12-12-2017"
    })
}

pub(crate) fn sample_plan(plan_id: &str, services: usize) -> Plan {
    match Plan::from_value(sample_plan_json(plan_id, services)) {
        Ok(plan) => plan,
        Err(err) => panic!("fixture plan must be valid: {err}"),
    }
}
