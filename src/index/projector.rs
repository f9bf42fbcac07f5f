use std::sync::Arc;

use serde_json::json;
use tracing::{Level, event};

use super::document::{IndexDocument, JoinRole};
use super::SearchIndex;
use crate::core::{PlanError, Result, RetryPolicy};
use crate::model::{CostShares, LinkedService, Plan};

/// Decomposes a plan into its join-hierarchy documents, parents first.
///
/// The plan is the root (routed by its own id); cost shares and linked plan
/// service shells are routed to the plan; each linked service and its cost
/// shares are routed to their linked plan service.
pub fn project(plan: &Plan) -> Result<Vec<IndexDocument>> {
    let mut documents = Vec::with_capacity(2 + plan.linked_plan_services.len() * 3);

    documents.push(IndexDocument::joined(
        JoinRole::Plan,
        &plan.object_id,
        None,
        json!({
            "objectId": plan.object_id,
            "objectType": plan.object_type,
            "_org": plan.org,
            "planStatus": plan.plan_status,
            "creationDate": plan.creation_date,
        }),
    ));
    documents.push(cost_shares_document(
        JoinRole::PlanCostShares,
        &plan.plan_cost_shares,
        &plan.object_id,
    )?);

    for service in &plan.linked_plan_services {
        documents.push(IndexDocument::joined(
            JoinRole::LinkedPlanServices,
            &service.object_id,
            Some(&plan.object_id),
            json!({
                "objectId": service.object_id,
                "objectType": service.object_type,
                "_org": service.org,
            }),
        ));
        documents.push(linked_service_document(&service.linked_service, &service.object_id)?);
        documents.push(cost_shares_document(
            JoinRole::PlanserviceCostShares,
            &service.planservice_cost_shares,
            &service.object_id,
        )?);
    }

    Ok(documents)
}

fn cost_shares_document(role: JoinRole, cost_shares: &CostShares, parent: &str) -> Result<IndexDocument> {
    let fields = serde_json::to_value(cost_shares).map_err(|err| PlanError::Internal(err.to_string()))?;
    Ok(IndexDocument::joined(role, &cost_shares.object_id, Some(parent), fields))
}

fn linked_service_document(service: &LinkedService, parent: &str) -> Result<IndexDocument> {
    let fields = serde_json::to_value(service).map_err(|err| PlanError::Internal(err.to_string()))?;
    Ok(IndexDocument::joined(
        JoinRole::LinkedService,
        &service.object_id,
        Some(parent),
        fields,
    ))
}

/// Upserts the projection of a plan. Re-applying the same plan overwrites
/// documents by id, so duplicate or replayed events are harmless.
#[derive(Clone)]
pub struct IndexProjector {
    index: Arc<dyn SearchIndex>,
    index_name: String,
    retry: RetryPolicy,
}

impl IndexProjector {
    pub fn new(index: Arc<dyn SearchIndex>, index_name: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            index,
            index_name: index_name.into(),
            retry,
        }
    }

    /// Returns the number of documents written.
    pub async fn apply(&self, plan: &Plan) -> Result<usize> {
        let documents = project(plan)?;
        let total = documents.len();

        for document in documents {
            let id = document.id.clone();
            self.retry
                .run("index.upsert", || self.index.index(&self.index_name, document.clone()))
                .await
                .map_err(|err| {
                    event!(Level::ERROR, object_id = %plan.object_id, document_id = %id, error = %err, "indexing failed");
                    PlanError::from(err)
                })?;
        }

        event!(Level::INFO, object_id = %plan.object_id, documents = total, "plan projected into index");
        Ok(total)
    }
}
