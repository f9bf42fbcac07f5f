use std::sync::Arc;

use tracing::{Instrument, Level, event, info_span};

use super::document::{JOIN_FIELD, JoinRole};
use super::query::Query;
use super::SearchIndex;
use crate::core::{PlanError, Result, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CascadeReport {
    pub plan_id: String,
    /// Linked plan service ids discovered under the plan.
    pub branches: Vec<String>,
    pub documents_deleted: u64,
}

/// Removes a plan and everything below it in the join hierarchy.
///
/// 1. discover the plan's own linked plan service shells (routed to the plan)
/// 2. for each shell, delete its children using the shell id as routing
/// 3. delete the plan and its direct children using the plan id as routing
///
/// A failing branch does not stop its siblings. Step 3 only runs once every
/// branch is gone: the shells are what step 1 discovers, so removing them
/// early would strand the failed branch's children for good.
#[derive(Clone)]
pub struct CascadeDeleter {
    index: Arc<dyn SearchIndex>,
    index_name: String,
    retry: RetryPolicy,
    page_size: usize,
}

impl CascadeDeleter {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        index_name: impl Into<String>,
        retry: RetryPolicy,
        page_size: usize,
    ) -> Self {
        Self {
            index,
            index_name: index_name.into(),
            retry,
            page_size: page_size.max(1),
        }
    }

    pub async fn delete_plan(&self, plan_id: &str) -> Result<CascadeReport> {
        let span = info_span!("index.cascade_delete", object_id = %plan_id);
        self.delete_plan_inner(plan_id).instrument(span).await
    }

    async fn delete_plan_inner(&self, plan_id: &str) -> Result<CascadeReport> {
        let branches = self.discover_branches(plan_id).await?;
        event!(Level::DEBUG, branches = branches.len(), "linked plan services discovered");

        let mut report = CascadeReport {
            plan_id: plan_id.to_string(),
            branches: branches.clone(),
            documents_deleted: 0,
        };

        let mut failed = Vec::new();
        for branch in &branches {
            let children = Query::term(parent_field(), branch.as_str());
            match self.delete_routed(&children, branch).await {
                Ok(deleted) => report.documents_deleted += deleted,
                Err(err) => {
                    event!(Level::WARN, routing = %branch, error = %err, "branch delete failed");
                    failed.push(branch.clone());
                }
            }
        }

        if !failed.is_empty() {
            return Err(PlanError::Index(format!(
                "cascade delete of plan '{plan_id}' incomplete, failed branches: {}",
                failed.join(", ")
            )));
        }

        let plan_level = Query::should(vec![
            Query::term("_id", plan_id),
            Query::term(parent_field(), plan_id),
        ]);
        report.documents_deleted += self.delete_routed(&plan_level, plan_id).await?;

        event!(
            Level::INFO,
            documents = report.documents_deleted,
            "plan removed from index"
        );
        Ok(report)
    }

    /// Linked plan service shells whose parent is `plan_id`, all pages.
    async fn discover_branches(&self, plan_id: &str) -> Result<Vec<String>> {
        let query = Query::must(vec![
            Query::term(name_field(), JoinRole::LinkedPlanServices.name()),
            Query::term(parent_field(), plan_id),
        ]);

        let mut branches = Vec::new();
        let mut from = 0;
        loop {
            let page = self
                .retry
                .run("index.search", || {
                    self.index
                        .search(&self.index_name, &query, Some(plan_id), from, self.page_size)
                })
                .await?;
            let fetched = page.len();
            branches.extend(page.into_iter().map(|hit| hit.id));
            if fetched < self.page_size {
                break;
            }
            from += fetched;
        }
        Ok(branches)
    }

    async fn delete_routed(&self, query: &Query, routing: &str) -> Result<u64> {
        let deleted = self
            .retry
            .run("index.delete_by_query", || {
                self.index.delete_by_query(&self.index_name, query, Some(routing))
            })
            .await?;
        Ok(deleted)
    }
}

fn name_field() -> String {
    format!("{JOIN_FIELD}.name")
}

fn parent_field() -> String {
    format!("{JOIN_FIELD}.parent")
}
