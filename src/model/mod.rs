//! Plan entity model.
//!
//! - `plan.rs` - typed records for the Plan graph
//! - `schema.rs` - closed schema description of a Plan document
//! - `validator.rs` - generic walker checking a JSON value against a schema

mod plan;
mod schema;
mod validator;

pub use plan::{CostShares, LinkedPlanService, LinkedService, Plan};
pub use schema::{FieldSchema, ObjectSchema, SchemaNode, plan_schema};
pub use validator::{ValidationError, validate, validate_plan};
