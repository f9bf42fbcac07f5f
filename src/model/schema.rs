//! Closed schema description for Plan documents.
//!
//! Every object in the tree is closed: undeclared fields are rejected at
//! every nesting level, including inside array items.

use lazy_static::lazy_static;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    String,
    Number,
    Object(ObjectSchema),
    Array(Box<SchemaNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    /// Entity name used in error messages.
    pub entity: &'static str,
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub node: SchemaNode,
    pub required: bool,
}

impl SchemaNode {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
        }
    }
}

impl ObjectSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }
}

fn required(name: &'static str, node: SchemaNode) -> FieldSchema {
    FieldSchema {
        name,
        node,
        required: true,
    }
}

fn cost_shares_schema(entity: &'static str) -> SchemaNode {
    SchemaNode::Object(ObjectSchema {
        entity,
        fields: vec![
            required("deductible", SchemaNode::Number),
            required("_org", SchemaNode::String),
            required("copay", SchemaNode::Number),
            required("objectId", SchemaNode::String),
            required("objectType", SchemaNode::String),
        ],
    })
}

fn linked_service_schema() -> SchemaNode {
    SchemaNode::Object(ObjectSchema {
        entity: "LinkedService",
        fields: vec![
            required("_org", SchemaNode::String),
            required("objectId", SchemaNode::String),
            required("objectType", SchemaNode::String),
            required("name", SchemaNode::String),
        ],
    })
}

fn linked_plan_service_schema() -> SchemaNode {
    SchemaNode::Object(ObjectSchema {
        entity: "LinkedPlanService",
        fields: vec![
            required("linkedService", linked_service_schema()),
            required("planserviceCostShares", cost_shares_schema("ServiceCostShares")),
            required("_org", SchemaNode::String),
            required("objectId", SchemaNode::String),
            required("objectType", SchemaNode::String),
        ],
    })
}

fn build_plan_schema() -> SchemaNode {
    SchemaNode::Object(ObjectSchema {
        entity: "Plan",
        fields: vec![
            required("planCostShares", cost_shares_schema("PlanCostShares")),
            required(
                "linkedPlanServices",
                SchemaNode::Array(Box::new(linked_plan_service_schema())),
            ),
            required("_org", SchemaNode::String),
            required("objectId", SchemaNode::String),
            required("objectType", SchemaNode::String),
            required("planStatus", SchemaNode::String),
            required("creationDate", SchemaNode::String),
        ],
    })
}

lazy_static! {
    static ref PLAN_SCHEMA: SchemaNode = build_plan_schema();
}

pub fn plan_schema() -> &'static SchemaNode {
    &PLAN_SCHEMA
}
