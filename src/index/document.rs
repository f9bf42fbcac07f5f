use serde_json::{Value, json};

/// Name of the join field carried by every document.
pub const JOIN_FIELD: &str = "plan_join";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinRole {
    Plan,
    PlanCostShares,
    LinkedPlanServices,
    LinkedService,
    PlanserviceCostShares,
}

impl JoinRole {
    pub const ALL: [JoinRole; 5] = [
        JoinRole::Plan,
        JoinRole::PlanCostShares,
        JoinRole::LinkedPlanServices,
        JoinRole::LinkedService,
        JoinRole::PlanserviceCostShares,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::PlanCostShares => "planCostShares",
            Self::LinkedPlanServices => "linkedPlanServices",
            Self::LinkedService => "linkedService",
            Self::PlanserviceCostShares => "planserviceCostShares",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.name() == name)
    }

    pub fn parent(self) -> Option<JoinRole> {
        match self {
            Self::Plan => None,
            Self::PlanCostShares | Self::LinkedPlanServices => Some(Self::Plan),
            Self::LinkedService | Self::PlanserviceCostShares => Some(Self::LinkedPlanServices),
        }
    }
}

/// Parent -> children relations declared on the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinMapping {
    pub join_field: String,
    pub relations: Vec<(String, Vec<String>)>,
}

impl JoinMapping {
    pub fn plan_hierarchy() -> Self {
        let mut relations: Vec<(String, Vec<String>)> = Vec::new();
        for role in JoinRole::ALL {
            let Some(parent) = role.parent() else {
                continue;
            };
            match relations.iter_mut().find(|(name, _)| name == parent.name()) {
                Some((_, children)) => children.push(role.name().to_string()),
                None => relations.push((parent.name().to_string(), vec![role.name().to_string()])),
            }
        }
        Self {
            join_field: JOIN_FIELD.to_string(),
            relations,
        }
    }

    /// The declared parent role of `role`, if it is a child in this mapping.
    pub fn parent_of(&self, role: &str) -> Option<&str> {
        self.relations
            .iter()
            .find(|(_, children)| children.iter().any(|child| child == role))
            .map(|(parent, _)| parent.as_str())
    }

    pub fn knows(&self, role: &str) -> bool {
        self.parent_of(role).is_some() || self.relations.iter().any(|(parent, _)| parent == role)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub id: String,
    pub routing: Option<String>,
    pub source: Value,
}

impl IndexDocument {
    /// Builds a document from `fields`, stamping the join marker for `role`.
    pub fn joined(role: JoinRole, id: &str, parent: Option<&str>, fields: Value) -> Self {
        let mut source = match fields {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let join = match parent {
            Some(parent) => json!({ "name": role.name(), "parent": parent }),
            None => json!({ "name": role.name() }),
        };
        source.insert(JOIN_FIELD.to_string(), join);

        Self {
            id: id.to_string(),
            routing: parent.map(str::to_string),
            source: Value::Object(source),
        }
    }

    pub fn join_name(&self) -> Option<&str> {
        self.source.get(JOIN_FIELD)?.get("name")?.as_str()
    }

    pub fn join_parent(&self) -> Option<&str> {
        self.source.get(JOIN_FIELD)?.get("parent")?.as_str()
    }
}
