use serde_json::Value;

/// Subset of a search engine query DSL: term matches on dotted paths and
/// boolean composition. The pseudo-field `_id` matches the document id.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    Term { field: String, value: String },
    Bool { must: Vec<Query>, should: Vec<Query> },
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn must(clauses: Vec<Query>) -> Self {
        Self::Bool {
            must: clauses,
            should: Vec::new(),
        }
    }

    pub fn should(clauses: Vec<Query>) -> Self {
        Self::Bool {
            must: Vec::new(),
            should: clauses,
        }
    }

    pub fn matches(&self, id: &str, source: &Value) -> bool {
        match self {
            Self::MatchAll => true,
            Self::Term { field, value } if field == "_id" => id == value,
            Self::Term { field, value } => lookup(source, field)
                .and_then(Value::as_str)
                .is_some_and(|found| found == value),
            Self::Bool { must, should } => {
                must.iter().all(|clause| clause.matches(id, source))
                    && (should.is_empty() || should.iter().any(|clause| clause.matches(id, source)))
            }
        }
    }
}

fn lookup<'a>(source: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(source, |node, segment| node.get(segment))
}
