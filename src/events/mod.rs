pub mod decoder;
pub mod projector;

use serde_json::{Map, Value};

/// One result-set row: column name to value. Equality is structural.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Added,
    Removed,
    Unknown(String),
}

impl Action {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "added" => Action::Added,
            "removed" => Action::Removed,
            other => Action::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub entity_id: String,
    pub entity_label: String,
    pub query_name: String,
    pub action: Action,
    pub row: Row,
    pub timestamp: i64,
}

impl Event {
    pub fn simple(entity_label: &str, query_name: &str, action: Action, row: Row, ts: i64) -> Self {
        Self {
            entity_id: String::new(),
            entity_label: entity_label.to_string(),
            query_name: query_name.to_string(),
            action,
            row,
            timestamp: ts,
        }
    }
}
