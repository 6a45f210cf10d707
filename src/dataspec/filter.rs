//! Filters restrict the row set of a query by value or by time position.
//! A filter carries the proposition ids it applies to; it only ever
//! constrains columns belonging to entities that produce one of those ids.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Comparator {
    pub fn sql_operator(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::NotEq => "<>",
            Comparator::Lt => "<",
            Comparator::LtEq => "<=",
            Comparator::Gt => ">",
            Comparator::GtEq => ">=",
        }
    }
}

/// Restriction on the value column of matching entities.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFilter {
    pub proposition_ids: Vec<String>,
    pub comparator: Comparator,
    pub value: Value,
}

/// Restriction on the start time of matching entities. Either bound may be
/// open.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionFilter {
    pub proposition_ids: Vec<String>,
    pub start: Option<NaiveDateTime>,
    pub finish: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Value(ValueFilter),
    Position(PositionFilter),
}

impl Filter {
    pub fn proposition_ids(&self) -> &[String] {
        match self {
            Filter::Value(f) => &f.proposition_ids,
            Filter::Position(f) => &f.proposition_ids,
        }
    }

    /// Whether this filter applies to any of the given proposition ids.
    pub fn applies_to<'a, I>(&self, prop_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ids = self.proposition_ids();
        prop_ids.into_iter().any(|p| ids.iter().any(|id| id == p))
    }
}
