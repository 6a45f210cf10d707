//! WHERE / ORDER BY generation: key-id restriction, discriminator-code
//! restriction, filter predicates, and the on-demand IN / ORDER BY fragments
//! callers use when they need only those pieces.
//!
//! The key id is always the primary sort column. Streaming result assembly
//! depends on key-contiguous row delivery, so that ordering is a correctness
//! precondition, not a preference.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::dataspec::entity_spec::{ColumnSpec, EntitySpec};
use crate::dataspec::filter::Filter;
use crate::dataspec::value::Value;

use super::column_spec_info::ColumnSpecInfo;
use super::dialect::SqlDialect;
use super::errors::SqlGenError;
use super::table_aliaser::TableAliaser;

/// Requested ordering of each entity's propositions by start time. Key-id
/// ordering is applied regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlOrder {
    Ascending,
    Descending,
}

impl SqlOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SqlOrder::Ascending => "ASC",
            SqlOrder::Descending => "DESC",
        }
    }
}

pub struct WhereClause<'a> {
    primary: &'a EntitySpec,
    prop_ids: &'a HashSet<String>,
    info: &'a ColumnSpecInfo,
    /// Entities subject to WHERE restriction. Entities reachable only via a
    /// non-constraining reference have already been removed by the caller.
    entity_specs: &'a [&'a EntitySpec],
    filters: &'a [Filter],
    aliaser: &'a TableAliaser,
    key_ids: &'a [String],
    order: Option<SqlOrder>,
    dialect: &'a dyn SqlDialect,
}

impl<'a> WhereClause<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        primary: &'a EntitySpec,
        prop_ids: &'a HashSet<String>,
        info: &'a ColumnSpecInfo,
        entity_specs: &'a [&'a EntitySpec],
        filters: &'a [Filter],
        aliaser: &'a TableAliaser,
        key_ids: &'a [String],
        order: Option<SqlOrder>,
        dialect: &'a dyn SqlDialect,
    ) -> Self {
        WhereClause {
            primary,
            prop_ids,
            info,
            entity_specs,
            filters,
            aliaser,
            key_ids,
            order,
            dialect,
        }
    }

    pub fn generate(&self) -> Result<String, SqlGenError> {
        let mut conjuncts = Vec::new();

        if !self.key_ids.is_empty() {
            conjuncts.push(self.in_clause(&self.primary.base_spec, self.key_ids, false)?);
        }

        if let Some(code_constraint) = self.code_constraint()? {
            conjuncts.push(code_constraint);
        }

        for filter in self.filters {
            if !filter.applies_to(self.prop_ids.iter().map(String::as_str)) {
                continue;
            }
            for entity in self.entity_specs {
                if !filter.applies_to(entity.proposition_ids.iter().map(String::as_str)) {
                    continue;
                }
                self.push_filter_predicates(filter, entity, &mut conjuncts)?;
            }
        }

        let order_by = self.order_by_clause()?;
        let sql = if conjuncts.is_empty() {
            order_by
        } else {
            format!("WHERE {} {}", conjuncts.join(" AND "), order_by)
        };
        Ok(sql)
    }

    /// `alias.column [NOT] IN (…)` over string elements.
    pub fn in_clause(
        &self,
        spec: &ColumnSpec,
        elements: &[String],
        not: bool,
    ) -> Result<String, SqlGenError> {
        let column_ref = self.compiled_reference(spec)?;
        let literals: Vec<String> = elements
            .iter()
            .map(|e| self.dialect.string_literal(e))
            .collect();
        Ok(format!(
            "{}{} IN ({})",
            column_ref,
            if not { " NOT" } else { "" },
            literals.join(", ")
        ))
    }

    /// `ORDER BY keyId[, start ASC|DESC]`. Always present: key-contiguous
    /// delivery is what the streaming processor groups on.
    pub fn order_by_clause(&self) -> Result<String, SqlGenError> {
        let key_ref = self.compiled_reference(&self.primary.base_spec)?;
        let mut sql = format!("ORDER BY {}", key_ref);
        if let (Some(order), Some(start_spec)) = (self.order, &self.primary.start_time_spec) {
            let start_ref = self.compiled_reference(start_spec)?;
            sql.push_str(&format!(", {} {}", start_ref, order.sql()));
        }
        Ok(sql)
    }

    /// Restrict the discriminator column to the SQL codes of the requested
    /// proposition ids, when the entity maps more ids than were requested.
    fn code_constraint(&self) -> Result<Option<String>, SqlGenError> {
        if !self.primary.needs_discriminator() {
            return Ok(None);
        }
        let Some(code_spec) = &self.primary.code_spec else {
            return Ok(None);
        };
        let Some(mappings) = &code_spec.code_mappings else {
            return Ok(None);
        };
        let codes: Vec<String> = mappings
            .iter()
            .filter(|m| self.prop_ids.contains(&m.proposition_id))
            .map(|m| m.sql_code.clone())
            .collect();
        if codes.is_empty() || codes.len() == mappings.len() {
            // All codes requested: the restriction would be a no-op.
            return Ok(None);
        }
        Ok(Some(self.in_clause(code_spec, &codes, false)?))
    }

    fn push_filter_predicates(
        &self,
        filter: &Filter,
        entity: &EntitySpec,
        conjuncts: &mut Vec<String>,
    ) -> Result<(), SqlGenError> {
        match filter {
            Filter::Value(value_filter) => {
                if let Some(value_spec) = &entity.value_spec {
                    let column_ref = self.compiled_reference(value_spec)?;
                    conjuncts.push(format!(
                        "{} {} {}",
                        column_ref,
                        value_filter.comparator.sql_operator(),
                        self.literal(&value_filter.value)
                    ));
                }
            }
            Filter::Position(position_filter) => {
                if let Some(start_spec) = &entity.start_time_spec {
                    let column_ref = self.compiled_reference(start_spec)?;
                    if let Some(start) = &position_filter.start {
                        conjuncts
                            .push(format!("{} >= {}", column_ref, self.dialect.date_literal(start)));
                    }
                    if let Some(finish) = &position_filter.finish {
                        conjuncts.push(format!(
                            "{} <= {}",
                            column_ref,
                            self.dialect.date_literal(finish)
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve an entity-relative column spec to the compiled column it
    /// became (the compiler may have re-rooted it through a reference path),
    /// then to its aliased reference.
    fn compiled_reference(&self, spec: &ColumnSpec) -> Result<String, SqlGenError> {
        let compiled = self
            .info
            .column_specs
            .iter()
            .find(|c| {
                c.column == spec.column && c.table == spec.table && c.joins.ends_with(&spec.joins)
            })
            .ok_or_else(|| SqlGenError::UnaliasedColumn {
                table: spec.table.clone(),
                column: spec.column.clone(),
            })?;
        self.aliaser.column_reference(compiled)
    }

    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Nominal(s) => self.dialect.string_literal(s),
            Value::Number(n) => format!("{}", n),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Date(d) => self.dialect.date_literal(d),
        }
    }
}
