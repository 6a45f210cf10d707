//! Stable, collision-free SQL table aliases for every distinct join path.
//!
//! The aliaser maintains a bijection from join-path signature (the ordered
//! hop sequence plus the table it lands on) to a short synthetic alias.
//! The same signature always yields the same alias; two different paths to
//! the same physical table always get different aliases, which is what makes
//! self-joins come out correct. One aliaser is built per statement and
//! shared by every clause generator of that statement.

use std::collections::HashMap;

use crate::dataspec::entity_spec::{ColumnSpec, TableInstance};

use super::errors::SqlGenError;

#[derive(Debug, Clone)]
pub struct TableAliaser {
    aliases: HashMap<TableInstance, String>,
    /// Allocation order, which is also FROM-clause join order.
    ordered: Vec<TableInstance>,
}

impl TableAliaser {
    /// Allocate aliases for every table instance reachable from the given
    /// columns, in first-seen order, including the intermediate instances of
    /// multi-hop paths (each of which becomes one JOIN).
    pub fn new(column_specs: &[ColumnSpec], prefix: &str) -> Self {
        let mut aliaser = TableAliaser {
            aliases: HashMap::new(),
            ordered: Vec::new(),
        };
        for spec in column_specs {
            // Root table of the path first, then each hop's destination.
            let mut table = root_table(spec);
            let mut joins = Vec::new();
            aliaser.allocate(
                TableInstance {
                    joins: joins.clone(),
                    table: table.clone(),
                },
                prefix,
            );
            for hop in &spec.joins {
                joins.push(hop.clone());
                table = hop.to_table.clone();
                aliaser.allocate(
                    TableInstance {
                        joins: joins.clone(),
                        table: table.clone(),
                    },
                    prefix,
                );
            }
        }
        aliaser
    }

    fn allocate(&mut self, instance: TableInstance, prefix: &str) {
        if self.aliases.contains_key(&instance) {
            return;
        }
        let alias = format!("{}{}", prefix, self.ordered.len());
        self.aliases.insert(instance.clone(), alias);
        self.ordered.push(instance);
    }

    pub fn alias_for_instance(&self, instance: &TableInstance) -> Option<&str> {
        self.aliases.get(instance).map(String::as_str)
    }

    pub fn alias_for(&self, spec: &ColumnSpec) -> Option<&str> {
        self.alias_for_instance(&spec.table_instance())
    }

    /// `alias.column` reference for a compiled column.
    pub fn column_reference(&self, spec: &ColumnSpec) -> Result<String, SqlGenError> {
        let alias = self
            .alias_for(spec)
            .ok_or_else(|| SqlGenError::UnaliasedColumn {
                table: spec.table.clone(),
                column: spec.column.clone(),
            })?;
        Ok(format!("{}.{}", alias, spec.column))
    }

    /// Table instances in allocation order, each with its alias. The first
    /// entry is the statement's base table.
    pub fn instances(&self) -> impl Iterator<Item = (&TableInstance, &str)> {
        self.ordered
            .iter()
            .map(move |instance| (instance, self.aliases[instance].as_str()))
    }
}

fn root_table(spec: &ColumnSpec) -> String {
    spec.joins
        .first()
        .map(|hop| hop.from_table.clone())
        .unwrap_or_else(|| spec.table.clone())
}
