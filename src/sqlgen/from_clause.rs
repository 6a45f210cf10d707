//! FROM clause generation: the base table plus one JOIN per traversed join
//! hop, with optional substitution of a staged table for a hot join path.

use crate::dataspec::entity_spec::TableInstance;

use super::dialect::SqlDialect;
use super::errors::SqlGenError;
use super::staging::StagingSpec;
use super::table_aliaser::TableAliaser;

pub struct FromClause<'a> {
    aliaser: &'a TableAliaser,
    dialect: &'a dyn SqlDialect,
    staging: &'a [StagingSpec],
}

impl<'a> FromClause<'a> {
    pub fn new(
        aliaser: &'a TableAliaser,
        dialect: &'a dyn SqlDialect,
        staging: &'a [StagingSpec],
    ) -> Self {
        FromClause {
            aliaser,
            dialect,
            staging,
        }
    }

    pub fn generate(&self) -> Result<String, SqlGenError> {
        let mut sql = String::new();
        for (instance, alias) in self.aliaser.instances() {
            if sql.is_empty() {
                sql.push_str("FROM ");
                sql.push_str(&self.table_reference(instance));
                sql.push(' ');
                sql.push_str(alias);
                continue;
            }
            // Every non-root instance was reached through its last hop; the
            // parent instance is the same path minus that hop.
            let hop = instance
                .joins
                .last()
                .ok_or_else(|| SqlGenError::UnaliasedColumn {
                    table: instance.table.clone(),
                    column: "<join>".to_string(),
                })?;
            let parent = TableInstance {
                joins: instance.joins[..instance.joins.len() - 1].to_vec(),
                table: hop.from_table.clone(),
            };
            let parent_alias = self.aliaser.alias_for_instance(&parent).ok_or_else(|| {
                SqlGenError::UnaliasedColumn {
                    table: parent.table.clone(),
                    column: hop.from_column.clone(),
                }
            })?;
            sql.push_str(&format!(
                " JOIN {} {} ON {}.{} = {}.{}",
                self.table_reference(instance),
                alias,
                parent_alias,
                hop.from_column,
                alias,
                hop.to_column
            ));
        }
        Ok(sql)
    }

    /// The staged table stands in for the raw table when the instance's join
    /// path was pre-materialized.
    fn table_reference(&self, instance: &TableInstance) -> String {
        for stage in self.staging {
            if stage.replaced_path == instance.joins && stage.replaced_table == instance.table {
                log::debug!(
                    "Substituting staged table '{}' for '{}'",
                    stage.staging_table,
                    instance.table
                );
                return self.dialect.quote_identifier(&stage.staging_table);
            }
        }
        self.dialect.quote_identifier(&instance.table)
    }
}
