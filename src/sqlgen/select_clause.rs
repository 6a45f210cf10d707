//! SELECT clause generation: the compiled column list in ColumnSpecInfo
//! order, with optional key-id conversion wrapping and optional CASE code
//! translation on the discriminator column.

use crate::dataspec::entity_spec::CodeMapping;

use super::column_spec_info::ColumnSpecInfo;
use super::dialect::SqlDialect;
use super::errors::SqlGenError;
use super::table_aliaser::TableAliaser;

pub struct SelectClause<'a> {
    info: &'a ColumnSpecInfo,
    aliaser: &'a TableAliaser,
    dialect: &'a dyn SqlDialect,
    wrap_key_id: bool,
    /// Code→id mappings to emit as a CASE expression over the discriminator
    /// column, normalizing database-local codes inside the database.
    case_translation: Option<&'a [CodeMapping]>,
}

impl<'a> SelectClause<'a> {
    pub fn new(
        info: &'a ColumnSpecInfo,
        aliaser: &'a TableAliaser,
        dialect: &'a dyn SqlDialect,
        wrap_key_id: bool,
        case_translation: Option<&'a [CodeMapping]>,
    ) -> Self {
        SelectClause {
            info,
            aliaser,
            dialect,
            wrap_key_id,
            case_translation,
        }
    }

    pub fn generate(&self) -> Result<String, SqlGenError> {
        let mut columns = Vec::with_capacity(self.info.column_specs.len());
        for (idx, spec) in self.info.column_specs.iter().enumerate() {
            let column_ref = self.aliaser.column_reference(spec)?;
            let rendered = if idx == self.info.key_id_index && self.wrap_key_id {
                self.dialect.wrap_key_id(&column_ref)
            } else if Some(idx) == self.info.code_index {
                match self.case_translation {
                    Some(mappings) if !mappings.is_empty() => {
                        self.dialect.render_case(&column_ref, mappings)?
                    }
                    _ => column_ref,
                }
            } else {
                column_ref
            };
            columns.push(rendered);
        }
        Ok(format!("SELECT {}", columns.join(", ")))
    }
}
