/// Field reference resolution
///
/// Turns the parsed `FieldRef`s of SELECT and WHERE into canonical column
/// indices of a schema. Every failure here happens before a scan starts.
use crate::error::{ConnectorError, ConnectorResult};
use crate::metadata::schema::TableSchema;
use crate::query::parser::{FieldRef, WhereCondition};
use std::collections::HashSet;

/// WHERE condition bound to a column index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCondition {
    pub column: usize,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    /// Schema handed back to the caller; columns referenced as `@N` anywhere carry the `@N` token as name
    pub output_schema: TableSchema,
    /// Selected column indices, in SELECT order, without repeats
    pub selected: Vec<usize>,
    pub conditions: Vec<ResolvedCondition>,
}

impl ResolvedQuery {
    pub fn is_selected(&self, column: usize) -> bool {
        self.selected.contains(&column)
    }
}

/// Resolve SELECT fields and WHERE conditions against `schema`
pub fn resolve_fields(
    schema: &TableSchema,
    fields: &[FieldRef],
    conditions: &[WhereCondition],
) -> ConnectorResult<ResolvedQuery> {
    let referenced: HashSet<&FieldRef> = fields
        .iter()
        .chain(conditions.iter().map(|c| &c.field))
        .collect();

    let mut output_schema = schema.clone();
    let mut selected = Vec::with_capacity(fields.len());
    for field in fields {
        let column = resolve_one(schema, field, &referenced)?;
        if let FieldRef::Position(_) = field {
            output_schema.rename(column, field.token());
        }
        if !selected.contains(&column) {
            selected.push(column);
        }
    }

    let conditions = conditions
        .iter()
        .map(|condition| {
            let column = resolve_one(schema, &condition.field, &referenced)?;
            if let FieldRef::Position(_) = condition.field {
                output_schema.rename(column, condition.field.token());
            }
            Ok(ResolvedCondition {
                column,
                value: condition.value.clone(),
            })
        })
        .collect::<ConnectorResult<Vec<_>>>()?;

    Ok(ResolvedQuery {
        output_schema,
        selected,
        conditions,
    })
}

/// Column index of one reference; `referenced` is every reference of the query
pub fn resolve_one(
    schema: &TableSchema,
    field: &FieldRef,
    referenced: &HashSet<&FieldRef>,
) -> ConnectorResult<usize> {
    match field {
        FieldRef::Position(position) => {
            let column = schema.column(*position).ok_or_else(|| {
                ConnectorError::field_not_found(
                    format!("The field position \"{}\" is not valid", field),
                    field.token(),
                )
            })?;
            if referenced.contains(&FieldRef::Name(column.name.clone())) {
                return Err(ConnectorError::field_not_found(
                    format!(
                        "The field \"{}\" is referenced both by position \"{}\" and by name",
                        column.name, field
                    ),
                    column.name.clone(),
                ));
            }
            Ok(*position)
        }
        FieldRef::Name(name) => schema.index_of(name).ok_or_else(|| {
            ConnectorError::field_not_found(format!("The field \"{}\" is not valid", name), name.clone())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::metadata::schema::build_schema;
    use crate::storage::symbol::{Symbol, SymbolKind};

    fn parameter() -> TableSchema {
        build_schema(&Symbol::new(
            "d",
            SymbolKind::Parameter,
            vec!["i".to_string(), "j".to_string()],
        ))
    }

    fn names(tokens: &[&str]) -> Vec<FieldRef> {
        tokens.iter().map(|t| FieldRef::parse(t)).collect()
    }

    #[test]
    fn test_names_and_positions_resolve_to_indices() {
        let resolved = resolve_fields(&parameter(), &names(&["j", "@2", "Value (SV)"]), &[]).unwrap();
        assert_eq!(resolved.selected, vec![1, 2, 3]);
        assert_eq!(resolved.output_schema.names(), vec!["i", "j", "@2", "Value (SV)"]);
        assert!(resolved.is_selected(2));
        assert!(!resolved.is_selected(0));
    }

    #[test]
    fn test_repeated_field_is_selected_once() {
        let resolved = resolve_fields(&parameter(), &names(&["i", "i", "@3", "@3"]), &[]).unwrap();
        assert_eq!(resolved.selected, vec![0, 3]);
    }

    #[test]
    fn test_where_conditions_resolve_positions() {
        let conditions = vec![
            WhereCondition::new("@1", "new-york"),
            WhereCondition::new("i", ""),
        ];
        let resolved = resolve_fields(&parameter(), &names(&["Value"]), &conditions).unwrap();
        assert_eq!(
            resolved.conditions,
            vec![
                ResolvedCondition { column: 1, value: "new-york".into() },
                ResolvedCondition { column: 0, value: String::new() },
            ]
        );
        // WHERE-only positions are renamed as well
        assert_eq!(resolved.output_schema.names(), vec!["i", "@1", "Value", "Value (SV)"]);
    }

    #[test]
    fn test_position_past_the_end() {
        let err = resolve_fields(&parameter(), &names(&["@4"]), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);
        assert!(err.to_string().contains("@4"));
    }

    #[test]
    fn test_same_column_by_position_and_name() {
        let err = resolve_fields(&parameter(), &names(&["@0", "i"]), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);

        // also across SELECT and WHERE
        let err = resolve_fields(&parameter(), &names(&["@0"]), &[WhereCondition::new("i", "a")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);
    }

    #[test]
    fn test_unknown_field() {
        let err = resolve_fields(&parameter(), &names(&["k"]), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);

        let err = resolve_fields(&parameter(), &names(&["i"]), &[WhereCondition::new("k", "a")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);
    }
}
