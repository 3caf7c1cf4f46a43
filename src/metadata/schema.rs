/// Table schema derived from a symbol
///
/// Column layout by kind (D = dimension count):
/// - Set: D dimension columns + `Text`
/// - Parameter: D dimension columns + `Value`, `Value (SV)` [+ `Comments` for scalars with text]
/// - Variable / Equation: D dimension columns + (`<Label>`, `<Label> (SV)`) for
///   Level, Marginal, Lower, Upper, Scale
///
/// Downstream consumers bind to these names, so the layout is fixed.
use crate::storage::symbol::{Symbol, SymbolKind, ValueSlot};
use arrow::datatypes::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Domain name of the universe set
pub const WILDCARD_DOMAIN: &str = "*";

/// Suffix of the companion column holding special-value text
pub const SPECIAL_VALUE_SUFFIX: &str = " (SV)";

pub const SET_TEXT_COLUMN: &str = "Text";
pub const VALUE_COLUMN: &str = "Value";
pub const COMMENTS_COLUMN: &str = "Comments";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Text,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Number,
        }
    }
}

/// Ordered columns of one symbol: dimensions first, then kind-specific value columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub kind: SymbolKind,
    pub dimension_count: usize,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn is_dimension(&self, index: usize) -> bool {
        index < self.dimension_count
    }

    /// Column pair (number, special text) holding a value slot
    pub fn value_columns(&self, slot: ValueSlot) -> Option<(usize, usize)> {
        let base = self.dimension_count;
        match self.kind {
            SymbolKind::Parameter if slot == ValueSlot::Level => Some((base, base + 1)),
            SymbolKind::Variable | SymbolKind::Equation => {
                let number = base + 2 * slot.index();
                Some((number, number + 1))
            }
            _ => None,
        }
    }

    /// Position of the scalar comment column, when present
    pub fn comments_column(&self) -> Option<usize> {
        let index = self.dimension_count + 2;
        (self.kind == SymbolKind::Parameter && self.columns.len() > index).then_some(index)
    }

    /// Rename one column, keeping its type and position
    pub fn rename(&mut self, index: usize, name: impl Into<String>) {
        if let Some(column) = self.columns.get_mut(index) {
            column.name = name.into();
        }
    }

    /// Arrow schema with every column nullable (unselected or non-special cells are null)
    pub fn to_arrow_schema(&self) -> Arc<Schema> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| {
                let data_type = match c.column_type {
                    ColumnType::Text => DataType::Utf8,
                    ColumnType::Number => DataType::Float64,
                };
                Field::new(&c.name, data_type, true)
            })
            .collect();
        Arc::new(Schema::new(fields))
    }
}

/// Build the column schema of a symbol
pub fn build_schema(symbol: &Symbol) -> TableSchema {
    let dimension_count = symbol.dimension_count();
    let mut columns: Vec<Column> = dimension_column_names(&symbol.domain_names)
        .into_iter()
        .map(Column::text)
        .collect();

    match symbol.kind {
        SymbolKind::Set => {
            columns.push(Column::text(SET_TEXT_COLUMN));
        }
        SymbolKind::Parameter => {
            columns.push(Column::number(VALUE_COLUMN));
            columns.push(Column::text(format!("{}{}", VALUE_COLUMN, SPECIAL_VALUE_SUFFIX)));
            if dimension_count == 0 && symbol.has_scalar_text() {
                columns.push(Column::text(COMMENTS_COLUMN));
            }
        }
        SymbolKind::Variable | SymbolKind::Equation => {
            for slot in ValueSlot::ALL {
                columns.push(Column::number(slot.label()));
                columns.push(Column::text(format!("{}{}", slot.label(), SPECIAL_VALUE_SUFFIX)));
            }
        }
    }

    TableSchema {
        table: symbol.name.clone(),
        kind: symbol.kind,
        dimension_count,
        columns,
    }
}

/// Unique dimension column names.
///
/// The wildcard domain, or a name already taken, becomes `domain + counter`
/// with the counter starting at 0 and increasing until the name is free.
pub fn dimension_column_names(domains: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(domains.len());
    for domain in domains {
        let mut candidate = domain.clone();
        let mut counter = 0usize;
        while candidate == WILDCARD_DOMAIN || names.contains(&candidate) {
            candidate = format!("{}{}", domain, counter);
            counter += 1;
        }
        names.push(candidate);
    }
    names
}
