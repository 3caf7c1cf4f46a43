/// Value slot decoding
///
/// A raw slot is an acronym reference, one of the special values, or a plain number.
use crate::storage::special::SpecialValue;
use crate::storage::store::SymbolStore;

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Number(f64),
    Special(SpecialValue),
    Acronym(String),
}

impl DecodedValue {
    pub fn is_special(&self) -> bool {
        !matches!(self, DecodedValue::Number(_))
    }

    /// Present only for plain numbers
    pub fn numeric_form(&self) -> Option<f64> {
        match self {
            DecodedValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Present only for special values and acronyms
    pub fn text_form(&self) -> Option<String> {
        match self {
            DecodedValue::Number(_) => None,
            DecodedValue::Special(sv) => sv.label().map(str::to_string),
            DecodedValue::Acronym(name) => Some(name.clone()),
        }
    }
}

/// Decodes value slots against one store's acronym and special-value tables
pub struct ValueCodec<'a> {
    store: &'a dyn SymbolStore,
}

impl<'a> ValueCodec<'a> {
    pub fn new(store: &'a dyn SymbolStore) -> Self {
        Self { store }
    }

    pub fn decode(&self, raw: f64) -> DecodedValue {
        if let Some(name) = self.store.acronym_name(raw) {
            return DecodedValue::Acronym(name.to_string());
        }
        match self.store.map_value(raw) {
            SpecialValue::Normal => DecodedValue::Number(raw),
            special => DecodedValue::Special(special),
        }
    }
}

/// Shortest round-trip text of a number
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}
