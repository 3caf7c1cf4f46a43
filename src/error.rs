/// Unified error type for the connector
/// Every failure of a query is terminal and carries a kind the dispatch layer can map to a result code
use serde::Serialize;
use thiserror::Error;

/// Category of a connector failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Syntax,
    FieldNotFound,
    UnsupportedFilter,
    TableNotFound,
    AmbiguousSpecialValue,
    StorageIo,
    Connect,
    Internal,
}

#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    /// Query text does not follow the SELECT/FROM/WHERE grammar
    #[error("Error in the {section} section: {message}")]
    Syntax {
        section: String,
        message: String,
    },

    /// Unknown field, position past the schema end, or a column referenced twice
    #[error("Field not found: {message}")]
    FieldNotFound {
        message: String,
        field: Option<String>,
    },

    /// WHERE condition on a column the storage layer cannot filter
    #[error("Unsupported filter: {message}")]
    UnsupportedFilter {
        message: String,
        field: Option<String>,
    },

    /// Referenced symbol does not exist in the store
    #[error("Table not found: {message}")]
    TableNotFound {
        message: String,
        table: Option<String>,
    },

    /// A special value met a selection without its companion text column
    #[error("Ambiguous special value: {message}")]
    AmbiguousSpecialValue {
        message: String,
        field: Option<String>,
    },

    /// Failure opening or reading the underlying store
    #[error("Storage IO error: {message}")]
    StorageIo {
        message: String,
        path: Option<String>,
        context: Option<String>,
    },

    /// Store locator could not be resolved to an accessible file
    #[error("Connect error: {message}")]
    Connect {
        message: String,
        path: Option<String>,
    },

    /// Internal errors: should never happen, indicates bug
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        context: Option<String>,
    },
}

impl ConnectorError {
    pub fn syntax(section: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            section: section.into(),
            message: message.into(),
        }
    }

    pub fn field_not_found(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn unsupported_filter(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnsupportedFilter {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn table_not_found(table: impl Into<String>) -> Self {
        let table = table.into();
        Self::TableNotFound {
            message: format!("The symbol \"{}\" is not valid", table),
            table: Some(table),
        }
    }

    pub fn ambiguous_special_value(number_field: &str, special_field: &str) -> Self {
        Self::AmbiguousSpecialValue {
            message: format!(
                "The field \"{}\" contains special values, so the field \"{}\" has to be selected",
                number_field, special_field
            ),
            field: Some(number_field.to_string()),
        }
    }

    pub fn storage_io(message: impl Into<String>) -> Self {
        Self::StorageIo {
            message: message.into(),
            path: None,
            context: None,
        }
    }

    pub fn storage_io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::StorageIo {
            message: message.into(),
            path: Some(path.into()),
            context: None,
        }
    }

    pub fn connect(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Kind of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax { .. } => ErrorKind::Syntax,
            Self::FieldNotFound { .. } => ErrorKind::FieldNotFound,
            Self::UnsupportedFilter { .. } => ErrorKind::UnsupportedFilter,
            Self::TableNotFound { .. } => ErrorKind::TableNotFound,
            Self::AmbiguousSpecialValue { .. } => ErrorKind::AmbiguousSpecialValue,
            Self::StorageIo { .. } => ErrorKind::StorageIo,
            Self::Connect { .. } => ErrorKind::Connect,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Add context to an error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::StorageIo { context: ctx, .. } => *ctx = Some(context.into()),
            Self::Internal { context: ctx, .. } => *ctx = Some(context.into()),
            _ => {}
        }
        self
    }
}

impl From<anyhow::Error> for ConnectorError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
            context: None,
        }
    }
}

impl From<std::io::Error> for ConnectorError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageIo {
            message: err.to_string(),
            path: None,
            context: None,
        }
    }
}

/// Result type alias for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;
