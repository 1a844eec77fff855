//! Bundle variables.

use crate::message::SourceLocation;

/// A variable the engine initializes before running searches.
#[derive(Debug, Clone)]
pub struct VariableSymbol {
    /// Variable name.
    pub id: String,
    /// Initial value; `None` declares the variable without a value.
    pub value: Option<String>,
    /// Declared type ("string", "numeric", "version", "formatted").
    pub variable_type: Option<String>,
    /// True to keep the value out of logs.
    pub hidden: bool,
    /// True to persist the value across engine runs.
    pub persisted: bool,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}

impl VariableSymbol {
    /// Creates a plain string variable.
    pub fn new(id: impl Into<String>, value: Option<String>) -> Self {
        Self {
            id: id.into(),
            value,
            variable_type: None,
            hidden: false,
            persisted: false,
            source: None,
        }
    }
}
