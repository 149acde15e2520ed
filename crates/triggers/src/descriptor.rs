//! Static metadata describing a trigger and the parameters it accepts.
//!
//! Descriptors are what the catalog endpoint returns and what the workflow
//! validator checks step parameters against. They never carry the
//! executable capability itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primitive type tag of a trigger parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    /// One of a fixed set of string options.
    Select,
    /// A JSON object, e.g. request headers.
    Object,
    /// A JSON array, e.g. command arguments.
    Array,
    /// Any JSON value. Strings are passed through for the trigger to parse.
    Json,
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamDescriptor {
    fn new(id: &str, name: &str, kind: ParamKind) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            kind,
            required: false,
            options: None,
            default: None,
            description: None,
        }
    }

    pub fn string(id: &str, name: &str) -> Self {
        Self::new(id, name, ParamKind::String)
    }

    pub fn number(id: &str, name: &str) -> Self {
        Self::new(id, name, ParamKind::Number)
    }

    pub fn boolean(id: &str, name: &str) -> Self {
        Self::new(id, name, ParamKind::Boolean)
    }

    pub fn object(id: &str, name: &str) -> Self {
        Self::new(id, name, ParamKind::Object)
    }

    pub fn array(id: &str, name: &str) -> Self {
        Self::new(id, name, ParamKind::Array)
    }

    pub fn json(id: &str, name: &str) -> Self {
        Self::new(id, name, ParamKind::Json)
    }

    pub fn select(id: &str, name: &str, options: &[&str]) -> Self {
        Self {
            options: Some(options.iter().map(|o| (*o).to_owned()).collect()),
            ..Self::new(id, name, ParamKind::Select)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Check a supplied value against this parameter's type tag.
    ///
    /// Numbers may also arrive as numeric strings, which is what form inputs
    /// produce.
    pub fn accepts(&self, value: &Value) -> bool {
        match self.kind {
            ParamKind::String => value.is_string(),
            ParamKind::Number => match value {
                Value::Number(_) => true,
                Value::String(s) => s.trim().parse::<f64>().is_ok(),
                _ => false,
            },
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Select => match (value.as_str(), &self.options) {
                (Some(v), Some(options)) => options.iter().any(|o| o == v),
                _ => false,
            },
            ParamKind::Object => value.is_object(),
            ParamKind::Array => value.is_array(),
            ParamKind::Json => !value.is_null(),
        }
    }
}

/// Public description of a registered trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    /// What the trigger drives underneath (`shell`, `http`, `python`, ...).
    pub language: String,
    pub params: Vec<ParamDescriptor>,
}
