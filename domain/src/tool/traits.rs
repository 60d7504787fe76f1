//! Tool domain traits
//!
//! Pure argument validation against a tool's parameter schema.
//! The async `Tool` contract lives in the application layer (ports).

use super::entities::{ToolArguments, ToolCall, ToolDefinition};
use serde_json::Value;
use thiserror::Error;

/// Why raw model arguments did not satisfy a tool's schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Arguments for tool '{tool}' are not valid JSON: {message}")]
    MalformedJson { tool: String, message: String },

    #[error("Arguments for tool '{tool}' must be a JSON object")]
    NotAnObject { tool: String },

    #[error("Missing required parameter '{parameter}' for tool '{tool}'")]
    MissingParameter { tool: String, parameter: String },

    #[error("Unknown parameter '{parameter}' for tool '{tool}'")]
    UnknownParameter { tool: String, parameter: String },

    #[error("Parameter '{parameter}' for tool '{tool}' must be of type {expected}")]
    WrongType {
        tool: String,
        parameter: String,
        expected: String,
    },
}

/// Validator for tool calls
///
/// This is a pure domain trait that validates tool calls
/// against their definitions without any I/O operations.
pub trait ToolValidator {
    /// Parse and validate a call's raw arguments against its definition
    fn validate(
        &self,
        call: &ToolCall,
        definition: &ToolDefinition,
    ) -> Result<ToolArguments, SchemaError>;
}

/// Default implementation of ToolValidator
#[derive(Debug, Clone, Default)]
pub struct DefaultToolValidator;

impl ToolValidator for DefaultToolValidator {
    fn validate(
        &self,
        call: &ToolCall,
        definition: &ToolDefinition,
    ) -> Result<ToolArguments, SchemaError> {
        let tool = definition.name.clone();

        // Models sometimes send an empty string for a no-argument call
        let raw = call.raw_arguments.trim();
        let value: Value = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).map_err(|e| SchemaError::MalformedJson {
                tool: tool.clone(),
                message: e.to_string(),
            })?
        };

        let Value::Object(map) = value else {
            return Err(SchemaError::NotAnObject { tool });
        };

        for param in &definition.parameters {
            match map.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(SchemaError::MissingParameter {
                        tool,
                        parameter: param.name.clone(),
                    });
                }
                Some(value) if !value.is_null() && !param.param_type.accepts(value) => {
                    return Err(SchemaError::WrongType {
                        tool,
                        parameter: param.name.clone(),
                        expected: param.param_type.as_str().to_string(),
                    });
                }
                _ => {}
            }
        }

        if let Some(unknown) = map.keys().find(|k| definition.parameter(k).is_none()) {
            return Err(SchemaError::UnknownParameter {
                tool,
                parameter: unknown.clone(),
            });
        }

        Ok(ToolArguments::new(map))
    }
}
