//! Tool registry: typed metadata, parameter validation and prompt generation.
//!
//! The registry is filled once at startup and then shared read-only behind an
//! `Arc` by every concurrent diagnosis run. Tools are pure lookups: they hold
//! no mutable state, so sharing them needs no locking.

use crate::types::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

// =============================================================================
// Parameter types
// =============================================================================

/// Parameter type for tool inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    Number,
    Bool,
    Enum(Vec<String>),
    Optional(Box<ParamType>),
}

impl ParamType {
    /// Validate a JSON value against this parameter type.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        let ok = match self {
            ParamType::String => value.is_string(),
            ParamType::Int => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Bool => value.is_boolean(),
            ParamType::Enum(variants) => {
                let Some(s) = value.as_str() else {
                    return Err(format!("expected string for enum, got {}", value_type_name(value)));
                };
                if variants.iter().any(|v| v == s) {
                    return Ok(());
                }
                return Err(format!(
                    "invalid enum value '{}', expected one of: {}",
                    s,
                    variants.join(", ")
                ));
            }
            ParamType::Optional(inner) => return if value.is_null() { Ok(()) } else { inner.validate(value) },
        };

        if ok {
            Ok(())
        } else {
            Err(format!("expected {}, got {}", self.display_name(), value_type_name(value)))
        }
    }

    /// Human-readable type name for prompt generation.
    pub fn display_name(&self) -> String {
        match self {
            ParamType::String => "string".to_string(),
            ParamType::Int => "integer".to_string(),
            ParamType::Number => "number".to_string(),
            ParamType::Bool => "boolean".to_string(),
            ParamType::Enum(variants) => format!("enum({})", variants.join("|")),
            ParamType::Optional(inner) => inner.display_name(),
        }
    }

    /// JSON-schema fragment for this type.
    fn schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Int => json!({"type": "integer"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::Bool => json!({"type": "boolean"}),
            ParamType::Enum(variants) => json!({"type": "string", "enum": variants}),
            ParamType::Optional(inner) => inner.schema(),
        }
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Tool entry
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            default: None,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str, default: Option<Value>) -> Self {
        Self {
            name: name.to_string(),
            param_type: ParamType::Optional(Box::new(param_type)),
            description: description.to_string(),
            default,
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && !matches!(self.param_type, ParamType::Optional(_))
    }
}

/// Catalog metadata for one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
}

impl ToolEntry {
    /// JSON-schema object describing the tool's parameters.
    pub fn parameter_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.parameters {
            let mut schema = p.param_type.schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("description".to_string(), Value::String(p.description.clone()));
                if let Some(default) = &p.default {
                    obj.insert("default".to_string(), default.clone());
                }
            }
            properties.insert(p.name.clone(), schema);
            if p.is_required() {
                required.push(Value::String(p.name.clone()));
            }
        }
        json!({"type": "object", "properties": properties, "required": required})
    }

    /// Prompt line: `- name(param: type, opt?: type): description`
    pub fn to_prompt_line(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let optional = if p.is_required() { "" } else { "?" };
                format!("{}{}: {}", p.name, optional, p.param_type.display_name())
            })
            .collect();

        format!("- {}({}): {}", self.name, params.join(", "), self.description)
    }
}

// =============================================================================
// Tool trait
// =============================================================================

/// A pure lookup tool the diagnosis model may ask for.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Catalog metadata. Must be stable for the lifetime of the tool.
    fn entry(&self) -> ToolEntry;

    /// Run the lookup. Parameters have already been validated and defaulted.
    async fn invoke(&self, params: Value) -> Result<Value>;
}

// =============================================================================
// Tool registry
// =============================================================================

struct RegisteredTool {
    entry: ToolEntry,
    tool: Arc<dyn Tool>,
}

/// Catalog of tools keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in agronomy tools.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        for tool in super::builtin::all() {
            if let Err(e) = registry.register(tool) {
                warn!(error = %e, "builtin_tool_rejected");
                debug_assert!(false, "built-in tool rejected: {}", e);
            }
        }
        registry
    }

    /// Register a tool. A later registration with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let entry = tool.entry();
        if entry.name.is_empty() {
            return Err(Error::input("Tool name cannot be empty"));
        }
        self.tools
            .insert(entry.name.clone(), RegisteredTool { entry, tool });
        Ok(())
    }

    /// Get a tool entry by name.
    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.get(name).map(|t| &t.entry)
    }

    pub(crate) fn implementation(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| Arc::clone(&t.tool))
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool names, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// All entries, sorted by name.
    pub fn list_entries(&self) -> Vec<&ToolEntry> {
        let mut entries: Vec<&ToolEntry> = self.tools.values().map(|t| &t.entry).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Validate parameters against a tool's parameter definitions.
    ///
    /// Returns a list of validation errors (empty = valid).
    pub fn validate_params(&self, name: &str, params: &Value) -> Result<Vec<String>> {
        let entry = self
            .get(name)
            .ok_or_else(|| Error::tool(format!("Unknown tool: {}", name)))?;

        let param_map = params
            .as_object()
            .ok_or_else(|| Error::tool("Parameters must be a JSON object"))?;

        let mut errors: Vec<String> = entry
            .parameters
            .iter()
            .filter(|p| p.is_required() && !param_map.contains_key(&p.name))
            .map(|p| format!("Missing required parameter: {}", p.name))
            .collect();

        for (key, value) in param_map {
            match entry.parameters.iter().find(|p| &p.name == key) {
                Some(def) => {
                    if let Err(e) = def.param_type.validate(value) {
                        errors.push(format!("Parameter '{}': {}", key, e));
                    }
                }
                None => errors.push(format!("Unknown parameter: {}", key)),
            }
        }

        Ok(errors)
    }

    /// Fill in default values for missing optional parameters.
    pub fn fill_defaults(&self, name: &str, params: &mut Value) -> Result<()> {
        let entry = self
            .get(name)
            .ok_or_else(|| Error::tool(format!("Unknown tool: {}", name)))?;

        if params.is_null() {
            *params = Value::Object(Map::new());
        }
        if let Some(map) = params.as_object_mut() {
            for def in &entry.parameters {
                if let (false, Some(default)) = (map.contains_key(&def.name), &def.default) {
                    map.insert(def.name.clone(), default.clone());
                }
            }
        }
        Ok(())
    }

    /// Prompt section describing the available tools, empty if none are registered.
    pub fn generate_prompt(&self) -> String {
        let entries = self.list_entries();
        if entries.is_empty() {
            return String::new();
        }

        let mut lines = Vec::with_capacity(entries.len() + 1);
        lines.push("Available tools:".to_string());
        lines.extend(entries.iter().map(|e| e.to_prompt_line()));
        lines.join("\n")
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
