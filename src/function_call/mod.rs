//! Function-tool schemas for structured model output
//!
//! A [`FunctionSignature`] is turned into the JSON-schema envelope that the
//! chat-completion API accepts as a tool definition. The model is then asked
//! to "call" that tool, and the serialized arguments come back as output.

mod signature;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub use self::signature::{FunctionSignature, Parameter};

/// Placeholder used when a function or parameter has no description
pub const NO_DESCRIPTION: &str = "No description available.";

/// A `{"type": "function", "function": {...}}` tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParametersSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersSchema {
    #[serde(rename = "type")]
    pub kind: String,
    /// Keyed by parameter name, in declaration order
    pub properties: IndexMap<String, PropertySchema>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

impl FunctionSchema {
    /// The function name the model is asked to call
    #[must_use]
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Required parameter names
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.function.parameters.required
    }
}

/// Map a type annotation to a JSON-schema primitive type name
///
/// Generic annotations are mapped by their base name, so `list[int]` is an `array`.
#[must_use]
pub fn convert_type_to_json_type(annotation: &str) -> &'static str {
    let base = annotation
        .split(['[', '<'])
        .next()
        .unwrap_or(annotation)
        .trim();

    match base {
        "int" | "float" | "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64"
        | "usize" | "isize" | "f32" | "f64" => "number",
        "str" | "String" | "&str" => "string",
        "bool" => "boolean",
        "NoneType" | "None" => "null",
        "list" | "Vec" => "array",
        _ => "object",
    }
}

/// Build the chat-completion tool schema for a function
#[must_use]
pub fn get_schema_openai(signature: &FunctionSignature) -> FunctionSchema {
    let properties = signature
        .parameters
        .iter()
        .map(|param| {
            (
                param.name.clone(),
                PropertySchema {
                    kind: convert_type_to_json_type(param.type_name()).to_string(),
                    description: NO_DESCRIPTION.to_string(),
                },
            )
        })
        .collect();

    FunctionSchema {
        kind: "function".to_string(),
        function: FunctionDefinition {
            name: signature.name.clone(),
            description: signature
                .doc
                .clone()
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            parameters: ParametersSchema {
                kind: "object".to_string(),
                properties,
                required: signature.required().map(str::to_string).collect(),
            },
        },
    }
}

/// Provider-neutral description: name, description, rendered signature and output type
#[must_use]
pub fn get_schema(signature: &FunctionSignature) -> Value {
    json!({
        "name": signature.name,
        "description": signature.doc.as_deref().unwrap_or(NO_DESCRIPTION),
        "signature": signature.render(),
        "output": signature.returns.as_deref().unwrap_or("None"),
    })
}

/// Parse `declaration` and build its tool schema in one step
///
/// # Errors
///
/// Returns [`LlmError::NotCallable`](crate::error::LlmError::NotCallable) if
/// `declaration` is not a function declaration
pub fn schema_from_declaration(
    declaration: &str,
    doc: Option<&str>,
) -> crate::error::Result<FunctionSchema> {
    FunctionSignature::parse(declaration, doc).map(|sig| get_schema_openai(&sig))
}
