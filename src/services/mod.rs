//! Service layer for hosted chat-completion models
//!
//! [`Llm`] is the interface the router consumes. [`openai::OpenAiLlm`] is the
//! chat-completion implementation.

pub mod openai;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{
    error::{LlmError, Result},
    function_call::FunctionSchema,
    messages::Message,
};

const EXTRACT_SYSTEM_PROMPT: &str = "You are an intelligent AI. Given a command or request from the user, call the function to complete the request.";

/// Core trait for language models
///
/// Implementors only provide [`Llm::call`]; argument extraction is shared.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Model name sent with each request
    fn name(&self) -> &str;

    /// Send one conversation and return either the reply text or, when a
    /// schema is supplied, the raw arguments of the forced tool call
    async fn call(
        &self,
        messages: &[Message],
        function_schema: Option<&FunctionSchema>,
    ) -> Result<String>;

    /// Ask the model to fill in the arguments of `function_schema` from `query`
    async fn extract_function_inputs(
        &self,
        query: &str,
        function_schema: &FunctionSchema,
    ) -> Result<Map<String, Value>> {
        let messages = [
            Message::system(EXTRACT_SYSTEM_PROMPT),
            Message::user(query),
        ];
        let output = self.call(&messages, Some(function_schema)).await?;
        let inputs = parse_function_inputs(&output)?;
        validate_function_inputs(&inputs, function_schema)?;
        tracing::debug!(function = function_schema.name(), ?inputs, "extracted function inputs");
        Ok(inputs)
    }
}

/// Parse tool-call arguments as a JSON object
///
/// Models occasionally answer with single-quoted pseudo-JSON; that is retried
/// once with the quotes swapped.
pub(crate) fn parse_function_inputs(output: &str) -> Result<Map<String, Value>> {
    let parsed = serde_json::from_str::<Value>(output)
        .or_else(|_| serde_json::from_str::<Value>(&output.replace('\'', "\"")));

    match parsed {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(LlmError::output("Invalid inputs, expected a JSON object.")),
    }
}

/// Every required parameter of `function_schema` must be present in `inputs`
pub(crate) fn validate_function_inputs(
    inputs: &Map<String, Value>,
    function_schema: &FunctionSchema,
) -> Result<()> {
    match function_schema
        .required()
        .iter()
        .find(|name| !inputs.contains_key(name.as_str()))
    {
        Some(missing) => Err(LlmError::output(format!(
            "Invalid inputs, missing required parameter: {missing}."
        ))),
        None => Ok(()),
    }
}
