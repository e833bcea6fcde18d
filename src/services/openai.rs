//! OpenAI chat-completion adapter
//!
//! Supports:
//! - OpenAI official API
//! - OpenAI-compatible endpoints (via `base_url`)

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use crate::{
    config::LlmConfig,
    error::{LlmError, Result},
    function_call::FunctionSchema,
    messages::Message,
};

use super::Llm;

/// Transport for a single chat-completion request
///
/// [`HttpChatClient`] is the real implementation; tests and alternative
/// endpoints can supply their own.
#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    async fn create(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse>;
}

/// `reqwest`-backed client for `POST {base_url}/chat/completions`
pub struct HttpChatClient {
    client: Client,
    base_url: String,
}

impl HttpChatClient {
    /// Create a new HTTP client
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be sent as a header or the client cannot be built
    pub fn new(api_key: &str, base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatCompletionClient for HttpChatClient {
    async fn create(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response.json().await?)
    }
}

/// Chat-completion LLM with optional forced tool calling
pub struct OpenAiLlm {
    name: String,
    temperature: f32,
    max_tokens: u32,
    client: Option<Arc<dyn ChatCompletionClient>>,
}

impl fmt::Debug for OpenAiLlm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiLlm")
            .field("name", &self.name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("client", &self.client.as_ref().map(|_| "<client>"))
            .finish()
    }
}

impl OpenAiLlm {
    /// Create a new adapter with an HTTP client built from `config`
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Configuration`] if no API key resolves or the client
    /// fails to initialize
    pub fn new(config: LlmConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| LlmError::configuration("OpenAI API key cannot be 'None'."))?;

        let client =
            HttpChatClient::new(api_key, &config.base_url, config.timeout()).map_err(|e| {
                tracing::error!(error = %e, "OpenAI client construction failed");
                LlmError::configuration(format!(
                    "OpenAI API client failed to initialize. Error: {e}"
                ))
            })?;

        Ok(Self::with_client(&config, Arc::new(client)))
    }

    /// Create an adapter from the environment, preferring an explicit key
    ///
    /// # Errors
    ///
    /// Same as [`OpenAiLlm::new`]
    pub fn from_env(api_key: Option<&str>) -> Result<Self> {
        let mut config = LlmConfig::from_env();
        config.prefer_api_key(api_key);
        Self::new(config)
    }

    /// Like [`OpenAiLlm::from_env`], resolving variables through `lookup`
    ///
    /// An empty `api_key` counts as absent and falls back to `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Same as [`OpenAiLlm::new`]
    pub fn from_lookup<F>(api_key: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LlmConfig::from_lookup(lookup);
        config.prefer_api_key(api_key);
        Self::new(config)
    }

    /// Create an adapter around an existing client; the key in `config` is not used
    #[must_use]
    pub fn with_client(config: &LlmConfig, client: Arc<dyn ChatCompletionClient>) -> Self {
        Self {
            name: config.name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: Some(client),
        }
    }

    #[must_use]
    pub const fn temperature(&self) -> f32 {
        self.temperature
    }

    #[must_use]
    pub const fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    #[must_use]
    pub fn client(&self) -> Option<&Arc<dyn ChatCompletionClient>> {
        self.client.as_ref()
    }

    pub fn set_client(&mut self, client: Option<Arc<dyn ChatCompletionClient>>) {
        self.client = client;
    }

    fn build_request(
        &self,
        messages: &[Message],
        function_schema: Option<&FunctionSchema>,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.name.clone(),
            messages: messages.to_vec(),
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            tools: function_schema.map(|schema| vec![schema.clone()]),
            tool_choice: function_schema.map(|schema| ToolChoice::function(schema.name())),
        }
    }
}

#[async_trait]
impl Llm for OpenAiLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        messages: &[Message],
        function_schema: Option<&FunctionSchema>,
    ) -> Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| LlmError::configuration("OpenAI client is not initialized."))?;

        let request = self.build_request(messages, function_schema);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tool = function_schema.map(FunctionSchema::name),
            "sending chat completion"
        );

        let completion = client.create(&request).await.map_err(|e| {
            tracing::error!(error = %e, "LLM error");
            e
        })?;

        let output = if function_schema.is_some() {
            extract_tool_arguments(completion)
        } else {
            extract_content(completion)
        };
        if let Err(e) = &output {
            tracing::error!(error = %e, "LLM error");
        }
        output
    }
}

fn first_message(completion: ChatCompletionResponse) -> Result<ResponseMessage> {
    completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| LlmError::output("Invalid output, expected a choice."))
}

fn extract_content(completion: ChatCompletionResponse) -> Result<String> {
    first_message(completion)?
        .content
        .ok_or_else(|| LlmError::output("Invalid output, expected content."))
}

fn extract_tool_arguments(completion: ChatCompletionResponse) -> Result<String> {
    let tool_calls = first_message(completion)?
        .tool_calls
        .filter(|calls| !calls.is_empty())
        .ok_or_else(|| LlmError::output("Invalid output, expected a tool call."))?;

    let [tool_call] = <[ToolCall; 1]>::try_from(tool_calls).map_err(|_| {
        LlmError::output("Invalid output, expected a single tool to be specified.")
    })?;

    tool_call
        .function
        .arguments
        .ok_or_else(|| LlmError::output("Invalid output, expected arguments to be specified."))
}

// Chat-completion wire types

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<FunctionSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// Forces the model to call one named function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChoice {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolChoiceFunction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    pub name: String,
}

impl ToolChoice {
    #[must_use]
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            kind: "function".to_string(),
            function: ToolChoiceFunction { name: name.into() },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[cfg(test)]
impl ChatCompletionResponse {
    /// A response whose first choice carries plain text
    pub(crate) fn text(content: impl Into<String>) -> Self {
        Self::from_message(ResponseMessage {
            content: Some(content.into()),
            tool_calls: None,
        })
    }

    /// A response whose first choice carries the given tool calls
    pub(crate) fn tool_calls(calls: Option<Vec<ToolCall>>) -> Self {
        Self::from_message(ResponseMessage {
            content: None,
            tool_calls: calls,
        })
    }

    fn from_message(message: ResponseMessage) -> Self {
        Self {
            id: None,
            model: None,
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason: None,
            }],
        }
    }
}

#[cfg(test)]
impl ToolCall {
    pub(crate) fn with_arguments(arguments: Option<&str>) -> Self {
        Self {
            id: None,
            function: ToolCallFunction {
                name: None,
                arguments: arguments.map(str::to_string),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::LlmConfig, function_call::FunctionSignature};
    use std::sync::Mutex;

    /// Returns a canned response and records every request
    struct StubClient {
        response: ChatCompletionResponse,
        requests: Mutex<Vec<ChatCompletionRequest>>,
    }

    impl StubClient {
        fn new(response: ChatCompletionResponse) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatCompletionClient for StubClient {
        async fn create(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    fn llm_with(response: ChatCompletionResponse) -> (OpenAiLlm, Arc<StubClient>) {
        let stub = StubClient::new(response);
        let llm = OpenAiLlm::with_client(&LlmConfig::default(), stub.clone());
        (llm, stub)
    }

    fn function_schema() -> FunctionSchema {
        crate::function_call::get_schema_openai(&FunctionSignature::new("sample_function"))
    }

    fn llm_input() -> Vec<Message> {
        vec![Message::user("test")]
    }

    #[test]
    fn test_openai_llm_init_with_api_key() {
        let llm = OpenAiLlm::new(LlmConfig::with_api_key("test_api_key")).unwrap();
        assert!(llm.client().is_some(), "Client should be initialized");
        assert_eq!(llm.name(), "gpt-3.5-turbo", "Default name not set correctly");
        assert_eq!(llm.max_tokens(), 200);
    }

    #[test]
    fn test_openai_llm_init_from_lookup() {
        let config = LlmConfig::from_lookup(|key| {
            (key == crate::config::ENV_API_KEY).then(|| "fake-api-key".to_string())
        });
        let llm = OpenAiLlm::new(config).unwrap();
        assert!(llm.client().is_some());
    }

    #[test]
    fn test_openai_llm_empty_explicit_key_falls_back_to_env() {
        let env = |key: &str| (key == crate::config::ENV_API_KEY).then(|| "env-key".to_string());
        assert!(OpenAiLlm::from_lookup(Some(""), env).unwrap().client().is_some());
        assert!(OpenAiLlm::from_lookup(None, env).is_ok());
        assert!(OpenAiLlm::from_lookup(Some("explicit-key"), |_| None).is_ok());

        let err = OpenAiLlm::from_lookup(Some(""), |_| None).unwrap_err();
        assert_eq!(err.to_string(), "OpenAI API key cannot be 'None'.");
    }

    #[test]
    fn test_openai_llm_init_without_api_key() {
        let err = OpenAiLlm::new(LlmConfig::from_lookup(|_| None)).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "OpenAI API key cannot be 'None'.");
    }

    #[test]
    fn test_openai_llm_init_exception() {
        let err = OpenAiLlm::new(LlmConfig::with_api_key("bad\nkey")).unwrap_err();
        assert!(err.is_configuration());
        assert!(err
            .to_string()
            .starts_with("OpenAI API client failed to initialize. Error: "));
    }

    #[tokio::test]
    async fn test_openai_llm_call_uninitialized_client() {
        let (mut llm, _) = llm_with(ChatCompletionResponse::text("test"));
        llm.set_client(None);

        let err = llm.call(&llm_input(), None).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("OpenAI client is not initialized."));
    }

    #[tokio::test]
    async fn test_openai_llm_call_success() {
        let (llm, stub) = llm_with(ChatCompletionResponse::text("test"));
        let output = llm.call(&llm_input(), None).await.unwrap();
        assert_eq!(output, "test");

        let requests = stub.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-3.5-turbo");
        assert!(requests[0].tools.is_none());
        assert!(requests[0].tool_choice.is_none());
    }

    #[tokio::test]
    async fn test_openai_llm_call_with_function_schema() {
        let (llm, stub) = llm_with(ChatCompletionResponse::tool_calls(Some(vec![
            ToolCall::with_arguments(Some("result")),
        ])));
        let output = llm
            .call(&llm_input(), Some(&function_schema()))
            .await
            .unwrap();
        assert_eq!(output, "result", "Output did not match expected result with function schema");

        let requests = stub.requests.lock().unwrap();
        assert_eq!(requests[0].tools.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            requests[0].tool_choice,
            Some(ToolChoice::function("sample_function"))
        );
    }

    #[tokio::test]
    async fn test_openai_llm_call_with_invalid_tool_calls() {
        for calls in [None, Some(Vec::new())] {
            let (llm, _) = llm_with(ChatCompletionResponse::tool_calls(calls));
            let err = llm
                .call(&llm_input(), Some(&function_schema()))
                .await
                .unwrap_err();
            assert!(err.is_output());
            assert!(err.to_string().contains("Invalid output, expected a tool call."));
        }
    }

    #[tokio::test]
    async fn test_openai_llm_call_with_no_arguments_in_tool_calls() {
        let (llm, _) = llm_with(ChatCompletionResponse::tool_calls(Some(vec![
            ToolCall::with_arguments(None),
        ])));
        let err = llm
            .call(&llm_input(), Some(&function_schema()))
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Invalid output, expected arguments to be specified."));
    }

    #[tokio::test]
    async fn test_openai_llm_call_with_multiple_tools_specified() {
        let (llm, _) = llm_with(ChatCompletionResponse::tool_calls(Some(vec![
            ToolCall::default(),
            ToolCall::default(),
        ])));
        let err = llm
            .call(&llm_input(), Some(&function_schema()))
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Invalid output, expected a single tool to be specified."));
    }

    #[tokio::test]
    async fn test_null_content_and_missing_choice() {
        let (llm, _) = llm_with(ChatCompletionResponse::tool_calls(None));
        let err = llm.call(&llm_input(), None).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid output, expected content.");

        let (llm, _) = llm_with(ChatCompletionResponse::default());
        let err = llm.call(&llm_input(), None).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid output, expected a choice.");
    }

    #[test]
    fn test_request_serialization() {
        let (llm, _) = llm_with(ChatCompletionResponse::default());
        let plain = serde_json::to_value(llm.build_request(&llm_input(), None)).unwrap();
        assert!(plain.get("tools").is_none());
        assert!(plain.get("tool_choice").is_none());
        assert_eq!(plain["messages"][0]["role"], "user");

        let forced = serde_json::to_value(llm.build_request(&llm_input(), Some(&function_schema())))
            .unwrap();
        assert_eq!(forced["tools"][0]["function"]["name"], "sample_function");
        assert_eq!(
            forced["tool_choice"],
            serde_json::json!({"type": "function", "function": {"name": "sample_function"}})
        );
    }

    #[test]
    fn test_response_parsing_tolerates_nulls() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-3.5-turbo",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function",
                     "function": {"name": "sample_function", "arguments": "{\"param1\": 1}"}}
                ]},
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            extract_tool_arguments(parsed).unwrap(),
            "{\"param1\": 1}"
        );
    }
}
