//! Production `LlmOracle`: an OpenAI-compatible chat-completions client
//! (§4.7). Grounded on the original implementation's use of an
//! OpenAI-compatible base URL/API-key pair (`agent/my_llm.py`,
//! `PgoModel/chat_model.py`) and the teacher's `reqwest`-based HTTP clients
//! elsewhere in the workspace, generalized from REST-over-JSON service
//! calls to chat-completions calls.

use std::time::Duration;

use agentd_domain::capability::Capability;
use agentd_domain::config::LlmConfig;
use agentd_domain::error::{Error, Result};
use agentd_domain::message::{Message, Role, ToolCall, Usage};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::credential::resolve_api_key;
use crate::traits::{LlmOracle, StructuredRequest, StructuredResult};
use crate::usage::extract_usage;

pub struct HttpOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpOracle {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.auth)?;
        let timeout = Duration::from_secs(config.timeout_for(&config.default_model));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.default_model.clone(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn call(&self, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Provider { provider: "llm".to_string(), message: e.to_string() })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "llm".to_string(),
                message: format!("HTTP {status}: {text}"),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::Provider { provider: "llm".to_string(), message: format!("invalid JSON response: {e}") })
    }

    fn extract_message(&self, raw: &Value) -> Result<(String, Option<Vec<ToolCall>>)> {
        let choice = raw
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| Error::Provider { provider: "llm".to_string(), message: "response carried no choices".to_string() })?;
        let message = choice
            .get("message")
            .ok_or_else(|| Error::Provider { provider: "llm".to_string(), message: "choice carried no message".to_string() })?;
        let content = message.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
        let tool_calls = message.get("tool_calls").and_then(Value::as_array).map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let call_id = call.get("id")?.as_str()?.to_string();
                    let function = call.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let args_str = function.get("arguments").and_then(Value::as_str).unwrap_or("{}");
                    let args = serde_json::from_str(args_str).unwrap_or(json!({}));
                    Some(ToolCall { call_id, name, args })
                })
                .collect()
        });
        Ok((content, tool_calls))
    }
}

fn to_wire_message(msg: &Message) -> Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut wire = json!({"role": role, "content": msg.content});
    if let Some(tool_calls) = &msg.tool_calls {
        wire["tool_calls"] = json!(tool_calls
            .iter()
            .map(|call| json!({
                "id": call.call_id,
                "type": "function",
                "function": {"name": call.name, "arguments": call.args.to_string()},
            }))
            .collect::<Vec<_>>());
    }
    if let Some(tool_call_id) = &msg.tool_call_id {
        wire["tool_call_id"] = json!(tool_call_id);
    }
    wire
}

/// A permissive open-object schema; the registry's own tool arg schemas
/// govern real argument shape once a call reaches `ToolRegistry::invoke`.
fn tool_spec(capability: Capability) -> Option<Value> {
    let name = capability.tool_name()?;
    Some(json!({
        "type": "function",
        "function": {
            "name": name,
            "description": format!("Invoke the {name} capability."),
            "parameters": {"type": "object", "additionalProperties": true},
        },
    }))
}

#[async_trait]
impl LlmOracle for HttpOracle {
    async fn complete(&self, messages: &[Message]) -> Result<(Message, Usage)> {
        let body = json!({
            "model": self.model,
            "messages": messages.iter().map(to_wire_message).collect::<Vec<_>>(),
        });
        let raw = self.call(body).await?;
        let (content, tool_calls) = self.extract_message(&raw)?;
        let usage = raw.get("usage").map(extract_usage).unwrap_or_default();
        let message = match tool_calls {
            Some(calls) if !calls.is_empty() => Message::assistant_with_tool_calls(content, calls),
            _ => Message::assistant(content),
        };
        Ok((message, usage))
    }

    async fn complete_structured(&self, messages: &[Message], req: StructuredRequest<'_>) -> Result<StructuredResult> {
        let mut prompt: Vec<Message> = messages.to_vec();
        prompt.push(Message::system(format!(
            "Respond with a single JSON object only, matching this schema, no prose: {}",
            req.schema
        )));

        let mut attempt = 0;
        loop {
            let body = json!({
                "model": self.model,
                "messages": prompt.iter().map(to_wire_message).collect::<Vec<_>>(),
                "response_format": {"type": "json_object"},
            });
            let raw = self.call(body).await?;
            let (content, _) = self.extract_message(&raw)?;
            let raw_message = Message::assistant(content.clone());
            let usage = raw.get("usage").map(extract_usage).unwrap_or_default();

            match serde_json::from_str::<Value>(&content) {
                Ok(value) => return Ok(StructuredResult { value, raw_message, used_default: false, usage }),
                Err(_) if attempt < req.max_retries => {
                    attempt += 1;
                    tracing::warn!(label = req.label, attempt, "structured parse failed, retrying");
                    tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt))).await;
                }
                Err(_) => {
                    tracing::warn!(label = req.label, "structured parse failed after max retries, using default");
                    return Ok(StructuredResult { value: req.default_on_failure, raw_message, used_default: true, usage });
                }
            }
        }
    }

    async fn complete_with_tools(&self, messages: &[Message], allowed_capabilities: &[Capability]) -> Result<(Message, Usage)> {
        let tools: Vec<Value> = allowed_capabilities.iter().copied().filter_map(tool_spec).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(to_wire_message).collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        let raw = self.call(body).await?;
        let (content, tool_calls) = self.extract_message(&raw)?;
        let usage = raw.get("usage").map(extract_usage).unwrap_or_default();
        let message = match tool_calls {
            Some(calls) if !calls.is_empty() => Message::assistant_with_tool_calls(content, calls),
            _ => Message::assistant(content),
        };
        Ok((message, usage))
    }
}
