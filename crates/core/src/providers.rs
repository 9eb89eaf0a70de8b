use crate::types::{FunctionRequest, GeneratedCode, DECODING_INSTRUCTION};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider response invalid: {0}")]
    InvalidResponse(String),
}

/// Code-generation service that turns a [`FunctionRequest`] into Java text.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(&self, req: FunctionRequest) -> Result<GeneratedCode, ProviderError>;
}

#[async_trait]
impl<T> CodeGenerator for Box<T>
where
    T: CodeGenerator + ?Sized,
{
    async fn generate(&self, req: FunctionRequest) -> Result<GeneratedCode, ProviderError> {
        (**self).generate(req).await
    }
}

/// Sampling parameters shared by the HTTP providers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_tokens: 512,
        }
    }
}

#[cfg(feature = "provider-gemini")]
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub sampling: Sampling,
    client: Client,
}

#[cfg(feature = "provider-gemini")]
impl GeminiProvider {
    pub const DEFAULT_ENDPOINT: &'static str =
        "https://generativelanguage.googleapis.com/v1beta/models";

    pub fn new(endpoint: String, api_key: Option<String>, model: String, sampling: Sampling) -> Self {
        Self {
            endpoint,
            api_key,
            model,
            sampling,
            client: Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[cfg(feature = "provider-gemini")]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[cfg(feature = "provider-gemini")]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Value,
    generation_config: GeminiGenerationConfig,
}

#[cfg(feature = "provider-gemini")]
#[async_trait]
impl CodeGenerator for GeminiProvider {
    async fn generate(&self, req: FunctionRequest) -> Result<GeneratedCode, ProviderError> {
        let payload = GeminiRequest {
            contents: json!([{ "role": "user", "parts": [{ "text": req.prompt() }] }]),
            generation_config: GeminiGenerationConfig {
                temperature: self.sampling.temperature,
                top_p: self.sampling.top_p,
                top_k: self.sampling.top_k,
                max_output_tokens: self.sampling.max_tokens,
                response_mime_type: "text/plain",
            },
        };

        let mut request = self.client.post(self.url()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let value = send_json(request).await?;
        let parts = value
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProviderError::InvalidResponse(
                    "missing candidates[0].content.parts in Gemini response".to_string(),
                )
            })?;
        let code: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();
        let tokens = value
            .pointer("/usageMetadata/candidatesTokenCount")
            .and_then(Value::as_u64)
            .map(|v| v as u32);

        finish(code, tokens)
    }
}

#[cfg(feature = "provider-openai-compat")]
#[derive(Debug, Clone)]
pub struct OpenAICompatProvider {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub sampling: Sampling,
    client: Client,
}

#[cfg(feature = "provider-openai-compat")]
impl OpenAICompatProvider {
    pub fn new(endpoint: String, api_key: Option<String>, model: String, sampling: Sampling) -> Self {
        Self {
            endpoint,
            api_key,
            model,
            sampling,
            client: Client::new(),
        }
    }
}

#[cfg(feature = "provider-openai-compat")]
#[derive(Debug, Serialize)]
struct OpenAICompatMessage {
    role: String,
    content: String,
}

#[cfg(feature = "provider-openai-compat")]
#[derive(Debug, Serialize)]
struct OpenAICompatRequest {
    model: String,
    messages: Vec<OpenAICompatMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[cfg(feature = "provider-openai-compat")]
#[async_trait]
impl CodeGenerator for OpenAICompatProvider {
    async fn generate(&self, req: FunctionRequest) -> Result<GeneratedCode, ProviderError> {
        let payload = OpenAICompatRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAICompatMessage {
                    role: "system".to_string(),
                    content: format!("You write Java methods. {DECODING_INSTRUCTION}"),
                },
                OpenAICompatMessage {
                    role: "user".to_string(),
                    content: req.prompt(),
                },
            ],
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            max_tokens: self.sampling.max_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let value = send_json(request).await?;
        let content = value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::InvalidResponse(
                    "missing choices[0].message.content in OpenAI-compatible response".to_string(),
                )
            })?
            .to_string();
        let tokens = value
            .pointer("/usage/completion_tokens")
            .and_then(Value::as_u64)
            .map(|v| v as u32);

        finish(content, tokens)
    }
}

#[cfg(feature = "provider-ollama")]
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    pub endpoint: String,
    pub model: String,
    pub sampling: Sampling,
    client: Client,
}

#[cfg(feature = "provider-ollama")]
impl OllamaProvider {
    pub fn new(endpoint: String, model: String, sampling: Sampling) -> Self {
        Self {
            endpoint,
            model,
            sampling,
            client: Client::new(),
        }
    }
}

#[cfg(feature = "provider-ollama")]
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: Value,
}

#[cfg(feature = "provider-ollama")]
#[async_trait]
impl CodeGenerator for OllamaProvider {
    async fn generate(&self, req: FunctionRequest) -> Result<GeneratedCode, ProviderError> {
        let payload = OllamaRequest {
            model: self.model.clone(),
            prompt: req.prompt(),
            stream: false,
            options: json!({
                "temperature": self.sampling.temperature,
                "top_p": self.sampling.top_p,
                "top_k": self.sampling.top_k,
                "num_predict": self.sampling.max_tokens,
            }),
        };

        let request = self.client.post(&self.endpoint).json(&payload);
        let value = send_json(request).await?;

        let response = value
            .get("response")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::InvalidResponse(
                    "missing string field `response` in Ollama response".to_string(),
                )
            })?
            .to_string();
        let tokens = value
            .get("eval_count")
            .and_then(Value::as_u64)
            .map(|v| v as u32);

        finish(response, tokens)
    }
}

/// Offline generator producing a compilable placeholder body.
#[derive(Debug, Clone)]
pub struct MockProvider;

#[async_trait]
impl CodeGenerator for MockProvider {
    async fn generate(&self, req: FunctionRequest) -> Result<GeneratedCode, ProviderError> {
        let mut code = format!("// mock body for {}: {}", req.name, req.intent);
        if let Some(value) = default_return_value(&req.return_type) {
            code.push_str(&format!("\nreturn {value};"));
        }

        Ok(GeneratedCode {
            code,
            tokens: Some(0),
        })
    }
}

fn default_return_value(return_type: &str) -> Option<&'static str> {
    match return_type {
        "void" => None,
        "boolean" => Some("false"),
        "char" => Some("'\\0'"),
        "int" | "long" | "short" | "byte" => Some("0"),
        "double" | "float" => Some("0.0"),
        _ => Some("null"),
    }
}

fn finish(code: String, tokens: Option<u32>) -> Result<GeneratedCode, ProviderError> {
    if code.trim().is_empty() {
        return Err(ProviderError::InvalidResponse(
            "provider returned empty text".to_string(),
        ));
    }
    Ok(GeneratedCode { code, tokens })
}

async fn send_json(request: RequestBuilder) -> Result<Value, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Request(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Request(format!(
            "http status {} from provider",
            status
        )));
    }
    response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(return_type: &str) -> FunctionRequest {
        FunctionRequest {
            name: "f".to_string(),
            params: vec![],
            intent: "does a thing".to_string(),
            return_type: return_type.to_string(),
        }
    }

    #[tokio::test]
    async fn mock_returns_type_appropriate_value() {
        let out = MockProvider.generate(request("int")).await.unwrap();
        assert!(out.code.ends_with("return 0;"));
        let out = MockProvider.generate(request("void")).await.unwrap();
        assert!(!out.code.contains("return"));
        let out = MockProvider.generate(request("int[]")).await.unwrap();
        assert!(out.code.ends_with("return null;"));
    }

    #[test]
    fn empty_text_is_invalid() {
        let err = finish("  \n".to_string(), None).expect_err("must reject");
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[cfg(feature = "provider-gemini")]
    #[test]
    fn gemini_url_joins_model() {
        let p = GeminiProvider::new(
            format!("{}/", GeminiProvider::DEFAULT_ENDPOINT),
            None,
            "gemini-1.5-flash".to_string(),
            Sampling::default(),
        );
        assert_eq!(
            p.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[cfg(feature = "provider-openai-compat")]
    #[tokio::test]
    async fn unreachable_endpoint_is_a_request_error() {
        let p = OpenAICompatProvider::new(
            "http://127.0.0.1:9/v1/chat/completions".to_string(),
            None,
            "m".to_string(),
            Sampling::default(),
        );
        let err = p.generate(request("void")).await.expect_err("nothing listens on port 9");
        assert!(matches!(err, ProviderError::Request(_)));
    }
}
