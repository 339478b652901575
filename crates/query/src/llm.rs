use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Language model that answers a user question under a system instruction.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, question: &str) -> Result<String>;
}

pub const DEFAULT_TEMPERATURE: f32 = 0.1;

#[derive(Clone)]
pub struct QueryLLM {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    system: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl QueryLLM {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            temperature: DEFAULT_TEMPERATURE,
            client: reqwest::Client::new(),
        }
    }
}

impl Default for QueryLLM {
    fn default() -> Self {
        Self::new(
            "http://localhost:11434".to_string(),
            "scb10x/llama3.1-typhoon2-8b-instruct:latest".to_string(),
        )
    }
}

#[async_trait]
impl Generator for QueryLLM {
    async fn generate(&self, system: &str, question: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            system: system.to_string(),
            prompt: question.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }
}

/// OpenRouter through its OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenRouterLLM {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenRouterLLM {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url,
            api_key,
            model,
            temperature: DEFAULT_TEMPERATURE,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Generator for OpenRouterLLM {
    async fn generate(&self, system: &str, question: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": question },
            ],
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to OpenRouter")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenRouter request failed: {} {}", status, error_text);
        }

        let resp: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse OpenRouter response")?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .context("OpenRouter response is missing choices[0].message.content")?;

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn local_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn openrouter(base_url: String) -> OpenRouterLLM {
        OpenRouterLLM {
            base_url: format!("{base_url}/"),
            api_key: "sk-or-test".to_string(),
            model: "google/gemini-2.0-flash-lite-001".to_string(),
            temperature: DEFAULT_TEMPERATURE,
            client: local_client(),
        }
    }

    #[tokio::test]
    async fn test_openrouter_reads_first_choice() {
        let app = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let authorized = headers
                    .get("authorization")
                    .is_some_and(|v| v == "Bearer sk-or-test");
                let temperature = body["temperature"].as_f64().unwrap_or_default();
                let well_formed = body["messages"][0]["role"] == "system"
                    && body["messages"][0]["content"] == "Answer from context."
                    && body["messages"][1]["role"] == "user"
                    && body["messages"][1]["content"] == "What is MFA?"
                    && (temperature - 0.1).abs() < 1e-6;

                if authorized && well_formed {
                    (
                        StatusCode::OK,
                        Json(json!({
                            "choices": [{ "message": { "role": "assistant", "content": "MFA adds a second factor." } }]
                        })),
                    )
                } else {
                    (StatusCode::BAD_REQUEST, Json(json!({ "error": "unexpected request" })))
                }
            }),
        );
        let llm = openrouter(serve(app).await);

        let answer = llm.generate("Answer from context.", "What is MFA?").await.unwrap();
        assert_eq!(answer, "MFA adds a second factor.");
    }

    #[tokio::test]
    async fn test_openrouter_without_content_is_an_error() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let llm = openrouter(serve(app).await);

        let err = llm.generate("system", "question").await.unwrap_err();
        assert!(err.to_string().contains("choices[0].message.content"));
    }

    #[tokio::test]
    async fn test_openrouter_auth_failure_keeps_body() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "No auth credentials found") }),
        );
        let llm = openrouter(serve(app).await);

        let err = llm.generate("system", "question").await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("No auth credentials found"));
    }

    #[tokio::test]
    async fn test_ollama_sends_system_and_temperature() {
        let app = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                let temperature = body["options"]["temperature"].as_f64().unwrap_or_default();
                let answer = if body["system"] == "Answer from context."
                    && body["prompt"] == "What is phishing?"
                    && body["stream"] == false
                    && (temperature - 0.1).abs() < 1e-6
                {
                    "Phishing is a social engineering attack."
                } else {
                    "unexpected request"
                };
                Json(json!({ "response": answer, "done": true }))
            }),
        );
        let llm = QueryLLM {
            base_url: serve(app).await,
            model: "typhoon".to_string(),
            temperature: DEFAULT_TEMPERATURE,
            client: local_client(),
        };

        let answer = llm.generate("Answer from context.", "What is phishing?").await.unwrap();
        assert_eq!(answer, "Phishing is a social engineering attack.");
    }
}
