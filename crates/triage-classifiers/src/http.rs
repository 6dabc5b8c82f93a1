//! HTTP client for an OpenAI-compatible classification service
//!
//! Sends the issue (and optional customer fields) as a chat completion with
//! a strict JSON schema so the model can only answer
//! `{"priority": "Low" | "Medium" | "High", "reason": "..."}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use triage_core::{ClassificationRequest, Priority, Result};

use crate::classifier::{looks_rate_limited, ExternalClassifier, ServiceError, ServiceVerdict};
use crate::config::ServiceConfig;

const SYSTEM_PROMPT: &str = "You triage customer support tickets for an online store. \
Decide the ticket priority. High: safety or security issues, failed or duplicate payments, \
chargebacks, stolen or undelivered orders, damaged products, explicit urgency, or customers \
unable to access their account. Medium: wrong items, delays, warranty, replacement or exchange \
requests, invoicing. Low: everything else. Reply with JSON only.";

/// Longest slice of an error body kept in messages
const MAX_ERROR_BODY: usize = 300;

/// Chat completion classifier
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpClassifier {
    /// Create a client from service configuration and an API key
    pub fn new(config: &ServiceConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| {
                triage_core::Error::classifier(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl ExternalClassifier for HttpClassifier {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> std::result::Result<ServiceVerdict, ServiceError> {
        let body = build_request_body(&self.model, request);

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::other("request timed out")
                } else {
                    ServiceError::other(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::other(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &text));
        }

        debug!(status = status.as_u16(), bytes = text.len(), "Classification service responded");
        parse_completion(&text)
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Build the chat completion request body
pub fn build_request_body(model: &str, request: &ClassificationRequest) -> serde_json::Value {
    let priorities: Vec<&str> = Priority::ALL.iter().map(|p| p.as_str()).collect();

    let messages = vec![
        ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: "user",
            content: user_prompt(request),
        },
    ];

    json!({
        "model": model,
        "temperature": 0,
        "messages": messages,
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "ticket_priority",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {
                        "priority": { "type": "string", "enum": priorities },
                        "reason": { "type": "string" }
                    },
                    "required": ["priority", "reason"],
                    "additionalProperties": false
                }
            }
        }
    })
}

fn user_prompt(request: &ClassificationRequest) -> String {
    let mut prompt = format!("Issue:\n{}", request.issue_text.trim());

    if let Some(customer) = &request.customer {
        if let Some(name) = customer.name.as_deref().filter(|n| !n.is_empty()) {
            prompt.push_str(&format!("\nCustomer name: {}", name));
        }
        if let Some(email) = customer.email.as_deref().filter(|e| !e.is_empty()) {
            prompt.push_str(&format!("\nCustomer email: {}", email));
        }
    }

    prompt
}

/// Map a non-success status and body to a service error
pub fn classify_status(status: u16, body: &str) -> ServiceError {
    let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
    let message = format!("HTTP {}: {}", status, snippet.trim());

    if status == 429 || looks_rate_limited(&snippet) {
        ServiceError::rate_limited(message)
    } else {
        ServiceError::other(message)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Extract and validate the decision from a chat completion body
pub fn parse_completion(body: &str) -> std::result::Result<ServiceVerdict, ServiceError> {
    let completion: ChatCompletion = serde_json::from_str(body).map_err(|e| {
        ServiceError::invalid_response(format!("malformed completion: {}", e), None)
    })?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ServiceError::invalid_response("completion has no content", None))?;

    ServiceVerdict::from_json(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::CustomerSnapshot;

    fn completion(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }

    #[test]
    fn test_request_body_schema() {
        let request = ClassificationRequest::new("  package never arrived  ");
        let body = build_request_body("gpt-4o-mini", &request);

        assert_eq!(body["model"], "gpt-4o-mini");
        let schema = &body["response_format"]["json_schema"]["schema"];
        assert_eq!(schema["properties"]["priority"]["enum"], json!(["Low", "Medium", "High"]));
        assert_eq!(schema["required"], json!(["priority", "reason"]));

        let user = body["messages"][1]["content"].as_str().unwrap();
        assert_eq!(user, "Issue:\npackage never arrived");
    }

    #[test]
    fn test_request_body_customer_fields() {
        let request = ClassificationRequest::new("wrong size")
            .with_customer(CustomerSnapshot::new("Grace", "grace@example.com"));
        let body = build_request_body("m", &request);
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("Customer name: Grace"));
        assert!(user.contains("Customer email: grace@example.com"));

        let request = ClassificationRequest::new("wrong size").with_customer(CustomerSnapshot {
            name: Some(String::new()),
            email: None,
        });
        let body = build_request_body("m", &request);
        assert!(!body["messages"][1]["content"].as_str().unwrap().contains("Customer"));
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(429, "slow down"),
            ServiceError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status(403, r#"{"error":{"message":"You exceeded your current quota"}}"#),
            ServiceError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status(500, "internal error"),
            ServiceError::Other { .. }
        ));
        assert!(matches!(
            classify_status(401, "invalid api key"),
            ServiceError::Other { .. }
        ));
    }

    #[test]
    fn test_parse_completion() {
        let verdict =
            parse_completion(&completion(r#"{"priority":"High","reason":"duplicate charge"}"#))
                .unwrap();
        assert_eq!(verdict, ServiceVerdict::new(Priority::High, "duplicate charge"));
    }

    #[test]
    fn test_parse_completion_invalid() {
        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.kind(), "invalid_response");

        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert_eq!(err.kind(), "invalid_response");

        let err = parse_completion(&completion(r#"{"priority":"Urgent","reason":"very upset"}"#))
            .unwrap_err();
        assert_eq!(err.partial_reason(), Some("very upset"));
    }

    #[test]
    fn test_completions_url() {
        let config = ServiceConfig {
            endpoint: "https://llm.internal/v1/".to_string(),
            ..ServiceConfig::default()
        };
        let classifier = HttpClassifier::new(&config, "key").unwrap();
        assert_eq!(classifier.completions_url(), "https://llm.internal/v1/chat/completions");
    }
}
