//! Natural-language answers about the fleet.
//!
//! Questions go to an OpenAI-compatible chat-completions endpoint when an API
//! key is configured. Without one, or when the call fails in a way that has
//! no user-facing explanation, a keyword-matched canned answer is returned.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const PLACEHOLDER_KEY: &str = "sk-placeholder-key";
const SYSTEM_PROMPT: &str = "You are a helpful fleet management assistant.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct FleetAssistant {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl FleetAssistant {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty() && k != PLACEHOLDER_KEY);
        match &api_key {
            Some(_) => tracing::info!("OpenAI API key configured"),
            None => tracing::warn!("OPENAI_API_KEY not configured; chat will use fallback responses"),
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        let base_url: String = base_url.into();
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn ask(&self, question: &str, fleet_context: &str) -> String {
        let Some(key) = &self.api_key else {
            return fallback_response(question);
        };

        match self.complete(key, question, fleet_context).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("OpenAI error: {}", e);
                explain_failure(&e).unwrap_or_else(|| fallback_response(question))
            }
        }
    }

    async fn complete(&self, key: &str, question: &str, fleet_context: &str) -> anyhow::Result<String> {
        let prompt = format!(
            "You are an AI assistant for a fleet management system.\n\n\
             Current Fleet Context:\n{}\n\n\
             User Question: {}\n\n\
             Answer concisely and professionally.",
            fleet_context, question
        );
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            max_tokens: 150,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} {}", status.as_u16(), text);
        }

        let parsed: ChatResponse = resp.json().await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("response had no choices"))?;
        Ok(answer)
    }
}

/// User-facing message for failures the operator can act on.
fn explain_failure(err: &anyhow::Error) -> Option<String> {
    let msg = err.to_string().to_lowercase();
    if msg.contains("insufficient_quota") || msg.contains("429") {
        Some("[QUOTA EXCEEDED] Your OpenAI API quota has been exceeded. Please check your billing settings.".into())
    } else if msg.contains("invalid_api_key") || msg.contains("401") {
        Some("[INVALID API KEY] The OpenAI API key is invalid. Please check your .env file.".into())
    } else if msg.contains("rate_limit") {
        Some("[RATE LIMIT] Too many requests. Please try again in a moment.".into())
    } else {
        None
    }
}

pub fn fallback_response(question: &str) -> String {
    let q = question.to_lowercase();
    let canned = if q.contains("service") || q.contains("maintenance") {
        "Based on the current fleet data, vehicles VEH-002 and VEH-005 are due for maintenance. VEH-002 requires an oil change, and VEH-005 needs a tire rotation."
    } else if q.contains("fuel") {
        "Currently, VEH-002 has low fuel at 18%. It's recommended to refuel soon to avoid service interruptions."
    } else if q.contains("temperature") || q.contains("temp") {
        "VEH-006 and VEH-009 are showing elevated engine temperatures (98°C and 102°C respectively). Monitor these vehicles closely."
    } else if q.contains("status") || q.contains("active") {
        "Your fleet currently has 7 active vehicles, 2 idle vehicles, and 1 vehicle in maintenance."
    } else if q.contains("alert") {
        "There are currently 5 active alerts: 1 low fuel warning, 2 high temperature alerts, and 2 maintenance reminders."
    } else {
        return format!(
            "I'm currently running in demo mode. To get AI-powered responses, please configure your OpenAI API key in the .env file. Your question was: '{}'",
            question
        );
    };
    canned.to_string()
}
