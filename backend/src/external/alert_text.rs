//! Chat-completions client that writes alert text
//!
//! Any OpenAI-compatible endpoint works. The reply is free text and is split
//! into the four alert sections by [`parse_alert_text`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{AlertCandidate, AlertContent};
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::services::alerts::AlertFormatter;

const SYSTEM_PROMPT: &str = "You are a professional meteorologist and emergency management expert. \
Generate clear, accurate weather alerts.";

const DEFAULT_TITLE: &str = "Weather Alert";
const DEFAULT_INSTRUCTIONS: &str = "Follow local emergency guidelines.";
const DEFAULT_DURATION: &str = "Monitor conditions closely.";

/// OpenAI-compatible alert formatter
#[derive(Clone)]
pub struct OpenAiAlertFormatter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiAlertFormatter {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Alert text HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn prompt(candidate: &AlertCandidate) -> String {
        format!(
            "Generate a weather alert based on the following data:\n\n\
             Alert Type: {}\n\
             Severity: {}\n\
             Location: {}\n\
             Risk Level: {:.2}\n\n\
             Please generate:\n\
             1. A clear, concise title for the alert\n\
             2. A detailed description of the weather threat\n\
             3. Specific safety instructions for the public\n\
             4. Estimated duration and timeline\n\n\
             Keep the language clear, urgent but not panic-inducing, and actionable.",
            candidate.hazard,
            candidate.severity.title(),
            candidate.location,
            candidate.risk_value,
        )
    }
}

#[async_trait]
impl AlertFormatter for OpenAiAlertFormatter {
    async fn format(&self, candidate: &AlertCandidate) -> AppResult<AlertContent> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::prompt(candidate),
                },
            ],
            max_tokens: 500,
            temperature: 0.3,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Formatter(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Formatter(format!("API error: {} - {}", status, body)));
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Formatter(format!("Failed to parse response: {}", e)))?;

        let text = data
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Formatter("Empty completion".to_string()))?;

        Ok(parse_alert_text(&text))
    }
}

/// Split a free-text reply into alert sections.
///
/// The first line, or any line mentioning a title, is the title. Lines are
/// otherwise routed by keyword. Sections never found keep their defaults; the
/// description defaults to the whole reply.
pub fn parse_alert_text(text: &str) -> AlertContent {
    let text = text.trim();
    let mut content = AlertContent {
        title: DEFAULT_TITLE.to_string(),
        description: text.to_string(),
        instructions: DEFAULT_INSTRUCTIONS.to_string(),
        duration: DEFAULT_DURATION.to_string(),
    };

    for (index, line) in text.lines().map(str::trim).filter(|l| !l.is_empty()).enumerate() {
        let lower = line.to_lowercase();
        let value = clean_line(line);
        if value.is_empty() {
            continue;
        }

        if index == 0 || lower.contains("title") {
            content.title = value;
        } else if lower.contains("description") || lower.contains("threat") {
            content.description = value;
        } else if lower.contains("instruction") || lower.contains("safety") {
            content.instructions = value;
        } else if lower.contains("duration") || lower.contains("timeline") {
            content.duration = value;
        }
    }

    content
}

/// Strip list numbering, markdown emphasis and a leading "Label:" prefix
fn clean_line(line: &str) -> String {
    let mut rest = line.trim_start_matches(|c: char| c == '#' || c == '-' || c.is_whitespace());

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && rest[digits..].starts_with(&['.', ')'][..]) {
        rest = &rest[digits + 1..];
    }

    let rest = rest.trim().trim_matches('*').trim();
    let rest = match rest.split_once(':') {
        Some((label, value)) if is_label(label) => value,
        _ => rest,
    };

    rest.trim().trim_matches('*').trim().to_string()
}

fn is_label(label: &str) -> bool {
    let label = label.trim().trim_matches('*').trim();
    !label.is_empty() && label.split_whitespace().count() <= 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labelled_reply() {
        let reply = "Title: Flash Flood Warning for Houston\n\
                     Description: Torrential rain is flooding low-lying streets.\n\
                     Safety Instructions: Move to higher ground now.\n\
                     Duration: Through Tuesday morning.";
        let content = parse_alert_text(reply);

        assert_eq!(content.title, "Flash Flood Warning for Houston");
        assert_eq!(content.description, "Torrential rain is flooding low-lying streets.");
        assert_eq!(content.instructions, "Move to higher ground now.");
        assert_eq!(content.duration, "Through Tuesday morning.");
    }

    #[test]
    fn test_parse_numbered_markdown_reply() {
        let reply = "1. **Title:** Severe Storm Alert\n\
                     2. **Description of the threat:** Winds above 90 km/h.\n\
                     3. **Safety instructions:** Stay indoors.\n\
                     4. **Timeline:** Next 6 hours.";
        let content = parse_alert_text(reply);

        assert_eq!(content.title, "Severe Storm Alert");
        assert_eq!(content.description, "Winds above 90 km/h.");
        assert_eq!(content.instructions, "Stay indoors.");
        assert_eq!(content.duration, "Next 6 hours.");
    }

    #[test]
    fn test_parse_unstructured_reply_keeps_defaults() {
        let reply = "Heat Advisory\nTemperatures will stay above 40C through the weekend.";
        let content = parse_alert_text(reply);

        assert_eq!(content.title, "Heat Advisory");
        assert_eq!(content.description, reply);
        assert_eq!(content.instructions, DEFAULT_INSTRUCTIONS);
        assert_eq!(content.duration, DEFAULT_DURATION);
        assert!(content.is_usable());
    }

    #[test]
    fn test_clean_line_keeps_sentences_with_colons() {
        assert_eq!(
            clean_line("Residents should note the following: roads are closed"),
            "Residents should note the following: roads are closed"
        );
        assert_eq!(clean_line("## Title: Drought Watch"), "Drought Watch");
    }
}
