use std::time::Instant;

use serde::{Deserialize, Serialize};

use orate_analysis::SpeechReport;

use crate::{FeedbackError, Result};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat:free";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Chat-completion client for speech feedback.
#[derive(Debug, Clone)]
pub struct FeedbackClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone)]
pub struct FeedbackClientBuilder {
    api_key: String,
    base_url: String,
    model: String,
}

impl FeedbackClient {
    pub fn builder(api_key: impl Into<String>) -> FeedbackClientBuilder {
        FeedbackClientBuilder {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Ask the model for coaching recommendations over the transcript and
    /// its metrics, answered in the given language.
    pub async fn request_feedback(
        &self,
        transcript: &str,
        report: &SpeechReport,
        language: &str,
    ) -> Result<String> {
        let prompt = build_prompt(transcript, report, language);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let url = format!("{}/chat/completions", self.base_url);
        let started = Instant::now();

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(FeedbackError::Api(status, body));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| FeedbackError::MalformedResponse("no choices in reply".to_string()))?;

        tracing::info!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "received feedback"
        );
        Ok(content)
    }
}

impl FeedbackClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn build(self) -> Result<FeedbackClient> {
        if self.api_key.trim().is_empty() {
            return Err(FeedbackError::MissingApiKey);
        }
        Ok(FeedbackClient {
            http: reqwest::Client::new(),
            api_key: self.api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            model: self.model,
        })
    }
}

fn language_name(code: &str) -> &str {
    match code {
        "ru" => "Russian",
        "en" => "English",
        other => other,
    }
}

fn build_prompt(transcript: &str, report: &SpeechReport, language: &str) -> String {
    let fillers = report
        .filler_counts
        .iter()
        .map(|(phrase, count)| format!("{phrase} ({count})"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a language assistant helping to improve spoken delivery. \
         Analyze the data below and respond with recommendations in {language}.\n\n\
         Speech transcript:\n\"\"\"\n{transcript}\n\"\"\"\n\n\
         Speech metrics:\n\
         - Total words: {total}\n\
         - Unique words: {unique}\n\
         - Type-token ratio: {ttr:.2}\n\
         - Average sentence length: {avg:.2}\n\
         - Filler words: {filler_total}\n\
         - Fillers found: {fillers}\n\n\
         Formulate recommendations:\n\
         1. What should be removed or replaced?\n\
         2. How can the structure and style be improved?\n\
         3. How can the delivery become more confident and expressive?\n",
        language = language_name(language),
        transcript = transcript,
        total = report.metrics.total_words,
        unique = report.metrics.unique_words,
        ttr = report.metrics.type_token_ratio,
        avg = report.metrics.avg_sentence_length,
        filler_total = report.metrics.filler_total,
        fillers = fillers,
    )
}
