//! The conversation-side contract with the language model, plus the concrete
//! Gemini client.

use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;

const GENERATE_CONTENT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Fixed system instruction: Modern Standard Arabic, 3-5 complete-sentence
/// bullet points, each prefixed with a bullet marker, no greeting preamble.
pub const SYSTEM_INSTRUCTION: &str = "\
أنت مساعد ذكي متخصص في التاريخ المصري والشخصيات التاريخية المصرية.

قواعد مهمة جداً:
1. استخدم اللغة العربية الفصحى في جميع إجاباتك
2. اكتب إجابتك على شكل نقاط منفصلة، كل نقطة في سطر جديد
3. كل نقطة يجب أن تكون جملة كاملة ومفيدة (جملة أو جملتين)
4. اكتب من 3 إلى 5 نقاط فقط
5. لا تكتب ترحيب في البداية - ابدأ مباشرة بالمعلومات
6. ابدأ كل نقطة بـ \"•\" أو \"-\"";

// The `ChatModel` trait is the seam between the turn controller and the
// hosted model. `ChatSession` is generic over it, so unit tests drive the
// whole turn pipeline with a `mockall` mock instead of live network calls.
//
// A failed call surfaces as `Err`, never as reply text: the caller turns it
// into an error banner and must not feed it into segmentation, synthesis,
// or the conversation log.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait ChatModel {
    /// Sends one user prompt and returns the model's reply text. Earlier
    /// exchanges in the same conversation are carried as context.
    async fn send(&mut self, prompt: &str) -> Result<String>;

    /// Drops the accumulated history, starting a fresh conversation.
    fn reset(&mut self);
}

/// Sampling and output limits for the model, constructed once at startup and
/// passed to the client. Not user-adjustable at runtime.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.7,
            top_p: 1.0,
            top_k: 1,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

/// Stateful client for the Gemini `generateContent` endpoint.
///
/// The endpoint itself is stateless, so the conversation history is kept
/// client-side and resent with every request. History only grows on a
/// successful exchange: a failed call leaves it untouched, keeping the turn
/// retryable.
pub struct GeminiChat {
    client: Client,
    api_key: String,
    config: ChatConfig,
    history: Vec<serde_json::Value>,
}

impl GeminiChat {
    pub fn new(api_key: String, config: ChatConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            config,
            history: Vec::new(),
        }
    }

    fn safety_settings() -> Vec<serde_json::Value> {
        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ]
        .iter()
        .map(|category| {
            serde_json::json!({
                "category": category,
                "threshold": "BLOCK_MEDIUM_AND_ABOVE",
            })
        })
        .collect()
    }

    fn turn(role: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "role": role,
            "parts": [{ "text": text }],
        })
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn send(&mut self, prompt: &str) -> Result<String> {
        let mut contents = self.history.clone();
        contents.push(Self::turn("user", prompt));

        let body = serde_json::json!({
            "system_instruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": contents,
            "generationConfig": {
                "temperature": self.config.temperature,
                "topP": self.config.top_p,
                "topK": self.config.top_k,
                "maxOutputTokens": self.config.max_output_tokens,
            },
            "safetySettings": Self::safety_settings(),
        });

        let url = format!("{GENERATE_CONTENT_BASE}/{}:generateContent", self.config.model);
        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("Failed to reach the Gemini API")?
            .error_for_status()
            .context("Gemini API returned an error status")?
            .json::<GenerateResponse>()
            .await
            .context("Failed to decode the Gemini API response")?;

        let reply = resp
            .candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Gemini returned no candidates"))?;

        self.history.push(Self::turn("user", prompt));
        self.history.push(Self::turn("model", &reply));

        Ok(reply)
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_generate_content_response() {
        let raw = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [{ "text": "• نقطة أولى" }, { "text": "\n• نقطة ثانية" }],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                }
            ],
            "usageMetadata": { "promptTokenCount": 12 }
        }"#;
        let resp: GenerateResponse = serde_json::from_str(raw).unwrap();
        let text: String = resp.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, "• نقطة أولى\n• نقطة ثانية");
    }

    // Live integration test against the Gemini API. Ignored by default so
    // `cargo test` runs without an API key; run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn live_send_returns_bulleted_reply() {
        dotenvy::dotenv_override().ok();
        let api_key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY not set");
        let mut chat = GeminiChat::new(api_key, ChatConfig::default());

        let reply = chat.send("من هو توت عنخ آمون؟").await.expect("send failed");
        assert!(!reply.is_empty());
        // A second call should carry the first exchange as context.
        assert_eq!(chat.history.len(), 2);
    }
}
