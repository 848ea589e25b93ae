//! Text-to-speech adapter for the Google Translate TTS endpoint, which
//! returns MP3 audio for short text fragments.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use kemet_core::speech::Synthesizer;
use reqwest::Client;

const TRANSLATE_TTS_URL: &str = "https://translate.google.com/translate_tts";

pub struct GttsSynthesizer {
    client: Client,
    lang: String,
}

impl GttsSynthesizer {
    pub fn new(lang: String) -> Self {
        Self {
            client: Client::new(),
            lang,
        }
    }
}

#[async_trait]
impl Synthesizer for GttsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let textlen = text.chars().count().to_string();
        let resp = self
            .client
            .get(TRANSLATE_TTS_URL)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.lang.as_str()),
                ("q", text),
                ("total", "1"),
                ("idx", "0"),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await
            .context("Failed to reach the synthesis service")?
            .error_for_status()
            .context("Synthesis service returned an error status")?;

        let audio = resp
            .bytes()
            .await
            .context("Failed to read the synthesized audio")?;
        if audio.is_empty() {
            bail!("Synthesis service returned an empty clip");
        }
        Ok(audio.to_vec())
    }
}
