//! Contracts for the external speech capabilities. Concrete adapters live in
//! the service crate; the session logic only sees these traits.

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Outcome of a recognition attempt that reached the backend.
///
/// A tagged result instead of error-text-in-a-string, so callers never have
/// to detect failure by substring matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    /// Recognized speech.
    Text(String),
    /// The clip was decodable audio but contained no recognizable speech.
    NoSpeech,
}

#[async_trait]
#[cfg_attr(test, automock)]
pub trait Transcriber {
    /// Converts one recorded clip to text. `Err` means the recognition
    /// backend itself failed (network, service); the turn is aborted before
    /// any model call and the user may retry immediately.
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcript>;
}

#[async_trait]
#[cfg_attr(test, automock)]
pub trait Synthesizer {
    /// Converts one bullet of text into an encoded audio clip. A failure
    /// drops only this bullet's audio; it never aborts the other bullets or
    /// the turn.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}
