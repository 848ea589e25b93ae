pub mod chat;
pub mod playback;
pub mod segment;
pub mod session;
pub mod speech;

/// Transient progress indicators emitted by the turn controller while a
/// query is in flight.
///
/// This enum decouples the session's progress reporting from whatever
/// front-end renders it (CLI status line, web socket, TUI spinner). The
/// runtime subscribes to these over a channel and is free to ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A spoken recording is being turned into text.
    ProcessingAudio,
    /// The model is composing its reply.
    Thinking,
    /// Reply bullets are being converted to audio.
    Synthesizing,
}
