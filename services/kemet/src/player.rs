//! Clip playback through the default audio output device via `rodio`.

use anyhow::Result;
use async_trait::async_trait;
use kemet_core::playback::ClipPlayer;
use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;

/// Plays one MP3 clip at a time on the default output device, blocking a
/// worker thread until the clip ends so clips never overlap.
pub struct RodioPlayer;

#[async_trait]
impl ClipPlayer for RodioPlayer {
    async fn play(&self, clip: &[u8]) -> Result<()> {
        let clip = clip.to_vec();
        // rodio's stream handle is !Send, so the device is opened inside the
        // blocking task rather than held across awaits.
        tokio::task::spawn_blocking(move || -> Result<()> {
            let (_stream, handle) = OutputStream::try_default()?;
            let sink = Sink::try_new(&handle)?;
            let source = Decoder::new(Cursor::new(clip))?;
            sink.append(source);
            sink.sleep_until_end();
            Ok(())
        })
        .await??;
        Ok(())
    }
}
