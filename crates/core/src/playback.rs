//! Sequential playback of an ordered clip sequence: clips play back-to-back,
//! a clip that fails is skipped rather than halting the sequence.

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Encoded audio payload for one bullet.
pub type AudioClip = Vec<u8>;

#[async_trait]
#[cfg_attr(test, automock)]
pub trait ClipPlayer {
    /// Plays a single clip to completion. An error means this clip could not
    /// be decoded or rendered; the sequence advances without it.
    async fn play(&self, clip: &[u8]) -> Result<()>;
}

/// A self-contained description of one playback run: the clips, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    clips: Vec<AudioClip>,
}

/// Terminal accounting for one playback run. `advanced()` equals the
/// playlist length in all cases: every clip either played or was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackReport {
    pub played: usize,
    pub skipped: usize,
}

impl PlaybackReport {
    pub fn advanced(&self) -> usize {
        self.played + self.skipped
    }
}

impl Playlist {
    /// Builds a playback description from ordered clips. An empty sequence
    /// produces nothing to play. No cap is imposed here; the turn controller
    /// already limits how many clips reach assembly.
    pub fn assemble(clips: Vec<AudioClip>) -> Option<Self> {
        if clips.is_empty() { None } else { Some(Self { clips }) }
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Plays every clip strictly in order. A clip that errors is skipped,
    /// not retried, and playback continues with the next one.
    pub async fn play<P: ClipPlayer>(&self, player: &P) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        for (index, clip) in self.clips.iter().enumerate() {
            match player.play(clip).await {
                Ok(()) => report.played += 1,
                Err(e) => {
                    tracing::warn!("Skipping clip {} of {}: {e:#}", index + 1, self.clips.len());
                    report.skipped += 1;
                }
            }
        }
        report
    }
}
