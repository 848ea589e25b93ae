//! The conversation session and the turn controller state machine.

use crate::Status;
use crate::chat::ChatModel;
use crate::segment::{MAX_BULLETS, segment};
use crate::speech::Synthesizer;
use futures::future::join_all;
use tokio::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the conversation log. Entries are append-only and always
/// added in (user, assistant) pairs.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySource {
    Typed,
    Spoken,
}

/// The single in-flight user input awaiting processing.
#[derive(Debug, Clone)]
pub struct PendingQuery {
    pub text: String,
    pub source: QuerySource,
}

/// Result of one completed turn.
#[derive(Debug)]
pub enum TurnReply {
    Answered {
        /// Bullets re-joined with blank lines, each prefixed with `• `.
        display: String,
        /// Audio clips in bullet order; bullets whose synthesis failed are
        /// absent. May be empty even when `display` is not.
        clips: Vec<Vec<u8>>,
        /// True when the reply yielded more than [`MAX_BULLETS`] bullets and
        /// the surplus was discarded.
        capped: bool,
    },
    /// The model call failed. Surfaced as a banner only: nothing is logged,
    /// segmented, or synthesized, and the same input may be resubmitted.
    Failed(String),
}

/// Owns one conversation: the model client, the append-only log, the single
/// pending-query slot, and the duplicate-submission guards.
///
/// State is scoped per session and passed by reference into the runtime, so
/// concurrent sessions cannot corrupt each other.
pub struct ChatSession<C: ChatModel> {
    chat: C,
    log: Vec<Turn>,
    state: TurnState,
    pending: Option<PendingQuery>,
    last_text: String,
    last_audio_len: usize,
}

impl<C: ChatModel> ChatSession<C> {
    pub fn new(chat: C) -> Self {
        Self {
            chat,
            log: Vec::new(),
            state: TurnState::Idle,
            pending: None,
            last_text: String::new(),
            last_audio_len: 0,
        }
    }

    pub fn log(&self) -> &[Turn] {
        &self.log
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Accepts typed input unless the session is busy, the input is empty,
    /// or it repeats the immediately preceding typed submission.
    pub fn submit_text(&mut self, text: &str) -> bool {
        let text = text.trim();
        if !self.accepts_input() || text.is_empty() || text == self.last_text {
            return false;
        }
        self.last_text = text.to_string();
        self.pending = Some(PendingQuery {
            text: text.to_string(),
            source: QuerySource::Typed,
        });
        true
    }

    /// Recording gate, checked before transcription is attempted: rejects
    /// empty recordings and ones with the same byte length as the previous
    /// submission.
    pub fn accepts_recording(&self, audio_len: usize) -> bool {
        self.accepts_input() && audio_len > 0 && audio_len != self.last_audio_len
    }

    /// Records the length of a recording that passed [`Self::accepts_recording`],
    /// so re-submitting the identical clip is a no-op even if transcription
    /// later fails.
    pub fn note_recording(&mut self, audio_len: usize) {
        self.last_audio_len = audio_len;
    }

    /// Queues a successfully transcribed recording for processing.
    pub fn submit_spoken(&mut self, transcript: &str) -> bool {
        let transcript = transcript.trim();
        if !self.accepts_input() || transcript.is_empty() {
            return false;
        }
        self.pending = Some(PendingQuery {
            text: transcript.to_string(),
            source: QuerySource::Spoken,
        });
        true
    }

    fn accepts_input(&self) -> bool {
        self.state == TurnState::Idle && self.pending.is_none()
    }

    /// Runs the turn transition for the pending query, if any:
    /// model call, segmentation (capped at [`MAX_BULLETS`]), per-bullet
    /// synthesis, then an atomic (user, assistant) log append.
    ///
    /// The pending slot and processing flag are cleared on every exit path,
    /// including model failure; the only artifact of a failed turn is the
    /// returned `Failed` banner text.
    pub async fn process_pending<S: Synthesizer>(
        &mut self,
        synthesizer: &S,
        status_tx: &Sender<Status>,
    ) -> Option<TurnReply> {
        let query = self.pending.take()?;
        self.state = TurnState::Processing;
        let reply = self.run_turn(&query, synthesizer, status_tx).await;
        self.state = TurnState::Idle;
        Some(reply)
    }

    async fn run_turn<S: Synthesizer>(
        &mut self,
        query: &PendingQuery,
        synthesizer: &S,
        status_tx: &Sender<Status>,
    ) -> TurnReply {
        if query.source == QuerySource::Spoken {
            let _ = status_tx.send(Status::ProcessingAudio).await;
        }
        let _ = status_tx.send(Status::Thinking).await;

        let reply = match self.chat.send(&query.text).await {
            Ok(text) => text,
            Err(e) => {
                // Leave the input eligible for resubmission.
                self.last_text.clear();
                return TurnReply::Failed(format!("{e:#}"));
            }
        };

        let mut bullets = segment(&reply);
        let capped = bullets.len() > MAX_BULLETS;
        bullets.truncate(MAX_BULLETS);

        let _ = status_tx.send(Status::Synthesizing).await;
        let clips = synthesize_all(synthesizer, &bullets).await;

        let display = bullets
            .iter()
            .map(|bullet| format!("• {bullet}"))
            .collect::<Vec<_>>()
            .join("\n\n");

        self.log.push(Turn {
            role: Role::User,
            content: query.text.clone(),
        });
        self.log.push(Turn {
            role: Role::Assistant,
            content: display.clone(),
        });

        TurnReply::Answered {
            display,
            clips,
            capped,
        }
    }

    /// Reset-topic: abandon any queued input and accept a fresh question.
    /// The conversation log is retained.
    pub fn reset_topic(&mut self) {
        self.pending = None;
        self.state = TurnState::Idle;
    }

    /// Clear-conversation: empties the log, starts a fresh model history,
    /// and drops all pending and duplicate-guard state.
    pub fn clear(&mut self) {
        self.chat.reset();
        self.log.clear();
        self.pending = None;
        self.state = TurnState::Idle;
        self.last_text.clear();
        self.last_audio_len = 0;
    }
}

/// Synthesizes all bullets concurrently, preserving bullet order in the
/// result. Failed bullets are logged and omitted.
async fn synthesize_all<S: Synthesizer>(synthesizer: &S, bullets: &[String]) -> Vec<Vec<u8>> {
    let clips = join_all(bullets.iter().map(|bullet| synthesizer.synthesize(bullet))).await;
    clips
        .into_iter()
        .zip(bullets)
        .filter_map(|(result, bullet)| match result {
            Ok(clip) => Some(clip),
            Err(e) => {
                tracing::warn!("Dropping audio for bullet \"{bullet}\": {e:#}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MockChatModel;
    use crate::speech::MockSynthesizer;

    fn status_channel() -> (Sender<Status>, tokio::sync::mpsc::Receiver<Status>) {
        tokio::sync::mpsc::channel(16)
    }

    fn silent_synthesizer() -> MockSynthesizer {
        let mut synth = MockSynthesizer::new();
        synth
            .expect_synthesize()
            .returning(|_| Box::pin(async { Ok(vec![0u8; 4]) }));
        synth
    }

    #[tokio::test]
    async fn answered_turn_appends_user_assistant_pair() {
        let mut chat = MockChatModel::new();
        chat.expect_send().returning(|_| {
            Box::pin(async { Ok("• حكم توت عنخ آمون مصر صغيراً\n• اكتشفت مقبرته عام 1922".to_string()) })
        });
        let mut session = ChatSession::new(chat);
        assert!(session.submit_text("من هو توت عنخ آمون؟"));

        let (tx, _rx) = status_channel();
        let reply = session
            .process_pending(&silent_synthesizer(), &tx)
            .await
            .expect("a pending query was queued");

        match reply {
            TurnReply::Answered { display, clips, capped } => {
                assert!(display.starts_with("• "));
                assert_eq!(clips.len(), 2);
                assert!(!capped);
            }
            TurnReply::Failed(detail) => panic!("unexpected failure: {detail}"),
        }
        assert_eq!(session.log().len(), 2);
        assert_eq!(session.log()[0].role, Role::User);
        assert_eq!(session.log()[1].role, Role::Assistant);
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn model_failure_leaves_log_untouched_and_retryable() {
        let mut chat = MockChatModel::new();
        chat.expect_send()
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("service unavailable")) }));
        let mut session = ChatSession::new(chat);
        assert!(session.submit_text("سؤال عن رمسيس الثاني"));

        let (tx, _rx) = status_channel();
        let synth = MockSynthesizer::new(); // must never be called
        let reply = session.process_pending(&synth, &tx).await.unwrap();

        assert!(matches!(reply, TurnReply::Failed(detail) if detail.contains("service unavailable")));
        assert!(session.log().is_empty(), "a failed turn must not be logged");
        assert_eq!(session.state(), TurnState::Idle);
        // The identical input may be retried after a failure.
        assert!(session.submit_text("سؤال عن رمسيس الثاني"));
    }

    #[tokio::test]
    async fn caps_bullets_at_ten_and_discards_surplus() {
        let reply_text = (1..=15)
            .map(|i| format!("• bullet number {i} qualifies"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut chat = MockChatModel::new();
        chat.expect_send()
            .returning(move |_| {
                let text = reply_text.clone();
                Box::pin(async move { Ok(text) })
            });

        let mut synth = MockSynthesizer::new();
        synth
            .expect_synthesize()
            .times(10)
            .returning(|_| Box::pin(async { Ok(vec![1u8]) }));

        let mut session = ChatSession::new(chat);
        assert!(session.submit_text("question"));
        let (tx, _rx) = status_channel();
        let reply = session.process_pending(&synth, &tx).await.unwrap();

        match reply {
            TurnReply::Answered { display, clips, capped } => {
                assert!(capped);
                assert_eq!(clips.len(), 10);
                assert_eq!(display.matches("• ").count(), 10);
                assert!(!display.contains("bullet number 11"));
            }
            TurnReply::Failed(detail) => panic!("unexpected failure: {detail}"),
        }
    }

    #[tokio::test]
    async fn synthesis_failures_drop_audio_but_keep_text() {
        let mut chat = MockChatModel::new();
        chat.expect_send().returning(|_| {
            Box::pin(async { Ok("• first qualifying bullet\n• second qualifying bullet".to_string()) })
        });
        let mut synth = MockSynthesizer::new();
        synth
            .expect_synthesize()
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("tts down")) }));

        let mut session = ChatSession::new(chat);
        assert!(session.submit_text("question"));
        let (tx, _rx) = status_channel();
        let reply = session.process_pending(&synth, &tx).await.unwrap();

        match reply {
            TurnReply::Answered { display, clips, .. } => {
                assert!(clips.is_empty());
                assert!(display.contains("first qualifying bullet"));
            }
            TurnReply::Failed(detail) => panic!("unexpected failure: {detail}"),
        }
        // Text and audio availability are decoupled: the pair is still logged.
        assert_eq!(session.log().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_typed_submission_is_a_no_op() {
        let mut chat = MockChatModel::new();
        chat.expect_send()
            .times(1)
            .returning(|_| Box::pin(async { Ok("• a single qualifying bullet".to_string()) }));
        let mut session = ChatSession::new(chat);

        assert!(session.submit_text("نفس السؤال"));
        let (tx, _rx) = status_channel();
        session
            .process_pending(&silent_synthesizer(), &tx)
            .await
            .unwrap();

        assert!(!session.submit_text("نفس السؤال"));
        assert!(session.process_pending(&silent_synthesizer(), &tx).await.is_none());
        assert_eq!(session.log().len(), 2);
    }

    #[test]
    fn recording_gate_rejects_repeat_lengths_and_empty_clips() {
        let session = ChatSession::new(MockChatModel::new());
        assert!(!session.accepts_recording(0));
        assert!(session.accepts_recording(2048));

        let mut session = ChatSession::new(MockChatModel::new());
        session.note_recording(2048);
        assert!(!session.accepts_recording(2048));
        assert!(session.accepts_recording(4096));
    }

    #[test]
    fn only_one_pending_query_at_a_time() {
        let mut session = ChatSession::new(MockChatModel::new());
        assert!(session.submit_text("السؤال الأول هنا"));
        assert!(!session.submit_text("سؤال آخر مختلف"));
        assert!(!session.submit_spoken("نص منطوق"));
    }

    #[tokio::test]
    async fn clear_resets_log_session_and_guards() {
        let mut chat = MockChatModel::new();
        chat.expect_send()
            .returning(|_| Box::pin(async { Ok("• a single qualifying bullet".to_string()) }));
        chat.expect_reset().times(1).return_const(());

        let mut session = ChatSession::new(chat);
        assert!(session.submit_text("سؤال للمسح"));
        let (tx, _rx) = status_channel();
        session
            .process_pending(&silent_synthesizer(), &tx)
            .await
            .unwrap();
        session.note_recording(999);

        session.clear();

        assert!(session.log().is_empty());
        assert_eq!(session.state(), TurnState::Idle);
        // Duplicate guards are gone: the same text and length are accepted again.
        assert!(session.accepts_recording(999));
        assert!(session.submit_text("سؤال للمسح"));
    }

    #[tokio::test]
    async fn spoken_turns_emit_the_audio_indicator_first() {
        let mut chat = MockChatModel::new();
        chat.expect_send()
            .returning(|_| Box::pin(async { Ok("• a single qualifying bullet".to_string()) }));
        let mut session = ChatSession::new(chat);

        assert!(session.accepts_recording(128));
        session.note_recording(128);
        assert!(session.submit_spoken("سؤال منطوق عن الأهرامات"));

        let (tx, mut rx) = status_channel();
        session
            .process_pending(&silent_synthesizer(), &tx)
            .await
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), Status::ProcessingAudio);
        assert_eq!(rx.try_recv().unwrap(), Status::Thinking);
        assert_eq!(rx.try_recv().unwrap(), Status::Synthesizing);
    }
}
