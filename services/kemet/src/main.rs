mod config;
mod player;
mod transcribe;
mod tts;

use crate::config::Config;
use crate::player::RodioPlayer;
use crate::transcribe::GoogleTranscriber;
use crate::tts::GttsSynthesizer;
use anyhow::{Context, Result, bail};
use clap::Parser;
use kemet_core::Status;
use kemet_core::chat::{ChatConfig, ChatModel, GeminiChat};
use kemet_core::playback::Playlist;
use kemet_core::session::{ChatSession, Role, Turn, TurnReply};
use kemet_core::speech::{Transcriber, Transcript};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;

/// Voice-and-text assistant for Egyptian history questions, answered in
/// Modern Standard Arabic as short spoken bullet points.
#[derive(Parser)]
#[command(name = "kemet")]
struct Cli {
    /// Print replies without playing their audio.
    #[arg(long)]
    mute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 4. Initialize API Clients & Session ---
    let chat = GeminiChat::new(
        config.gemini_api_key.clone(),
        ChatConfig {
            model: config.chat_model.clone(),
            ..ChatConfig::default()
        },
    );
    let mut session = ChatSession::new(chat);
    let transcriber =
        GoogleTranscriber::new(config.speech_locale.clone(), config.speech_api_key.clone());
    let synthesizer = GttsSynthesizer::new(config.tts_lang.clone());
    let player = RodioPlayer;

    // Status indicators print from their own task so the turn pipeline never
    // waits on the terminal.
    let (status_tx, mut status_rx) = tokio::sync::mpsc::channel::<Status>(8);
    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            let line = match status {
                Status::ProcessingAudio => "⏳ processing audio...",
                Status::Thinking => "🤔 thinking...",
                Status::Synthesizing => "🎵 preparing the spoken reply...",
            };
            println!("{line}");
        }
    });

    println!("🏛️  kemet — اسأل عن التاريخ المصري والشخصيات التاريخية المصرية");
    println!("Type a question, or: /voice <flac-file>  /new  /clear  /log  /quit");

    // --- 5. Presentation Loop ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();

        match line.as_str() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                session.reset_topic();
                println!("🔄 Ready for a new topic. The conversation log is kept.");
            }
            "/clear" => {
                session.clear();
                println!("🗑️  Conversation cleared.");
            }
            "/log" => render_log(session.log()),
            _ if line.starts_with("/voice") => {
                let path = line.trim_start_matches("/voice").trim();
                if path.is_empty() {
                    eprintln!("Usage: /voice <path-to-flac-recording>");
                    continue;
                }
                // Transcription failures abort the turn before any model
                // call; the session stays ready for an immediate retry.
                if let Err(e) = submit_recording(&mut session, &transcriber, path).await {
                    eprintln!("❌ {e:#}");
                    continue;
                }
                run_turn(&mut session, &synthesizer, &player, &status_tx, args.mute).await;
            }
            _ if line.starts_with('/') => eprintln!("Unknown command: {line}"),
            _ => {
                if !session.submit_text(&line) {
                    println!("ℹ️  Same question as before — ask something new, or /new for a fresh topic.");
                    continue;
                }
                run_turn(&mut session, &synthesizer, &player, &status_tx, args.mute).await;
            }
        }
    }

    println!("مع السلامة 👋");
    Ok(())
}

/// Reads a recording from disk, gates duplicates by byte length, and queues
/// the transcript as a spoken query.
async fn submit_recording<C: ChatModel>(
    session: &mut ChatSession<C>,
    transcriber: &GoogleTranscriber,
    path: &str,
) -> Result<()> {
    let audio = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read recording at {path}"))?;
    if !session.accepts_recording(audio.len()) {
        bail!("That looks like the same recording as last time (or an empty one)");
    }
    session.note_recording(audio.len());

    match transcriber.transcribe(&audio).await {
        Ok(Transcript::Text(text)) => {
            println!("🎤 You said: {text}");
            if !session.submit_spoken(&text) {
                bail!("The transcript was empty — please try again");
            }
            Ok(())
        }
        Ok(Transcript::NoSpeech) => {
            bail!("Could not understand the audio — please try again")
        }
        Err(e) => Err(e.context("Speech recognition failed")),
    }
}

/// Drives the pending query to completion and renders the outcome: reply
/// text first, then sequential audio playback.
async fn run_turn<C: ChatModel>(
    session: &mut ChatSession<C>,
    synthesizer: &GttsSynthesizer,
    player: &RodioPlayer,
    status_tx: &tokio::sync::mpsc::Sender<Status>,
    mute: bool,
) {
    match session.process_pending(synthesizer, status_tx).await {
        Some(TurnReply::Answered {
            display,
            clips,
            capped,
        }) => {
            println!("\n{display}\n");
            if capped {
                println!("🎯 The reply hit the 10-point limit — ask about another topic for more.");
            }
            if !mute {
                if let Some(playlist) = Playlist::assemble(clips) {
                    println!("🔊 Playing the reply ({} clips)...", playlist.len());
                    let report = playlist.play(player).await;
                    if report.skipped > 0 {
                        tracing::warn!(
                            "{} of {} clips failed to play",
                            report.skipped,
                            report.advanced()
                        );
                    }
                }
            }
        }
        Some(TurnReply::Failed(detail)) => {
            eprintln!("❌ The model call failed: {detail}");
            eprintln!("   Your question was not recorded — you can retry it as-is.");
        }
        None => {}
    }
}

fn render_log(log: &[Turn]) {
    if log.is_empty() {
        println!("(empty conversation)");
        return;
    }
    for turn in log {
        let tag = match turn.role {
            Role::User => "أنت",
            Role::Assistant => "المساعد",
        };
        println!("[{tag}]\n{}\n", turn.content);
    }
}

async fn prompt() -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    Ok(())
}
