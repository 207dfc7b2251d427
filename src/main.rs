use anyhow::Result;
use clap::{Parser, Subcommand};
use iailog_client::app::{Screen, SessionHost};
use iailog_client::audio::{AudioBackendConfig, FileBackend, FilePlayback};
use iailog_client::conversation::{ConversationRoom, ConversationSession, Message, ProcessingState, Sender};
use iailog_client::recording::{VoiceRecorder, WavCapture};
use iailog_client::{ApiClient, Config, Connector, Diary, SessionError, SessionState};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "iailog", about = "Talk to a diary character from the terminal")]
struct Cli {
    /// Config file (without extension)
    #[arg(long, default_value = "config/iailog")]
    config: String,

    /// JWT for endpoints that need a signed-in parent
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a room and hold a live conversation
    Chat {
        #[arg(long)]
        character: i64,
        #[arg(long)]
        emotion: String,
        /// WAV file sent when you type /voice
        #[arg(long)]
        voice_file: Option<PathBuf>,
        /// Where synthesized replies are written
        #[arg(long)]
        replies_dir: Option<PathBuf>,
    },
    /// List characters
    Characters,
    /// Show the stored messages of a room
    History {
        #[arg(long)]
        room: i64,
    },
    /// Show the diary of a room
    Diary {
        #[arg(long)]
        room: i64,
    },
    /// List all diaries
    Diaries,
    /// Show the parent report of a room
    Report {
        #[arg(long)]
        room: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    let mut api = ApiClient::new(cfg.server.api_base_url.clone());
    api.set_token(cli.token.clone());
    info!("{} talking to {}", cfg.service.name, api.base_url());

    match cli.command {
        Command::Chat {
            character,
            emotion,
            voice_file,
            replies_dir,
        } => chat(&cfg, api, character, emotion, voice_file, replies_dir).await,
        Command::Characters => print_json(&api.get_characters().await?),
        Command::History { room } => {
            let messages: Vec<Message> = api
                .get_chat_messages(room)
                .await?
                .into_iter()
                .map(Message::from)
                .collect();
            print_json(&messages)
        }
        Command::Diary { room } => print_json(&api.get_diary(room).await?),
        Command::Diaries => print_json(&api.get_all_diaries().await?),
        Command::Report { room } => print_json(&api.get_parent_report(room).await?),
    }
}

async fn chat(
    cfg: &Config,
    api: ApiClient,
    character_id: i64,
    emotion: String,
    voice_file: Option<PathBuf>,
    replies_dir: Option<PathBuf>,
) -> Result<()> {
    let room = api.create_chat_room(character_id, &emotion).await?;
    let connector = Connector::new(cfg.server.socket_url.clone(), cfg.socket.clone());
    let host = Arc::new(ConsoleHost::default());

    let mut session = ConversationSession::new(
        ConversationRoom {
            room_id: room.id,
            character_id,
            emotion,
        },
        connector,
        Arc::new(api),
        host,
        &cfg.session,
    );

    if let Some(path) = voice_file {
        let backend = FileBackend::new(
            path,
            AudioBackendConfig {
                target_sample_rate: cfg.audio.sample_rate,
                target_channels: cfg.audio.channels,
                buffer_duration_ms: 100,
            },
        );
        let capture = WavCapture::new(
            Box::new(backend),
            cfg.audio.scratch_dir.clone(),
            cfg.audio.sample_rate,
            cfg.audio.channels,
        );
        session = session.with_recorder(VoiceRecorder::new(Box::new(capture)));
    }
    if let Some(dir) = replies_dir {
        session = session.with_playback(Arc::new(FilePlayback::new(dir)));
    }

    session.start().await?;
    println!("Room {} - type to talk, /voice, /end, /retry, /reconnect, /quit", room.id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = session.next_event(), if session.has_channel() => {
                if let Some(event) = event {
                    session.handle_event(event).await;
                }
            }
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !run_command(&mut session, line.trim()).await {
                        break;
                    }
                }
                None => {
                    session.leave().await;
                    break;
                }
            },
        }

        if session.state() == SessionState::Ended {
            break;
        }
    }

    Ok(())
}

/// Returns false when the user wants out
async fn run_command(session: &mut ConversationSession, line: &str) -> bool {
    let result = match line {
        "/quit" => {
            session.leave().await;
            return false;
        }
        "/end" => session.end_conversation().await.map(|_| ()),
        "/retry" => session.retry_finalize().await.map(|_| ()),
        "/reconnect" => session.reconnect().await,
        "/voice" => match session.start_recording().await {
            Ok(_) => session.stop_recording().await.map(|_| ()),
            Err(e) => Err(e),
        },
        text => session.send_message(text),
    };

    if let Err(e) = result {
        println!("! {}", e);
    }
    true
}

/// Prints session activity to the terminal
#[derive(Default)]
struct ConsoleHost {
    printed: Mutex<usize>,
}

impl SessionHost for ConsoleHost {
    fn transcript_updated(&self, messages: &[Message]) {
        let Ok(mut printed) = self.printed.lock() else {
            return;
        };

        for message in messages.iter().skip(*printed) {
            let who = match message.sender {
                Sender::User => "you",
                Sender::Ai => "friend",
            };
            println!("[{}] {}", who, message.text);
        }
        *printed = messages.len();
    }

    fn processing_changed(&self, state: &ProcessingState) {
        if let ProcessingState::Busy { message, .. } = state {
            println!("... {}", message);
        }
    }

    fn connection_changed(&self, connected: bool) {
        println!("{}", if connected { "(connected)" } else { "(not connected)" });
    }

    fn alert(&self, error: &SessionError) {
        println!("! {}", error);
    }

    fn diary_ready(&self, diary: Diary) {
        println!("\n{}\n\n{}", diary.summary, diary.content);
        if let Some(url) = diary.image_url {
            println!("Picture: {}", url);
        }
    }

    fn navigate(&self, screen: Screen) {
        info!("Next screen: {:?}", screen);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
