//! room-tail: follow a room from the terminal.
//!
//! Connects one session, logs every update, and leaves cleanly on Ctrl-C.
//! `RUST_LOG=room_sync=debug` shows the connection state machine.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use room_sync::{
    AuthContext, ConnectionState, EditorWidget, ParticipantId, RoomId, RoomSession,
    SessionConfig, SessionUpdate, WsConnector,
};

#[derive(Debug, Parser)]
#[command(name = "room-tail", about = "Follow a collaborative room")]
struct Args {
    /// Room to join
    #[arg(long)]
    room: String,

    /// WebSocket endpoint (overrides the config file)
    #[arg(long, env = "ROOM_SYNC_URL")]
    url: Option<String>,

    /// Bearer token
    #[arg(long, env = "ROOM_SYNC_TOKEN", hide_env_values = true)]
    token: String,

    /// Local participant id, used to skip our own echoes
    #[arg(long, default_value = "room-tail")]
    participant: String,

    /// JSON session config
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Stand-in editor: remembers the text it was given.
#[derive(Default)]
struct Transcript {
    content: String,
}

impl EditorWidget for Transcript {
    fn set_content(&mut self, content: &str) {
        self.content = content.to_string();
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match SessionConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                std::process::exit(2);
            }
        },
        None => SessionConfig::default(),
    };
    if let Some(url) = args.url {
        config.server_url = url;
    }

    let auth = Arc::new(AuthContext::without_refresh(
        ParticipantId::new(args.participant),
        args.token,
    ));
    let connector = WsConnector::from_config(&config);
    let mut session = RoomSession::new(
        RoomId::new(args.room),
        connector,
        auth,
        Transcript::default(),
        config,
    );

    if let Err(e) = session.connect() {
        error!("cannot connect: {e}");
        std::process::exit(1);
    }

    loop {
        let update = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("leaving room {}", session.room_id());
                session.leave();
                break;
            }
            update = session.next_update() => update,
        };
        let Some(update) = update else {
            break;
        };
        report(&session, &update);
        if let SessionUpdate::Document | SessionUpdate::Joined = update {
            // widgets report programmatic writes back as changes
            let content = session.editor().content.clone();
            session.editor_changed(&content);
        }
    }

    if session.state() == ConnectionState::Error {
        std::process::exit(1);
    }
}

fn report<C, A>(session: &RoomSession<C, A, Transcript>, update: &SessionUpdate)
where
    C: room_sync::Connector,
    A: room_sync::AuthProvider,
{
    match update {
        SessionUpdate::Connection(state) => info!("connection: {state:?}"),
        SessionUpdate::Joined => info!(
            "joined: {} bytes at v{}, {} participants",
            session.document().content.len(),
            session.document().version,
            session.participants().len()
        ),
        SessionUpdate::Document => info!(
            "document: {} bytes at v{}",
            session.document().content.len(),
            session.document().version
        ),
        SessionUpdate::Roster => {
            let ids: Vec<&str> = session
                .participants()
                .iter()
                .map(|p| p.user_id.as_str())
                .collect();
            info!("participants: {}", ids.join(", "));
        }
        SessionUpdate::Chat => {
            if let Some(message) = session.messages().last() {
                info!(
                    "[{}] {}: {}",
                    message.created_at.format("%H:%M:%S"),
                    message.sender.display_name,
                    message.content
                );
            }
        }
        SessionUpdate::Cursor(id) => {
            if let Some(cursor) = session.presence().cursor(id) {
                info!("cursor {id}: {}:{}", cursor.line, cursor.ch);
            }
        }
        SessionUpdate::EchoSuppressed | SessionUpdate::StaleUpdate | SessionUpdate::OwnCursor => {}
    }
}
