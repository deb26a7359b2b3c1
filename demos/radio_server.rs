//! Radio server example with live sound effects
//!
//! Run with: cargo run --example radio_server [BIND_ADDR]
//!
//! Environment:
//!   PORT       port to bind when no BIND_ADDR is given (default 3000)
//!   AUDIO_DIR  directory holding `songs/conversation.mp3` and `fx/` (default ./audio)
//!
//! Requires `sox` (with mp3 support) on the PATH.
//!
//! ## Listening
//!
//!   ffplay http://localhost:3000/stream
//!   vlc http://localhost:3000/stream
//!
//! ## Controlling
//!
//!   curl -d start http://localhost:3000/controller
//!   curl -d applause http://localhost:3000/controller
//!   curl -d '{"command":"boo"}' http://localhost:3000/controller
//!   curl -d stop http://localhost:3000/controller

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use fx_radio::{BroadcastConfig, CommandReply, CommandStatus, Listener, SoxSession};
use serde::Deserialize;

const DEFAULT_PORT: u16 = 3000;

type AppState = Arc<SoxSession>;

#[derive(Deserialize)]
struct CommandBody {
    command: String,
}

/// Parse bind address from the command line, falling back to `PORT`
fn parse_bind_addr(arg: Option<&String>) -> Result<SocketAddr, String> {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);

    let arg = match arg {
        Some(arg) => arg.replace("localhost", "127.0.0.1"),
        None => return Ok(SocketAddr::from(([0, 0, 0, 0], port))),
    };

    if let Ok(addr) = arg.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = arg.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: radio_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:$PORT)");
}

/// Listener that unregisters itself when the HTTP body is dropped
struct Connection {
    listener: Listener,
    session: AppState,
}

impl Drop for Connection {
    fn drop(&mut self) {
        let id = self.listener.id();
        let session = Arc::clone(&self.session);
        // Off the runtime (at shutdown) the registry prunes it on the next broadcast instead
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            session.close_listener(id).await;
            tracing::info!(listener = id, "Listener disconnected");
        });
    }
}

/// Handles `GET /stream`: live audio until the client goes away
async fn handle_stream(State(session): State<AppState>) -> Response {
    let listener = session.new_listener().await;
    tracing::info!(listener = listener.id(), "Listener connected");

    let connection = Connection { listener, session };
    let stream = futures::stream::unfold(connection, |mut conn| async move {
        let chunk = conn.listener.recv().await?;
        Some((Ok::<Bytes, std::io::Error>(chunk), conn))
    });

    (
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Command text from a raw or `{"command": ".."}` body
fn command_text(body: &str) -> String {
    match serde_json::from_str::<CommandBody>(body) {
        Ok(parsed) => parsed.command,
        Err(_) => body.to_string(),
    }
}

fn status_code(status: CommandStatus) -> StatusCode {
    match status {
        CommandStatus::Ok => StatusCode::OK,
        CommandStatus::UnknownCommand => StatusCode::BAD_REQUEST,
        CommandStatus::EffectNotFound => StatusCode::NOT_FOUND,
        CommandStatus::NotBroadcasting => StatusCode::CONFLICT,
        CommandStatus::SourceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        CommandStatus::MixFailure => StatusCode::BAD_GATEWAY,
        CommandStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply_json(reply: &CommandReply) -> serde_json::Value {
    if reply.is_ok() {
        serde_json::json!({ "result": reply.message })
    } else {
        serde_json::json!({ "error": reply.message })
    }
}

/// Handles `POST /controller`
async fn handle_command(State(session): State<AppState>, body: String) -> Response {
    let reply = session.handle_command(&command_text(&body)).await;
    (status_code(reply.status), Json(reply_json(&reply))).into_response()
}

async fn report_stats(session: AppState) {
    let mut ticker = tokio::time::interval(Duration::from_secs(30));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let stats = session.stats();
        let state = session.state().await;
        let listeners = session.registry().listener_count().await;
        tracing::info!(
            state = %state,
            listeners = listeners,
            bytes = stats.bytes_broadcast,
            bitrate = stats.bitrate(),
            splices = stats.splices,
            "Stats"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match parse_bind_addr(args.get(1)) {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fx_radio=debug".parse()?)
                .add_directive("radio_server=debug".parse()?),
        )
        .init();

    let audio_dir = std::env::var("AUDIO_DIR").unwrap_or_else(|_| "audio".to_string());
    let session: AppState = Arc::new(SoxSession::from_config(BroadcastConfig::from_audio_dir(
        &audio_dir,
    )));

    let app = Router::new()
        .route("/", get(|| async { Redirect::to("/stream") }))
        .route("/stream", get(handle_stream))
        .route("/controller", post(handle_command))
        .with_state(Arc::clone(&session));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    println!("Radio server listening on http://{}", bind_addr);
    println!();
    println!("Listen:  ffplay http://localhost:{}/stream", bind_addr.port());
    println!("Control: curl -d start http://localhost:{}/controller", bind_addr.port());
    println!();

    tokio::spawn(report_stats(Arc::clone(&session)));

    // Listener streams never end on their own, so shut down without draining them
    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    session.stop().await;
    let stats = session.stats();
    println!(
        "Stats: bytes={} chunks={} listeners={} splices={} mix_failures={}",
        stats.bytes_broadcast,
        stats.chunks_broadcast,
        stats.listeners_joined,
        stats.splices,
        stats.mix_failures,
    );

    Ok(())
}
