//! Loopstream WebRTC server binary
//!
//! Serves the HTTP signaling endpoints and streams looping file-backed
//! media to every negotiated session.
//!
//! # Usage
//!
//! ```bash
//! webrtc-server --bind 0.0.0.0:8080 \
//!     --video-source assets/video.ivf \
//!     --audio-source assets/audio.ogg \
//!     --static-dir ./static
//! ```

use clap::Parser;
use loopstream_webrtc::{RelayConfig, SessionRegistry, SignalingServer, TurnServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Loopstream WebRTC server
///
/// HTTP offer/answer signaling with per-session looping media delivery.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP bind address
    #[arg(long, default_value = "0.0.0.0:8080", env = "LOOPSTREAM_BIND")]
    bind: String,

    /// Looping VP8 video source (IVF container)
    #[arg(
        long,
        default_value = "assets/video.ivf",
        env = "LOOPSTREAM_VIDEO_SOURCE"
    )]
    video_source: PathBuf,

    /// Looping Opus audio source (Ogg container)
    #[arg(
        long,
        default_value = "assets/audio.ogg",
        env = "LOOPSTREAM_AUDIO_SOURCE"
    )]
    audio_source: PathBuf,

    /// Audio pacing interval in milliseconds (one Ogg page per tick)
    #[arg(long, default_value_t = 20, env = "LOOPSTREAM_AUDIO_PAGE_MS")]
    audio_page_ms: u64,

    /// STUN server URLs (comma-separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302,stun:stun1.l.google.com:19302",
        env = "LOOPSTREAM_STUN_SERVERS"
    )]
    stun_servers: Vec<String>,

    /// TURN server URL (turn: or turns:)
    #[arg(long, env = "LOOPSTREAM_TURN_URL")]
    turn_url: Option<String>,

    /// TURN username
    #[arg(long, env = "LOOPSTREAM_TURN_USERNAME", requires = "turn_url")]
    turn_username: Option<String>,

    /// TURN credential
    #[arg(long, env = "LOOPSTREAM_TURN_CREDENTIAL", requires = "turn_url")]
    turn_credential: Option<String>,

    /// Directory served as static files at the HTTP root
    #[arg(long, env = "LOOPSTREAM_STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("loopstream-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %args.bind,
        "Loopstream WebRTC server starting"
    );

    let turn_servers = match (&args.turn_url, &args.turn_username, &args.turn_credential) {
        (Some(url), Some(username), Some(credential)) => vec![TurnServerConfig {
            url: url.clone(),
            username: username.clone(),
            credential: credential.clone(),
        }],
        (Some(_), _, _) => {
            return Err("--turn-url requires --turn-username and --turn-credential".into())
        }
        _ => Vec::new(),
    };

    let config = RelayConfig {
        stun_servers: args.stun_servers,
        turn_servers,
        video_source: args.video_source,
        audio_source: args.audio_source,
        audio_page_ms: args.audio_page_ms,
        static_dir: args.static_dir,
    };
    config.validate()?;

    info!(
        stun_servers = config.stun_servers.len(),
        turn_servers = config.turn_servers.len(),
        video_source = %config.video_source.display(),
        audio_source = %config.audio_source.display(),
        audio_page_ms = config.audio_page_ms,
        "configuration loaded"
    );

    let registry = Arc::new(SessionRegistry::new());
    let server = SignalingServer::new(args.bind, Arc::new(config), registry);

    tokio::select! {
        result = server.serve() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    info!("Loopstream WebRTC server stopped");
    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
