//! Invigil server binary
//!
//! Usage:
//!   invigil --addr 127.0.0.1:8000                    # Run the API server
//!   invigil --max-warnings 5 --no-face-threshold 2.0 # Tune policy limits
//!
//! All flags are also readable from the environment (INVIGIL_* variables).

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use invigil::config::ProctorConfig;
use invigil::core::{run_server, FixedSource, MemorySink, SessionRegistry};
use invigil::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "invigil",
    version = VERSION,
    about = "Invigil - real-time exam proctoring engine",
    long_about = "Invigil watches a remote examinee's webcam stream and turns\n\
                  per-frame observations (face count, gaze, head pose) into\n\
                  auditable violation events and session decisions.\n\n\
                  Violation classes:\n  \
                  NO_FACE        - sustained, High, counts as warning\n  \
                  MULTIPLE_FACES - instant, Critical, forces auto-submit\n  \
                  LOOKING_AWAY   - sustained, Medium, counts as warning\n  \
                  HEAD_TURN      - sustained, Medium, counts as warning"
)]
struct Args {
    /// Server address
    #[arg(long, env = "INVIGIL_ADDR", default_value = "127.0.0.1:8000")]
    addr: String,

    /// Seconds without a visible face before NO_FACE fires
    #[arg(long, env = "INVIGIL_NO_FACE_THRESHOLD", default_value_t = invigil::DEFAULT_NO_FACE_THRESHOLD_SECS)]
    no_face_threshold: f64,

    /// Seconds of sustained off-screen gaze before LOOKING_AWAY fires
    #[arg(long, env = "INVIGIL_LOOKING_AWAY_THRESHOLD", default_value_t = invigil::DEFAULT_LOOKING_AWAY_THRESHOLD_SECS)]
    looking_away_threshold: f64,

    /// Seconds of sustained head turn before HEAD_TURN fires
    #[arg(long, env = "INVIGIL_HEAD_TURN_THRESHOLD", default_value_t = invigil::DEFAULT_HEAD_TURN_THRESHOLD_SECS)]
    head_turn_threshold: f64,

    /// Warnings before a session is auto-submitted
    #[arg(long, env = "INVIGIL_MAX_WARNINGS", default_value_t = invigil::DEFAULT_MAX_WARNINGS)]
    max_warnings: u32,

    /// Advisory frame cadence reported to clients (seconds)
    #[arg(long, env = "INVIGIL_FRAME_INTERVAL", default_value_t = invigil::DEFAULT_FRAME_INTERVAL_SECS)]
    frame_interval: f64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ProctorConfig {
        no_face_threshold_secs: args.no_face_threshold,
        looking_away_threshold_secs: args.looking_away_threshold,
        head_turn_threshold_secs: args.head_turn_threshold,
        max_warnings: args.max_warnings,
        frame_interval_secs: args.frame_interval,
    };

    info!(
        version = VERSION,
        max_warnings = config.max_warnings,
        no_face_threshold_secs = config.no_face_threshold_secs,
        "starting invigil"
    );

    let sink = MemorySink::shared();
    let registry = SessionRegistry::new(&config, sink);
    // Stand-in vision backend; deployments wire a real ObservationSource
    let source = Arc::new(FixedSource::single_face());

    if let Err(err) = run_server(&args.addr, config, registry, source).await {
        eprintln!("Server error: {}", err);
        std::process::exit(1);
    }
}
