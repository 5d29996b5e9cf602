pub mod cli;
pub mod config;
pub mod pipeline;
pub mod progress;

use tracing_subscriber::EnvFilter;

pub use pipeline::scoring::{score_similarity, score_similarity_async, ScoringError};

/// Install the global `tracing` subscriber. Logs go to stderr so stdout stays
/// reserved for results.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// CLI entry point. Returns the process exit code.
pub fn run() -> i32 {
    init_tracing();

    tracing::debug!("SketchTracker starting v{}", config::APP_VERSION);

    let command = match cli::parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            return e.exit_code();
        }
    };

    let args = match command {
        cli::Command::Help => {
            println!("{}", cli::USAGE);
            return 0;
        }
        cli::Command::Score(args) => args,
    };

    let stdout = std::io::stdout();
    match cli::execute(&args, &mut stdout.lock()) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "Scoring failed");
            eprintln!("{e}");
            e.exit_code()
        }
    }
}
