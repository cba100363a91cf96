use clap::Parser;
use tracing_subscriber::EnvFilter;

use swerve_zenoh_runtime::config::LOOP_HZ;
use swerve_zenoh_runtime::runtime::{self, RuntimeOptions};

#[derive(Debug, Parser)]
#[command(about = "Swerve drive control runtime")]
struct Cli {
    /// Control loop frequency in Hz
    #[arg(long, default_value_t = LOOP_HZ)]
    hz: u64,

    /// Disable vision pose corrections (odometry only)
    #[arg(long)]
    no_vision: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let cli = Cli::parse();
    let options = RuntimeOptions {
        loop_hz: cli.hz,
        vision: !cli.no_vision,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
