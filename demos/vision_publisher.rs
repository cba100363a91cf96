// Synthetic vision feed: publishes a slowly wobbling field pose at 5 Hz,
// with an occasional wild outlier to exercise the estimator's gate.
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::info;

const CENTER: (f64, f64) = (0.0, 0.0);
const WOBBLE_M: f64 = 0.05; // simulated measurement noise amplitude
const OUTLIER_EVERY: u64 = 20; // every Nth frame jumps far off

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher("swerve/vision/pose").await?;

    info!("Publishing synthetic vision poses to swerve/vision/pose");

    let start = Instant::now();
    let mut tick = interval(Duration::from_millis(200));
    let mut frame: u64 = 0;

    loop {
        tick.tick().await;
        frame += 1;

        let t = start.elapsed().as_secs_f64();
        let (x, y) = if frame % OUTLIER_EVERY == 0 {
            info!("Publishing outlier frame {}", frame);
            (CENTER.0 + 25.0, CENTER.1 - 25.0)
        } else {
            (
                CENTER.0 + WOBBLE_M * (1.3 * t).sin(),
                CENTER.1 + WOBBLE_M * (0.7 * t).cos(),
            )
        };

        let msg = json!({
            "x": x,
            "y": y,
            "heading": 0.02 * (0.5 * t).sin(),
            "confidence": 0.02,
            "timestamp": t
        });
        publisher.put(msg.to_string()).await?;
    }
}
