// Keyboard teleop: WASD move, Z/X rotate, R/F axis scale, G toggle field-relative, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::info;

const AXIS_SCALES: [f64; 3] = [0.25, 0.5, 1.0]; // fraction of full stick
const INPUT_TIMEOUT_MS: u64 = 100; // Reset axes after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher("swerve/cmd/drive").await?;

    info!("Controls: WASD=move, Z/X=rotate, R/F=scale, G=field-relative, Q=quit");
    info!("Scale: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut scale_idx: usize = 0;
    let mut field_relative = true;

    // Persistent axis state
    let mut x = 0.0;
    let mut y = 0.0;
    let mut rot = 0.0;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Movement - update axes and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        x = AXIS_SCALES[scale_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        x = -AXIS_SCALES[scale_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        y = AXIS_SCALES[scale_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        y = -AXIS_SCALES[scale_idx];
                        last_movement_input = Instant::now();
                    }

                    // Rotation
                    KeyCode::Char('z') if pressed => {
                        rot = AXIS_SCALES[scale_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        rot = -AXIS_SCALES[scale_idx];
                        last_movement_input = Instant::now();
                    }

                    // Axis scale
                    KeyCode::Char('r') if pressed => {
                        scale_idx = (scale_idx + 1).min(2);
                        print_scale(scale_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        scale_idx = scale_idx.saturating_sub(1);
                        print_scale(scale_idx);
                    }

                    // Frame toggle
                    KeyCode::Char('g') if pressed => {
                        field_relative = !field_relative;
                        info!(
                            "Frame: {}",
                            if field_relative { "field" } else { "robot" }
                        );
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Reset axes if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            x = 0.0;
            y = 0.0;
            rot = 0.0;
        }

        // Always publish at ~50Hz
        let cmd = json!({
            "x": x,
            "y": y,
            "rot": rot,
            "field_relative": field_relative
        });
        publisher.put(cmd.to_string()).await?;
    }

    Ok(())
}

fn print_scale(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Scale: {}", label);
}
