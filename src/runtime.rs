// 50 Hz control loop with watchdog
//
// Each tick: drain operator commands and vision poses (non-blocking, latest
// wins), shape and actuate the drive, advance odometry, publish pose and
// health. A stale command stream drops the base into the locked X stance
// instead of coasting on the last command.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{
    CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD_DRIVE, TOPIC_HEALTH, TOPIC_RT_POSE, TOPIC_RT_WHEELS,
    TOPIC_VISION_POSE,
};
use crate::drive::{
    DriveConfig, ModuleIo, Pose2, SimModuleIo, SwerveDrive, VisionObservation, NUM_MODULES,
};
use crate::messages::{
    DriveCommand, DriveTelemetry, PoseTelemetry, RuntimeHealth, VisionPoseMsg, WheelTelemetry,
};

/// Options resolved from the command line
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub loop_hz: u64,
    pub vision: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            loop_hz: LOOP_HZ,
            vision: true,
        }
    }
}

pub struct Runtime {
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    /// Process incoming command
    fn on_command(&mut self, cmd: DriveCommand) {
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Command to actuate this tick, or `None` when the watchdog tripped.
    fn command_for_tick(&mut self) -> Option<DriveCommand> {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), locking wheels", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            None
        } else if let Some(cmd) = self.latest_cmd.clone() {
            self.health = RuntimeHealth::Ok;
            Some(cmd)
        } else {
            self.health = RuntimeHealth::CmdStale;
            None
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run(options: RuntimeOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_cmd = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let sub_vision = session.declare_subscriber(TOPIC_VISION_POSE).await?;
    let pub_pose = session.declare_publisher(TOPIC_RT_POSE).await?;
    let pub_wheels = session.declare_publisher(TOPIC_RT_WHEELS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    // Construction-time configuration faults (geometry, limits) abort here
    let mut drive = SwerveDrive::new(DriveConfig::default(), [SimModuleIo::new(); NUM_MODULES])?;
    let mut runtime = Runtime::new();

    let loop_hz = options.loop_hz.max(1);
    let mut tick = interval(Duration::from_millis((1000 / loop_hz).max(1)));
    let mut prev_tick = Instant::now();

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, vision {}",
        loop_hz,
        CMD_TIMEOUT.as_millis(),
        if options.vision { "on" } else { "off" }
    );
    info!("Subscribed to: {}, {}", TOPIC_CMD_DRIVE, TOPIC_VISION_POSE);
    info!("Publishing to: {}, {}", TOPIC_RT_POSE, TOPIC_HEALTH);

    loop {
        tick.tick().await;
        let now = Instant::now();
        let dt = now.duration_since(prev_tick).as_secs_f64();
        prev_tick = now;

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_cmd.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse command: {}", e),
            }
        }

        // 2. Drain vision poses, at most one observation per tick
        let mut vision: Option<VisionObservation> = None;
        while let Ok(Some(sample)) = sub_vision.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<VisionPoseMsg>(&payload) {
                Ok(msg) => {
                    vision = Some(VisionObservation {
                        pose: Pose2::new(msg.x, msg.y, msg.heading),
                        trust: msg.confidence,
                    });
                }
                Err(e) => warn!("Failed to parse vision pose: {}", e),
            }
        }
        if !options.vision {
            vision = None;
        }

        // 3. Actuate: shaped command, or the locked X stance when stale
        match runtime.command_for_tick() {
            Some(cmd) => drive.drive(cmd.x, cmd.y, cmd.rot, cmd.field_relative, true, dt),
            None => drive.set_x_formation(),
        }

        // 4. Advance the simulated wheels, then odometry + vision fusion
        drive.step_simulation(dt);
        drive.update_odometry(vision);

        // 5. Publish pose, wheel telemetry and health
        let telemetry = PoseTelemetry::from_pose(drive.pose(), drive.vision_rejections());
        pub_pose.put(serde_json::to_string(&telemetry)?).await?;
        pub_wheels
            .put(serde_json::to_string(&wheel_telemetry(&drive))?)
            .await?;
        pub_health.put(serde_json::to_string(&runtime.health)?).await?;
    }
}

fn wheel_telemetry<IO: ModuleIo>(drive: &SwerveDrive<IO>) -> DriveTelemetry {
    let states = drive.module_states();
    let targets = drive.desired_targets();
    let (shaper_direction, shaper_magnitude) = drive.shaper_state();

    DriveTelemetry {
        wheels: states
            .iter()
            .zip(targets.iter())
            .map(|(s, t)| WheelTelemetry {
                target_speed: t.speed,
                target_angle: t.angle,
                speed: s.speed,
                angle: s.angle,
                distance: s.distance,
            })
            .collect(),
        shaper_direction,
        shaper_magnitude,
    }
}
