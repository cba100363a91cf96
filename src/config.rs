// Timeouts, topics, loop configuration
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "swerve/cmd/drive"; // operator commands
pub const TOPIC_VISION_POSE: &str = "swerve/vision/pose"; // camera pose observations
pub const TOPIC_RT_POSE: &str = "swerve/rt/pose"; // pose telemetry
pub const TOPIC_RT_WHEELS: &str = "swerve/rt/wheels"; // per-wheel telemetry
pub const TOPIC_HEALTH: &str = "swerve/state/health"; // health status
