// Message types exchanged over zenoh

use serde::{Deserialize, Serialize};

use crate::drive::Pose2;

/// Command from teleop/scripts -> runtime
///
/// `x`, `y` and `rot` are stick-style axes in [-1, 1] (the runtime clamps
/// out-of-range values). `field_relative` interprets the translation in the
/// field frame instead of the robot frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveCommand {
    pub x: f64,
    pub y: f64,
    pub rot: f64,
    #[serde(default)]
    pub field_relative: bool,
}

/// Field-pose observation from the vision pipeline -> runtime
///
/// `confidence` optionally overrides the estimator's default blend weight;
/// `timestamp` is the capture time in seconds, carried for display only (the
/// distance gate handles stale frames).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionPoseMsg {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// Pose telemetry published by the runtime each tick
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PoseTelemetry {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    /// Vision observations dropped by the estimator gate so far
    pub vision_rejections: u64,
}

impl PoseTelemetry {
    pub fn from_pose(pose: Pose2, vision_rejections: u64) -> Self {
        Self {
            x: pose.x,
            y: pose.y,
            heading: pose.heading,
            vision_rejections,
        }
    }
}

/// Per-wheel telemetry: last commanded target and measured state
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WheelTelemetry {
    pub target_speed: f64,
    pub target_angle: f64,
    pub speed: f64,
    pub angle: f64,
    pub distance: f64,
}

/// Drivetrain telemetry published by the runtime each tick
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DriveTelemetry {
    /// Front-left, front-right, back-left, back-right
    pub wheels: Vec<WheelTelemetry>,
    pub shaper_direction: f64,
    pub shaper_magnitude: f64,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
