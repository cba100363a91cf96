// Drive module for the four-wheel swerve base
//
// Provides:
// - Swerve inverse/forward kinematics (chassis velocity <-> wheel targets)
// - Joystick input shaping (polar slew-rate limiting)
// - Pose estimation (wheel odometry + gated vision blending)
// - High-level drive facade tying the above to the wheel modules

mod driver;
pub mod estimator;
pub mod kinematics;
pub mod module;
pub mod shaper;

pub use driver::{DriveConfig, SwerveDrive};
pub use estimator::{EstimatorConfig, Pose2, PoseEstimator, Twist2, VisionObservation};
pub use kinematics::{
    desaturate_wheel_speeds, ChassisVelocity, ModuleOffset, SwerveKinematics, WheelTarget,
    NUM_MODULES,
};
pub use module::{ModuleIo, SimModuleIo, SwerveModule, WheelState};
pub use shaper::{InputShaper, ShaperConfig};

/// Error types for drive construction
///
/// These are configuration faults detected before the control loop starts.
/// Runtime sensor noise and vision outliers are never surfaced as errors;
/// they are rejected locally and counted.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("module geometry is degenerate: offsets do not span the plane")]
    DegenerateGeometry,

    #[error("invalid maximum speed {value}: must be > 0")]
    InvalidMaxSpeed { value: f64 },
}
