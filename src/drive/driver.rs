// High-level drive facade for the swerve base
//
// Ties the input shaper, kinematics, desaturation, wheel modules and pose
// estimator together into the per-tick operations the runtime calls. Owns
// every piece of mutable drive state; nothing else addresses the modules or
// the pose directly.

use tracing::{debug, info};

use super::estimator::{EstimatorConfig, Pose2, PoseEstimator, VisionObservation};
use super::kinematics::{
    desaturate_wheel_speeds, ChassisVelocity, ModuleOffset, SwerveKinematics, WheelTarget,
    NUM_MODULES,
};
use super::module::{ModuleIo, SimModuleIo, SwerveModule, WheelState};
use super::shaper::{InputShaper, ShaperConfig};
use super::DriveError;

/// Default module layout: square base, offsets in meters from the rotation
/// center, ordered front-left, front-right, back-left, back-right.
const DEFAULT_OFFSETS: [ModuleOffset; NUM_MODULES] = [
    ModuleOffset { x: 0.3, y: 0.3 },
    ModuleOffset { x: 0.3, y: -0.3 },
    ModuleOffset { x: -0.3, y: 0.3 },
    ModuleOffset { x: -0.3, y: -0.3 },
];

/// Default speed limits
const DEFAULT_MAX_SPEED: f64 = 4.8; // m/s
const DEFAULT_MAX_ANGULAR_SPEED: f64 = 2.0 * std::f64::consts::PI; // rad/s

/// Drive configuration, validated at construction
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub max_speed: f64,
    pub max_angular_speed: f64,
    pub offsets: [ModuleOffset; NUM_MODULES],
    pub shaper: ShaperConfig,
    pub estimator: EstimatorConfig,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            max_angular_speed: DEFAULT_MAX_ANGULAR_SPEED,
            offsets: DEFAULT_OFFSETS,
            shaper: ShaperConfig::default(),
            estimator: EstimatorConfig::default(),
        }
    }
}

/// The four-module swerve drivetrain
///
/// Generic over the module hardware backend so the same facade drives real
/// controllers or [`SimModuleIo`].
#[derive(Debug)]
pub struct SwerveDrive<IO: ModuleIo> {
    modules: [SwerveModule<IO>; NUM_MODULES],
    kinematics: SwerveKinematics,
    shaper: InputShaper,
    estimator: PoseEstimator,
    max_speed: f64,
    max_angular_speed: f64,
}

impl<IO: ModuleIo> SwerveDrive<IO> {
    /// Build the drivetrain from a validated configuration and four module
    /// backends (front-left, front-right, back-left, back-right).
    pub fn new(config: DriveConfig, ios: [IO; NUM_MODULES]) -> Result<Self, DriveError> {
        if !(config.max_speed > 0.0) || !config.max_speed.is_finite() {
            return Err(DriveError::InvalidMaxSpeed {
                value: config.max_speed,
            });
        }
        if !(config.max_angular_speed > 0.0) || !config.max_angular_speed.is_finite() {
            return Err(DriveError::InvalidMaxSpeed {
                value: config.max_angular_speed,
            });
        }

        let kinematics = SwerveKinematics::new(config.offsets)?;
        let modules = ios.map(SwerveModule::new);

        let snapshot = read_states(&modules);
        let estimator = PoseEstimator::new(
            kinematics.clone(),
            config.estimator,
            Pose2::default(),
            snapshot,
        );

        info!(
            "swerve drive up: max {:.1} m/s, {:.1} rad/s",
            config.max_speed, config.max_angular_speed
        );

        Ok(Self {
            modules,
            kinematics,
            shaper: InputShaper::new(config.shaper),
            estimator,
            max_speed: config.max_speed,
            max_angular_speed: config.max_angular_speed,
        })
    }

    /// Drive from raw stick axes (each in [-1, 1]).
    ///
    /// With `rate_limit` the axes pass through the input shaper; without it
    /// they are clamped and applied directly (autonomous routines already
    /// produce smooth commands). With `field_relative` the translation is
    /// interpreted in the field frame and rotated into the robot frame by
    /// the current heading estimate. `dt` is the elapsed time since the
    /// previous tick, in seconds.
    pub fn drive(
        &mut self,
        x: f64,
        y: f64,
        rot: f64,
        field_relative: bool,
        rate_limit: bool,
        dt: f64,
    ) {
        let (x_cmd, y_cmd, rot_cmd) = if rate_limit {
            self.shaper.shape(x, y, rot, dt)
        } else {
            (x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0), rot.clamp(-1.0, 1.0))
        };

        let mut v = ChassisVelocity::new(
            x_cmd * self.max_speed,
            y_cmd * self.max_speed,
            rot_cmd * self.max_angular_speed,
        );

        if field_relative {
            let heading = self.estimator.pose().heading;
            let (sin_h, cos_h) = heading.sin_cos();
            v = ChassisVelocity::new(
                v.vx * cos_h + v.vy * sin_h,
                -v.vx * sin_h + v.vy * cos_h,
                v.omega,
            );
        }

        self.set_chassis_velocity(v);
    }

    /// Command a robot-frame chassis velocity directly.
    pub fn set_chassis_velocity(&mut self, v: ChassisVelocity) {
        let mut targets = self.kinematics.to_wheel_targets(v);
        desaturate_wheel_speeds(&mut targets, self.max_speed);

        debug!(
            "chassis ({:.2}, {:.2}, {:.2}) -> speeds [{:.2}, {:.2}, {:.2}, {:.2}]",
            v.vx, v.vy, v.omega, targets[0].speed, targets[1].speed, targets[2].speed,
            targets[3].speed
        );

        for (module, target) in self.modules.iter_mut().zip(targets) {
            module.set_desired(target);
        }
    }

    /// Lock the wheels in an X stance: zero speed, each wheel steered along
    /// its mounting diagonal. Resists being pushed without drawing power.
    ///
    /// Also drops the input shaper back to rest: the base is stopping, and a
    /// held near-full magnitude would otherwise let the first command after
    /// the lock jump straight to speed.
    pub fn set_x_formation(&mut self) {
        self.shaper.reset();
        let offsets = *self.kinematics.offsets();
        for (module, off) in self.modules.iter_mut().zip(offsets) {
            module.set_desired_raw(WheelTarget::new(0.0, off.y.atan2(off.x)));
        }
    }

    /// Advance the pose estimate from the current wheel snapshot, applying
    /// at most one vision correction. Call exactly once per tick.
    pub fn update_odometry(&mut self, vision: Option<VisionObservation>) {
        let snapshot = read_states(&self.modules);
        self.estimator.update(&snapshot);

        if let Some(obs) = vision {
            self.estimator.apply_vision(&obs);
        }
    }

    pub fn pose(&self) -> Pose2 {
        self.estimator.pose()
    }

    /// Reset the pose estimate to a known pose (e.g. the start-of-match
    /// position from the autonomous selector).
    pub fn reset_pose(&mut self, pose: Pose2) {
        let snapshot = read_states(&self.modules);
        self.estimator.reset(pose, snapshot);
    }

    /// Zero the heading estimate, keeping position.
    pub fn zero_heading(&mut self) {
        self.estimator.zero_heading();
    }

    /// Zero every module's distance measurement and re-seed odometry.
    pub fn reset_encoders(&mut self) {
        for module in self.modules.iter_mut() {
            module.reset_position();
        }
        let pose = self.estimator.pose();
        let snapshot = read_states(&self.modules);
        self.estimator.reset(pose, snapshot);
    }

    /// Measured state of each module, for telemetry.
    pub fn module_states(&self) -> [WheelState; NUM_MODULES] {
        read_states(&self.modules)
    }

    /// Last commanded target of each module, for telemetry.
    pub fn desired_targets(&self) -> [WheelTarget; NUM_MODULES] {
        let mut targets = [WheelTarget::default(); NUM_MODULES];
        for (t, m) in targets.iter_mut().zip(self.modules.iter()) {
            *t = m.desired();
        }
        targets
    }

    /// Shaper internals (held direction and magnitude), for telemetry.
    pub fn shaper_state(&self) -> (f64, f64) {
        (self.shaper.direction(), self.shaper.magnitude())
    }

    /// Vision observations dropped so far, for telemetry.
    pub fn vision_rejections(&self) -> u64 {
        self.estimator.vision_rejections()
    }
}

impl SwerveDrive<SimModuleIo> {
    /// Advance the simulated wheels by `dt` seconds. Call between actuation
    /// and odometry when running against the simulation backend.
    pub fn step_simulation(&mut self, dt: f64) {
        for module in self.modules.iter_mut() {
            module.io_mut().advance(dt);
        }
    }
}

fn read_states<IO: ModuleIo>(modules: &[SwerveModule<IO>; NUM_MODULES]) -> [WheelState; NUM_MODULES] {
    let mut states = [WheelState::default(); NUM_MODULES];
    for (s, m) in states.iter_mut().zip(modules.iter()) {
        *s = m.state();
    }
    states
}
