// Wheel module wrapper
//
// One swerve module pairs a drive actuator with a steering actuator. Hardware
// access goes through the `ModuleIo` trait so the same control code runs
// against real motor controllers or the simulation backend.

use std::f64::consts::{FRAC_PI_2, PI};

use super::kinematics::WheelTarget;
use super::shaper::angle_difference;

/// Measured state of one wheel module
///
/// `distance` is the cumulative distance the wheel has rolled (m), `speed`
/// the current signed drive speed (m/s), `angle` the steering direction (rad).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelState {
    pub distance: f64,
    pub speed: f64,
    pub angle: f64,
}

/// Hardware boundary for one module
///
/// Implementations wrap a real drive/steer controller pair or the simulation
/// backend; nothing above this trait touches hardware.
pub trait ModuleIo {
    /// Snapshot the measured wheel state.
    fn state(&self) -> WheelState;

    /// Command the wheel toward a (speed, angle) target. Fire-and-forget.
    fn set_target(&mut self, target: WheelTarget);

    /// Reset the cumulative distance measurement to zero.
    fn reset_position(&mut self);
}

/// Pick the equivalent target requiring the shorter steering rotation.
///
/// Steering more than 90 degrees is never necessary: driving the wheel
/// backwards at the supplementary angle reaches the same wheel velocity
/// vector with less rotation.
pub fn optimize_target(target: WheelTarget, current_angle: f64) -> WheelTarget {
    if angle_difference(target.angle, current_angle) > FRAC_PI_2 {
        WheelTarget::new(-target.speed, target.angle + PI)
    } else {
        target
    }
}

/// One swerve module: shortest-rotation steering over a `ModuleIo` backend.
#[derive(Debug)]
pub struct SwerveModule<IO: ModuleIo> {
    io: IO,
    desired: WheelTarget,
}

impl<IO: ModuleIo> SwerveModule<IO> {
    pub fn new(io: IO) -> Self {
        Self {
            io,
            desired: WheelTarget::default(),
        }
    }

    /// Command the module toward `target`, steering the shorter way around.
    ///
    /// A zero-speed target keeps the current steering angle instead of
    /// swinging the wheel to the target's (meaningless) direction.
    pub fn set_desired(&mut self, target: WheelTarget) {
        let current_angle = self.io.state().angle;

        let commanded = if target.speed == 0.0 {
            WheelTarget::new(0.0, current_angle)
        } else {
            optimize_target(target, current_angle)
        };

        self.desired = commanded;
        self.io.set_target(commanded);
    }

    /// Force a target through untouched (used for the locked X stance, where
    /// the exact angle matters and speed is zero).
    pub fn set_desired_raw(&mut self, target: WheelTarget) {
        self.desired = target;
        self.io.set_target(target);
    }

    pub fn state(&self) -> WheelState {
        self.io.state()
    }

    /// Last commanded target, for telemetry.
    pub fn desired(&self) -> WheelTarget {
        self.desired
    }

    pub fn reset_position(&mut self) {
        self.io.reset_position();
    }

    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }
}

/// Simulation backend: steering snaps to the command, drive speed is taken
/// as commanded, and distance integrates when the caller advances time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimModuleIo {
    state: WheelState,
}

impl SimModuleIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the simulated wheel by `dt` seconds at the commanded speed.
    pub fn advance(&mut self, dt: f64) {
        self.state.distance += self.state.speed * dt;
    }
}

impl ModuleIo for SimModuleIo {
    fn state(&self) -> WheelState {
        self.state
    }

    fn set_target(&mut self, target: WheelTarget) {
        self.state.speed = target.speed;
        self.state.angle = target.angle;
    }

    fn reset_position(&mut self) {
        self.state.distance = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn small_angle_error_passes_through() {
        let target = WheelTarget::new(1.0, FRAC_PI_4);
        let out = optimize_target(target, 0.0);
        assert_eq!(out, target);
    }

    #[test]
    fn large_angle_error_flips_speed() {
        let target = WheelTarget::new(1.0, PI);
        let out = optimize_target(target, 0.0);
        assert!((out.speed + 1.0).abs() < 1e-12);
        // Flipped angle is the same steering line as the current angle
        assert!(angle_difference(out.angle, 0.0) < 1e-12);
    }

    #[test]
    fn boundary_at_quarter_turn_does_not_flip() {
        let target = WheelTarget::new(1.0, FRAC_PI_2);
        let out = optimize_target(target, 0.0);
        assert_eq!(out, target);
    }

    #[test]
    fn zero_speed_holds_current_angle() {
        let mut io = SimModuleIo::new();
        io.set_target(WheelTarget::new(1.0, FRAC_PI_4));
        let mut module = SwerveModule::new(io);

        module.set_desired(WheelTarget::new(0.0, 0.0));
        assert!((module.state().angle - FRAC_PI_4).abs() < 1e-12);
        assert_eq!(module.state().speed, 0.0);
    }

    #[test]
    fn sim_integrates_distance() {
        let mut module = SwerveModule::new(SimModuleIo::new());
        module.set_desired(WheelTarget::new(2.0, 0.0));

        for _ in 0..50 {
            module.io_mut().advance(0.02);
        }
        assert!((module.state().distance - 2.0).abs() < 1e-9);

        module.reset_position();
        assert_eq!(module.state().distance, 0.0);
    }

    #[test]
    fn module_optimizes_reversal_command() {
        let mut io = SimModuleIo::new();
        io.set_target(WheelTarget::new(1.0, 0.0));
        let mut module = SwerveModule::new(io);

        // Target pointing backwards: drive negative instead of steering pi
        module.set_desired(WheelTarget::new(1.0, PI));
        let state = module.state();
        assert!((state.speed + 1.0).abs() < 1e-12);
        assert!(angle_difference(state.angle, 0.0) < 1e-12);
    }
}
