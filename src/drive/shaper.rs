// Joystick input shaping for the swerve base
//
// Raw stick deltas applied directly produce unsafe jerk: a 180 degree flick
// at speed would snap every steering module through the reversal. The shaper
// rate-limits the translation command in polar form (direction and magnitude
// limited separately) and the rotation axis independently.

use std::f64::consts::{PI, TAU};

/// Wrap an angle into [0, 2*pi).
pub fn wrap_angle(angle: f64) -> f64 {
    angle.rem_euclid(TAU)
}

/// Smallest absolute difference between two angles, in [0, pi].
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % TAU;
    if diff > PI { TAU - diff } else { diff }
}

/// Step `current` toward `target` by at most `step`, going the shorter way
/// around the circle. Both angles are treated modulo 2*pi.
pub fn step_towards_circular(current: f64, target: f64, step: f64) -> f64 {
    let current = wrap_angle(current);
    let target = wrap_angle(target);

    if angle_difference(current, target) <= step {
        return target;
    }

    let difference = (current - target).abs();
    if difference > PI {
        // Shorter path crosses the 0/2pi seam
        let direction = (target - current).signum();
        wrap_angle(current - direction * step)
    } else {
        current + (target - current).signum() * step
    }
}

/// Rate limiter for a scalar signal
///
/// Steps the held value toward each requested target by at most
/// `rate * dt` per call. A zero `dt` leaves the value unchanged, so a
/// zero-length tick can never divide or jump.
#[derive(Debug, Clone)]
pub struct SlewRateLimiter {
    rate: f64,
    value: f64,
}

impl SlewRateLimiter {
    pub fn new(rate: f64, initial: f64) -> Self {
        Self { rate, value: initial }
    }

    pub fn calculate(&mut self, target: f64, dt: f64) -> f64 {
        let limit = self.rate * dt.max(0.0);
        self.value += (target - self.value).clamp(-limit, limit);
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn reset(&mut self, value: f64) {
        self.value = value;
    }
}

/// Tunable shaper parameters
///
/// The angle-difference thresholds are empirically tuned; keep them
/// configurable rather than baked in.
#[derive(Debug, Clone)]
pub struct ShaperConfig {
    /// Direction slew rate at unit magnitude (rad/s); the effective rate is
    /// this divided by the current magnitude.
    pub direction_slew_rate: f64,
    /// Translation magnitude slew rate (fraction of full scale per second)
    pub magnitude_slew_rate: f64,
    /// Rotation axis slew rate (fraction of full scale per second)
    pub rotation_slew_rate: f64,
    /// Angle differences below this are ordinary direction adjustments (rad)
    pub adjust_threshold: f64,
    /// Angle differences above this are treated as a reversal request (rad)
    pub reversal_threshold: f64,
    /// Magnitude below this counts as stopped for the reversal handling
    pub magnitude_epsilon: f64,
    /// Direction slew rate used while stopped (effectively instantaneous)
    pub instant_slew_rate: f64,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            direction_slew_rate: 1.2,
            magnitude_slew_rate: 1.8,
            rotation_slew_rate: 2.0,
            adjust_threshold: 0.45 * PI,
            reversal_threshold: 0.85 * PI,
            magnitude_epsilon: 1e-4,
            instant_slew_rate: 500.0,
        }
    }
}

/// Stateful shaper for the three control axes
///
/// Call [`InputShaper::shape`] exactly once per control tick. The held
/// direction/magnitude/rotation are the only state; they are never read back
/// by the caller except for telemetry.
#[derive(Debug, Clone)]
pub struct InputShaper {
    config: ShaperConfig,
    direction: f64,
    magnitude: SlewRateLimiter,
    rotation: SlewRateLimiter,
}

impl InputShaper {
    pub fn new(config: ShaperConfig) -> Self {
        let magnitude = SlewRateLimiter::new(config.magnitude_slew_rate, 0.0);
        let rotation = SlewRateLimiter::new(config.rotation_slew_rate, 0.0);
        Self {
            config,
            direction: 0.0,
            magnitude,
            rotation,
        }
    }

    /// Shape one tick of raw axis samples.
    ///
    /// `x`, `y` and `rot` are stick axes, clamped to [-1, 1]; `dt` is the
    /// elapsed time since the previous tick in seconds (monotonic, >= 0).
    /// Returns the smoothed `(x, y, rot)` command in the same unit scale.
    pub fn shape(&mut self, x: f64, y: f64, rot: f64, dt: f64) -> (f64, f64, f64) {
        let x = x.clamp(-1.0, 1.0);
        let y = y.clamp(-1.0, 1.0);
        let rot = rot.clamp(-1.0, 1.0);
        let dt = dt.max(0.0);

        let input_dir = y.atan2(x);
        let input_mag = (x * x + y * y).sqrt();

        // Limit lateral acceleration: the faster we are moving, the slower
        // the translation vector is allowed to swing.
        let direction_slew = if self.magnitude.value() != 0.0 {
            (self.config.direction_slew_rate / self.magnitude.value()).abs()
        } else {
            self.config.instant_slew_rate
        };

        let angle_diff = angle_difference(input_dir, self.direction);
        if angle_diff < self.config.adjust_threshold {
            self.direction =
                step_towards_circular(self.direction, input_dir, direction_slew * dt);
            self.magnitude.calculate(input_mag, dt);
        } else if angle_diff > self.config.reversal_threshold {
            if self.magnitude.value() > self.config.magnitude_epsilon {
                // Still moving: bleed speed off before the flip
                self.magnitude.calculate(0.0, dt);
            } else {
                self.direction = wrap_angle(self.direction + PI);
                self.magnitude.calculate(input_mag, dt);
            }
        } else {
            // Ambiguous large swing: turn, but only while shedding speed
            self.direction =
                step_towards_circular(self.direction, input_dir, direction_slew * dt);
            self.magnitude.calculate(0.0, dt);
        }

        let mag = self.magnitude.value();
        let rot_cmd = self.rotation.calculate(rot, dt);
        (mag * self.direction.cos(), mag * self.direction.sin(), rot_cmd)
    }

    /// Current held translation direction (rad), for telemetry.
    pub fn direction(&self) -> f64 {
        self.direction
    }

    /// Current held translation magnitude, for telemetry.
    pub fn magnitude(&self) -> f64 {
        self.magnitude.value()
    }

    /// Drop all held state back to rest.
    pub fn reset(&mut self) {
        self.direction = 0.0;
        self.magnitude.reset(0.0);
        self.rotation.reset(0.0);
    }
}
