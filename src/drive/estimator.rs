// Field pose estimation
//
// Dead reckoning integrates per-tick wheel distance deltas through forward
// kinematics into a body-frame twist, composed onto the pose with the
// constant-curvature exponential map. Vision poses arriving from the external
// camera pipeline are gated against the current estimate and blended in with
// a small fixed trust weight; a bad frame is dropped, never an error.

use std::f64::consts::{PI, TAU};

use tracing::debug;

use super::kinematics::{SwerveKinematics, WheelTarget, NUM_MODULES};
use super::module::WheelState;

/// Wrap an angle into (-pi, pi].
fn wrap_to_pi(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

/// Field pose: position in meters, heading in radians counter-clockwise
/// from the field +X axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2 {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose2 {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// Distance to another pose's position.
    pub fn distance_to(&self, other: &Pose2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Compose a body-frame twist onto this pose.
    ///
    /// Exact for constant-curvature motion over the twist: the translation is
    /// taken along the arc swept by `dtheta`, not along a straight chord.
    pub fn exp(&self, twist: Twist2) -> Pose2 {
        let dtheta = twist.dtheta;
        let (sin_t, cos_t) = dtheta.sin_cos();

        // sin(t)/t and (1-cos(t))/t, with series fallback near zero
        let (s, c) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_t / dtheta, (1.0 - cos_t) / dtheta)
        };

        let dx = twist.dx * s - twist.dy * c;
        let dy = twist.dx * c + twist.dy * s;

        let (sin_h, cos_h) = self.heading.sin_cos();
        Pose2::new(
            self.x + dx * cos_h - dy * sin_h,
            self.y + dx * sin_h + dy * cos_h,
            self.heading + dtheta,
        )
    }
}

/// Incremental body-frame motion over one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist2 {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

/// One asynchronous field-pose observation from the vision pipeline
///
/// `trust` overrides the estimator's default blend weight when the pipeline
/// reports per-frame confidence; `None` uses the configured default.
#[derive(Debug, Clone, Copy)]
pub struct VisionObservation {
    pub pose: Pose2,
    pub trust: Option<f64>,
}

/// Estimator tuning
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Vision poses farther than this from the current estimate are dropped
    /// (guards against tag mis-identification and stale frames).
    pub gate_distance: f64,
    /// Default blend weight for accepted vision poses. Deliberately small:
    /// odometry is trusted for continuity, vision only nudges the estimate.
    pub vision_trust: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            gate_distance: 1.0,
            vision_trust: 0.02,
        }
    }
}

/// The authoritative field pose, advanced by odometry and corrected by
/// vision.
///
/// `update` must be called with a strictly advancing sequence of wheel
/// snapshots; re-applying the same snapshot is a caller bug (the delta would
/// be integrated twice). Skipping ticks is safe and reads as idle time.
#[derive(Debug, Clone)]
pub struct PoseEstimator {
    kinematics: SwerveKinematics,
    config: EstimatorConfig,
    pose: Pose2,
    prev: [WheelState; NUM_MODULES],
    vision_rejections: u64,
}

impl PoseEstimator {
    pub fn new(
        kinematics: SwerveKinematics,
        config: EstimatorConfig,
        initial_pose: Pose2,
        initial_snapshot: [WheelState; NUM_MODULES],
    ) -> Self {
        Self {
            kinematics,
            config,
            pose: initial_pose,
            prev: initial_snapshot,
            vision_rejections: 0,
        }
    }

    /// Current pose estimate.
    pub fn pose(&self) -> Pose2 {
        self.pose
    }

    /// Count of vision observations dropped by the gate, for telemetry.
    pub fn vision_rejections(&self) -> u64 {
        self.vision_rejections
    }

    /// Dead-reckoning update from a fresh wheel snapshot.
    pub fn update(&mut self, snapshot: &[WheelState; NUM_MODULES]) {
        let mut deltas = [WheelTarget::default(); NUM_MODULES];
        for (i, (now, before)) in snapshot.iter().zip(self.prev.iter()).enumerate() {
            deltas[i] = WheelTarget::new(now.distance - before.distance, now.angle);
        }

        // Same linear map as velocity forward kinematics, applied to the
        // per-tick distance deltas: the result is a body-frame twist.
        let motion = self.kinematics.to_chassis_velocity(&deltas);
        self.pose = self.pose.exp(Twist2 {
            dx: motion.vx,
            dy: motion.vy,
            dtheta: motion.omega,
        });
        self.prev = *snapshot;
    }

    /// Blend one vision observation into the estimate.
    ///
    /// Returns whether the observation was accepted. Non-finite poses and
    /// poses outside the distance gate are counted and dropped silently;
    /// transient bad frames are expected and must not destabilize control.
    pub fn apply_vision(&mut self, obs: &VisionObservation) -> bool {
        let p = obs.pose;
        if !p.x.is_finite() || !p.y.is_finite() || !p.heading.is_finite() {
            self.vision_rejections += 1;
            debug!("rejected non-finite vision pose: {:?}", p);
            return false;
        }

        let distance = self.pose.distance_to(&p);
        if distance > self.config.gate_distance {
            self.vision_rejections += 1;
            debug!(
                "rejected vision pose {:.2}m from estimate (gate {:.2}m)",
                distance, self.config.gate_distance
            );
            return false;
        }

        let w = obs.trust.unwrap_or(self.config.vision_trust).clamp(0.0, 1.0);
        self.pose.x += w * (p.x - self.pose.x);
        self.pose.y += w * (p.y - self.pose.y);
        self.pose.heading += w * wrap_to_pi(p.heading - self.pose.heading);
        true
    }

    /// Re-seed the estimate from a known pose and the wheel snapshot taken
    /// at the same instant.
    pub fn reset(&mut self, pose: Pose2, snapshot: [WheelState; NUM_MODULES]) {
        self.pose = pose;
        self.prev = snapshot;
    }

    /// Zero the heading component, keeping position.
    pub fn zero_heading(&mut self) {
        self.pose.heading = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::kinematics::ModuleOffset;
    use std::f64::consts::FRAC_PI_2;

    fn square_kinematics() -> SwerveKinematics {
        SwerveKinematics::new([
            ModuleOffset::new(0.3, 0.3),
            ModuleOffset::new(0.3, -0.3),
            ModuleOffset::new(-0.3, 0.3),
            ModuleOffset::new(-0.3, -0.3),
        ])
        .expect("square layout")
    }

    fn estimator() -> PoseEstimator {
        PoseEstimator::new(
            square_kinematics(),
            EstimatorConfig::default(),
            Pose2::default(),
            [WheelState::default(); NUM_MODULES],
        )
    }

    fn snapshot(distance: f64, angle: f64) -> [WheelState; NUM_MODULES] {
        [WheelState {
            distance,
            speed: 0.0,
            angle,
        }; NUM_MODULES]
    }

    #[test]
    fn straight_line_integrates_to_distance() {
        let mut est = estimator();

        // 100 ticks of all wheels rolling straight ahead, 3m total
        for i in 1..=100 {
            est.update(&snapshot(i as f64 * 0.03, 0.0));
        }

        let pose = est.pose();
        assert!((pose.x - 3.0).abs() < 1e-9, "x = {}", pose.x);
        assert!(pose.y.abs() < 1e-9);
        assert!(pose.heading.abs() < 1e-9, "heading must be unchanged");
    }

    #[test]
    fn rotation_in_place_turns_heading_only() {
        let kin = square_kinematics();
        let mut est = estimator();

        // Wheel angles for pure rotation, distances along those directions
        let spin = kin.to_wheel_targets(crate::drive::ChassisVelocity::new(0.0, 0.0, 1.0));
        let mut snap = [WheelState::default(); NUM_MODULES];
        for tick in 1..=50 {
            for (s, t) in snap.iter_mut().zip(spin.iter()) {
                s.distance = t.speed * 0.02 * tick as f64;
                s.angle = t.angle;
            }
            est.update(&snap);
        }

        let pose = est.pose();
        // 50 ticks * 0.02s * 1 rad/s
        assert!((pose.heading - 1.0).abs() < 1e-9, "heading = {}", pose.heading);
        assert!(pose.x.abs() < 1e-9 && pose.y.abs() < 1e-9);
    }

    #[test]
    fn exp_follows_constant_curvature_arc() {
        // Quarter circle of radius 1: arc length pi/2, turn pi/2
        let pose = Pose2::default().exp(Twist2 {
            dx: FRAC_PI_2,
            dy: 0.0,
            dtheta: FRAC_PI_2,
        });
        assert!((pose.x - 1.0).abs() < 1e-9);
        assert!((pose.y - 1.0).abs() < 1e-9);
        assert!((pose.heading - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn idle_snapshot_leaves_pose_alone() {
        let mut est = estimator();
        est.update(&snapshot(1.0, 0.0));
        let pose = est.pose();
        // Same distances again: zero delta, zero motion
        est.update(&snapshot(1.0, 0.0));
        assert_eq!(est.pose(), pose);
    }

    #[test]
    fn far_vision_pose_is_rejected() {
        let mut est = estimator();
        let accepted = est.apply_vision(&VisionObservation {
            pose: Pose2::new(5.0, 0.0, 0.0),
            trust: None,
        });
        assert!(!accepted);
        assert_eq!(est.pose(), Pose2::default());
        assert_eq!(est.vision_rejections(), 1);
    }

    #[test]
    fn non_finite_vision_pose_is_rejected() {
        let mut est = estimator();
        let accepted = est.apply_vision(&VisionObservation {
            pose: Pose2::new(f64::NAN, 0.0, 0.0),
            trust: None,
        });
        assert!(!accepted);
        assert_eq!(est.pose(), Pose2::default());
        assert_eq!(est.vision_rejections(), 1);
    }

    #[test]
    fn accepted_vision_pose_nudges_estimate() {
        let mut est = estimator();
        let accepted = est.apply_vision(&VisionObservation {
            pose: Pose2::new(0.5, 0.0, 0.0),
            trust: None,
        });
        assert!(accepted);
        // Default trust 0.02: move 2% of the way
        assert!((est.pose().x - 0.01).abs() < 1e-12);
        assert_eq!(est.vision_rejections(), 0);
    }

    #[test]
    fn vision_heading_blends_shortest_way() {
        let mut est = estimator();
        est.reset(Pose2::new(0.0, 0.0, 0.1), [WheelState::default(); NUM_MODULES]);

        // Observation at -0.1 rad, expressed as 2pi - 0.1
        let accepted = est.apply_vision(&VisionObservation {
            pose: Pose2::new(0.0, 0.0, TAU - 0.1),
            trust: Some(1.0),
        });
        assert!(accepted);
        assert!((est.pose().heading + 0.1).abs() < 1e-9, "blend must not wind through 2pi");
    }

    #[test]
    fn reset_and_zero_heading() {
        let mut est = estimator();
        est.reset(Pose2::new(2.0, 3.0, 1.0), snapshot(5.0, 0.0));
        assert_eq!(est.pose(), Pose2::new(2.0, 3.0, 1.0));

        // Odometry continues from the reset snapshot, not from zero
        est.update(&snapshot(5.5, 0.0));
        assert!(est.pose().distance_to(&Pose2::new(2.0, 3.0, 1.0)) < 0.51);

        est.zero_heading();
        assert_eq!(est.pose().heading, 0.0);
    }
}
