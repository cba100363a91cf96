// Swerve drive kinematics for a four-module base
// Converts chassis velocities (vx, vy, omega) to per-wheel (speed, angle)
// targets and back.

use super::DriveError;

/// Number of swerve modules on the base
pub const NUM_MODULES: usize = 4;

/// Determinant below this is treated as a degenerate module layout
const SINGULAR_EPS: f64 = 1e-9;

/// Chassis velocity in the robot frame
///
/// `vx` is forward (m/s), `vy` is left (m/s), `omega` is counter-clockwise
/// rotation (rad/s).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisVelocity {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl ChassisVelocity {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }
}

/// Desired state for one wheel module
///
/// `speed` is signed wheel speed along the steering direction. `angle` is the
/// steering direction in radians, counter-clockwise from the robot's +X axis.
/// The module layer picks the equivalent shorter rotation, so the angle here
/// is not required to be wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelTarget {
    pub speed: f64,
    pub angle: f64,
}

impl WheelTarget {
    pub fn new(speed: f64, angle: f64) -> Self {
        Self { speed, angle }
    }
}

/// Fixed mounting offset of one module from the robot's rotation center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleOffset {
    pub x: f64,
    pub y: f64,
}

impl ModuleOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Stateless swerve kinematics
///
/// The inverse map for module i at offset (x_i, y_i) is
///
/// ```text
/// wheel_vx_i = vx - omega * y_i
/// wheel_vy_i = vy + omega * x_i
/// ```
///
/// Stacking the eight wheel-vector components gives an 8x3 linear system
/// `A * [vx, vy, omega] = b`. The forward map solves it least-squares via the
/// pseudoinverse `(A^T A)^-1 A^T`, precomputed at construction. Using the full
/// pseudoinverse (rather than averaging per-wheel estimates) keeps the
/// recovered chassis velocity unbiased when wheels disagree due to slip.
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    offsets: [ModuleOffset; NUM_MODULES],
    // 3x8 pseudoinverse of the stacked inverse-kinematics matrix
    pinv: [[f64; 2 * NUM_MODULES]; 3],
}

impl SwerveKinematics {
    /// Build kinematics for the given module layout.
    ///
    /// Fails with [`DriveError::DegenerateGeometry`] when the offsets do not
    /// span the plane (e.g. all modules collinear through the center), which
    /// would make forward kinematics unsolvable. This is a construction-time
    /// configuration fault, never a runtime condition.
    pub fn new(offsets: [ModuleOffset; NUM_MODULES]) -> Result<Self, DriveError> {
        // Offsets all on one line through the rotation center have every
        // pairwise cross product zero (rank < 2). The normal matrix can stay
        // invertible for such layouts, so this needs its own check.
        let collinear = offsets
            .iter()
            .all(|a| offsets.iter().all(|b| (a.x * b.y - a.y * b.x).abs() < SINGULAR_EPS));
        if collinear {
            return Err(DriveError::DegenerateGeometry);
        }

        // A has two rows per module: [1, 0, -y_i] and [0, 1, x_i]
        let mut a = [[0.0f64; 3]; 2 * NUM_MODULES];
        for (i, off) in offsets.iter().enumerate() {
            a[2 * i] = [1.0, 0.0, -off.y];
            a[2 * i + 1] = [0.0, 1.0, off.x];
        }

        // Normal matrix A^T A (3x3, symmetric)
        let mut ata = [[0.0f64; 3]; 3];
        for row in &a {
            for (r, &rv) in row.iter().enumerate() {
                for (c, &cv) in row.iter().enumerate() {
                    ata[r][c] += rv * cv;
                }
            }
        }

        let inv = invert_3x3(&ata).ok_or(DriveError::DegenerateGeometry)?;

        // pinv = (A^T A)^-1 A^T, shape 3x8
        let mut pinv = [[0.0f64; 2 * NUM_MODULES]; 3];
        for r in 0..3 {
            for c in 0..2 * NUM_MODULES {
                for k in 0..3 {
                    pinv[r][c] += inv[r][k] * a[c][k];
                }
            }
        }

        Ok(Self { offsets, pinv })
    }

    pub fn offsets(&self) -> &[ModuleOffset; NUM_MODULES] {
        &self.offsets
    }

    /// Inverse kinematics: chassis velocity to per-wheel targets.
    ///
    /// Exact for rigid-body planar motion. A wheel whose velocity vector is
    /// zero gets a zero-speed target at angle 0; the module layer holds its
    /// current steering angle in that case.
    pub fn to_wheel_targets(&self, v: ChassisVelocity) -> [WheelTarget; NUM_MODULES] {
        let mut targets = [WheelTarget::default(); NUM_MODULES];
        for (i, off) in self.offsets.iter().enumerate() {
            let wx = v.vx - v.omega * off.y;
            let wy = v.vy + v.omega * off.x;
            let speed = (wx * wx + wy * wy).sqrt();
            let angle = if speed > 0.0 { wy.atan2(wx) } else { 0.0 };
            targets[i] = WheelTarget::new(speed, angle);
        }
        targets
    }

    /// Forward kinematics: per-wheel (magnitude, angle) back to a chassis
    /// velocity.
    ///
    /// The magnitudes may be wheel speeds (yielding a velocity) or distance
    /// deltas over one tick (yielding a body-frame twist); the linear map is
    /// the same either way.
    pub fn to_chassis_velocity(&self, wheels: &[WheelTarget; NUM_MODULES]) -> ChassisVelocity {
        let mut b = [0.0f64; 2 * NUM_MODULES];
        for (i, w) in wheels.iter().enumerate() {
            b[2 * i] = w.speed * w.angle.cos();
            b[2 * i + 1] = w.speed * w.angle.sin();
        }

        let mut out = [0.0f64; 3];
        for (r, row) in self.pinv.iter().enumerate() {
            for (c, &bv) in b.iter().enumerate() {
                out[r] += row[c] * bv;
            }
        }
        ChassisVelocity::new(out[0], out[1], out[2])
    }
}

/// Scale wheel speeds down so none exceeds `max_speed`.
///
/// No-op when every speed is within the limit; otherwise every wheel is
/// scaled by the same factor, preserving the direction and relative ratios of
/// the commanded motion (the chassis path is unchanged, only slowed). Apply
/// to target speeds only, never to measured speeds.
pub fn desaturate_wheel_speeds(targets: &mut [WheelTarget; NUM_MODULES], max_speed: f64) {
    let highest = targets
        .iter()
        .map(|t| t.speed.abs())
        .fold(0.0f64, f64::max);

    if highest > max_speed {
        let scale = max_speed / highest;
        for t in targets.iter_mut() {
            t.speed *= scale;
        }
    }
}

/// Invert a 3x3 matrix by cofactor expansion; `None` when singular.
fn invert_3x3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let c00 = m[1][1] * m[2][2] - m[1][2] * m[2][1];
    let c01 = m[1][2] * m[2][0] - m[1][0] * m[2][2];
    let c02 = m[1][0] * m[2][1] - m[1][1] * m[2][0];

    let det = m[0][0] * c00 + m[0][1] * c01 + m[0][2] * c02;
    if det.abs() < SINGULAR_EPS {
        return None;
    }

    let c10 = m[0][2] * m[2][1] - m[0][1] * m[2][2];
    let c11 = m[0][0] * m[2][2] - m[0][2] * m[2][0];
    let c12 = m[0][1] * m[2][0] - m[0][0] * m[2][1];
    let c20 = m[0][1] * m[1][2] - m[0][2] * m[1][1];
    let c21 = m[0][2] * m[1][0] - m[0][0] * m[1][2];
    let c22 = m[0][0] * m[1][1] - m[0][1] * m[1][0];

    let inv_det = 1.0 / det;
    Some([
        [c00 * inv_det, c10 * inv_det, c20 * inv_det],
        [c01 * inv_det, c11 * inv_det, c21 * inv_det],
        [c02 * inv_det, c12 * inv_det, c22 * inv_det],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    fn square_base() -> SwerveKinematics {
        SwerveKinematics::new([
            ModuleOffset::new(0.3, 0.3),
            ModuleOffset::new(0.3, -0.3),
            ModuleOffset::new(-0.3, 0.3),
            ModuleOffset::new(-0.3, -0.3),
        ])
        .expect("square layout is non-degenerate")
    }

    #[test]
    fn pure_forward_drives_all_wheels_straight() {
        let kin = square_base();
        let targets = kin.to_wheel_targets(ChassisVelocity::new(1.0, 0.0, 0.0));

        for t in &targets {
            assert!((t.speed - 1.0).abs() < EPS, "speed {} should be 1.0", t.speed);
            assert!(t.angle.abs() < EPS, "angle {} should be 0", t.angle);
        }
    }

    #[test]
    fn pure_rotation_wheel_perpendicular_to_radius() {
        let kin = square_base();
        let targets = kin.to_wheel_targets(ChassisVelocity::new(0.0, 0.0, 1.0));

        // Module at (0.3, 0.3): wheel vector = (-0.3, 0.3)
        let expected_speed = 0.3 * 2.0f64.sqrt();
        let expected_angle = 0.3f64.atan2(-0.3);
        assert!((targets[0].speed - expected_speed).abs() < EPS);
        assert!((targets[0].angle - expected_angle).abs() < EPS);

        // Every wheel turns at the same rate in pure rotation
        for t in &targets {
            assert!((t.speed - expected_speed).abs() < EPS);
        }
    }

    #[test]
    fn pure_strafe_points_wheels_sideways() {
        let kin = square_base();
        let targets = kin.to_wheel_targets(ChassisVelocity::new(0.0, 2.0, 0.0));

        for t in &targets {
            assert!((t.speed - 2.0).abs() < EPS);
            assert!((t.angle - FRAC_PI_2).abs() < EPS);
        }
    }

    #[test]
    fn forward_inverts_inverse() {
        let kin = square_base();
        let cases = [
            ChassisVelocity::new(1.0, 0.0, 0.0),
            ChassisVelocity::new(0.0, -1.5, 0.0),
            ChassisVelocity::new(0.0, 0.0, 2.0),
            ChassisVelocity::new(0.7, -0.4, 1.3),
            ChassisVelocity::new(-2.1, 0.9, -0.6),
        ];

        for v in cases {
            let back = kin.to_chassis_velocity(&kin.to_wheel_targets(v));
            assert!((back.vx - v.vx).abs() < 1e-6, "vx {} != {}", back.vx, v.vx);
            assert!((back.vy - v.vy).abs() < 1e-6, "vy {} != {}", back.vy, v.vy);
            assert!(
                (back.omega - v.omega).abs() < 1e-6,
                "omega {} != {}",
                back.omega,
                v.omega
            );
        }
    }

    #[test]
    fn collinear_offsets_rejected() {
        let result = SwerveKinematics::new([
            ModuleOffset::new(0.1, 0.0),
            ModuleOffset::new(0.2, 0.0),
            ModuleOffset::new(-0.1, 0.0),
            ModuleOffset::new(-0.2, 0.0),
        ]);
        assert!(matches!(result, Err(DriveError::DegenerateGeometry)));
    }

    #[test]
    fn diagonal_line_offsets_rejected() {
        // Collinear through the center, but not axis-aligned
        let result = SwerveKinematics::new([
            ModuleOffset::new(0.1, 0.1),
            ModuleOffset::new(0.2, 0.2),
            ModuleOffset::new(-0.1, -0.1),
            ModuleOffset::new(-0.2, -0.2),
        ]);
        assert!(matches!(result, Err(DriveError::DegenerateGeometry)));
    }

    #[test]
    fn coincident_offsets_rejected() {
        let result = SwerveKinematics::new([ModuleOffset::new(0.0, 0.0); NUM_MODULES]);
        assert!(matches!(result, Err(DriveError::DegenerateGeometry)));
    }

    #[test]
    fn desaturation_scales_proportionally() {
        let mut targets = [
            WheelTarget::new(4.0, 0.0),
            WheelTarget::new(2.0, 1.0),
            WheelTarget::new(-8.0, 2.0),
            WheelTarget::new(1.0, 3.0),
        ];
        desaturate_wheel_speeds(&mut targets, 4.0);

        for t in &targets {
            assert!(t.speed.abs() <= 4.0 + EPS);
        }
        // Ratios preserved: every wheel halved
        assert!((targets[0].speed - 2.0).abs() < EPS);
        assert!((targets[1].speed - 1.0).abs() < EPS);
        assert!((targets[2].speed + 4.0).abs() < EPS);
        assert!((targets[3].speed - 0.5).abs() < EPS);
        // Angles untouched
        assert!((targets[1].angle - 1.0).abs() < EPS);
    }

    #[test]
    fn desaturation_is_noop_under_limit() {
        let mut targets = [
            WheelTarget::new(1.0, 0.0),
            WheelTarget::new(2.0, 0.5),
            WheelTarget::new(3.0, 1.0),
            WheelTarget::new(-3.5, 1.5),
        ];
        let before = targets;
        desaturate_wheel_speeds(&mut targets, 4.0);
        assert_eq!(targets, before);
    }

    #[test]
    fn zero_velocity_gives_zero_targets() {
        let kin = square_base();
        let targets = kin.to_wheel_targets(ChassisVelocity::default());
        for t in &targets {
            assert_eq!(t.speed, 0.0);
        }
    }
}
