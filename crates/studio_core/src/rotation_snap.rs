//! Rounding of held-object rotation to the preferred build increments.
//!
//! Grabbed pieces snap their rotation baseline to 45 degree steps per axis
//! so manual rotation always lands on clean seams.

use bevy::prelude::*;

/// Preferred rotation increment, in degrees.
pub const ROTATION_STEP_DEGREES: f32 = 45.0;

/// Round one Euler axis value (degrees) to the nearest rotation step.
///
/// Works on the remainder of the angle: a remainder below half a step
/// rounds down, above half a step rounds up, and an angle already on a
/// boundary is returned unchanged, which makes the rounding idempotent.
pub fn round_angle_degrees(angle: f32) -> f32 {
    let step = ROTATION_STEP_DEGREES;
    let half = step / 2.0;
    let rem = angle % step;

    if rem.abs() < 0.01 {
        // Already on a step boundary (up to float noise).
        angle - rem
    } else if rem < -half {
        angle + (-step - rem)
    } else if rem > -half && rem < half {
        angle - rem
    } else {
        angle + (step - rem)
    }
}

/// Round a (pitch, yaw, roll) triple, in degrees, per axis.
pub fn round_rotation_degrees(pitch: f32, yaw: f32, roll: f32) -> (f32, f32, f32) {
    (
        round_angle_degrees(pitch),
        round_angle_degrees(yaw),
        round_angle_degrees(roll),
    )
}

/// Round a world rotation to the nearest stepped orientation.
pub fn snap_rotation(rotation: Quat) -> Quat {
    let (yaw, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
    let (pitch, yaw, roll) = round_rotation_degrees(
        pitch.to_degrees(),
        yaw.to_degrees(),
        roll.to_degrees(),
    );
    Quat::from_euler(
        EulerRot::YXZ,
        yaw.to_radians(),
        pitch.to_radians(),
        roll.to_radians(),
    )
}
