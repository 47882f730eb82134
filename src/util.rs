use bevy_legwork_physics_integration_layer::math::{Float, Matrix3, Quaternion, Vector3};

/// Move `current` toward `target` like a critically damped spring.
///
/// `velocity` is the spring's state and must be carried between calls. `smooth_time` is roughly
/// the time it takes to reach the target. The result never overshoots the target.
///
/// This is the approximation from Game Programming Gems 4, chapter 1.10.
pub fn smooth_damp(
    current: Vector3,
    target: Vector3,
    velocity: &mut Vector3,
    smooth_time: Float,
    frame_duration: Float,
) -> Vector3 {
    if frame_duration <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(0.0001);
    let omega = 2.0 / smooth_time;
    let x = omega * frame_duration;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + omega * change) * frame_duration;
    *velocity = (*velocity - omega * temp) * decay;
    let output = target + (change + temp) * decay;

    if 0.0 <= (target - current).dot(output - target) {
        *velocity = Vector3::ZERO;
        return target;
    }
    output
}

/// The height factor of a step at progress `p`: a parabola that is zero at both ends and 1.0 at
/// the middle.
pub fn step_arc(p: Float) -> Float {
    4.0 * p * (1.0 - p)
}

/// Linear interpolation that does not clamp `t` - values outside `[0, 1]` extrapolate.
pub fn lerp_unclamped(a: Float, b: Float, t: Float) -> Float {
    a + (b - a) * t
}

/// A rotation that points the negative Z axis toward `forward` and keeps the Y axis as close as
/// possible to `up`.
///
/// Returns `None` if `forward` is zero or parallel to `up`.
pub fn look_rotation(forward: Vector3, up: Vector3) -> Option<Quaternion> {
    let back = -forward.try_normalize()?;
    let right = up.cross(back).try_normalize()?;
    let up = back.cross(right);
    Some(Quaternion::from_mat3(&Matrix3::from_cols(right, up, back)))
}
