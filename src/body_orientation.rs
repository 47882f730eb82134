use bevy::prelude::*;
use bevy_legwork_physics_integration_layer::data_for_backends::{
    LegworkRigidBodyTracker, LegworkToggle,
};
use bevy_legwork_physics_integration_layer::math::{AdjustPrecision, Float, Quaternion, Vector3};

use crate::pose::LegworkPoseSink;
use crate::step_planner::LegworkStepPlanner;
use crate::util::look_rotation;
use crate::validation::{report_validation, LegworkConfigError, LegworkConfigWarning};

/// Keeps the character's body leveled over its feet, leaning it into accelerations.
///
/// Must be placed on the same entity as the [`LegworkStepPlanner`], which must have at least 3
/// legs. The IK targets of the first three legs - front-left, front-right and rear, in that order -
/// form the support triangle the body is leveled against.
#[derive(Component, Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LegworkBodyOrientation {
    /// The entity whose `Transform` is moved and rotated. Must not have a parent.
    pub body: Entity,

    /// The maximum lean angle, in degrees.
    pub max_angle: Float,

    /// Degrees of lean per unit of squared acceleration.
    pub angle_smooth: Float,

    /// How fast the body moves toward the support triangle, as the fraction of the way it covers
    /// per second.
    pub position_smooth: Float,

    /// How fast the body turns toward its target rotation, as the fraction of the way it covers
    /// per second.
    pub rotation_smooth: Float,

    /// How high above the center of the support triangle the body should be.
    pub height_offset: Float,
}

impl LegworkBodyOrientation {
    pub fn new(body: Entity) -> Self {
        Self {
            body,
            max_angle: 30.0,
            angle_smooth: 10.0,
            position_smooth: 1.0,
            rotation_smooth: 1.0,
            height_offset: 0.0,
        }
    }

    pub fn validate(&self, leg_count: usize) -> Result<Vec<LegworkConfigWarning>, LegworkConfigError> {
        if leg_count < 3 {
            return Err(LegworkConfigError::TooFewLegsForBodyOrientation { count: leg_count });
        }
        Ok(Vec::new())
    }

    /// The lean caused by `acceleration`, for a body whose level rotation is `level`.
    ///
    /// The angle grows with the square of the acceleration, up to [`max_angle`](Self::max_angle).
    pub fn tilt(&self, level: Quaternion, acceleration: Vector3) -> Quaternion {
        let max_angle = self.max_angle.abs();
        let angle = (self.angle_smooth * acceleration.length_squared())
            .max(-max_angle)
            .min(max_angle);
        let Some(axis) = (level * Vector3::Y.cross(acceleration)).try_normalize() else {
            return Quaternion::IDENTITY;
        };
        Quaternion::from_axis_angle(axis, angle.to_radians())
    }

    /// Where the body should be and how it should be rotated.
    ///
    /// Returns `None` when the body's right axis is parallel to the support normal.
    pub fn target_pose(
        &self,
        frame: &LegworkSupportFrame,
        body_rotation: Quaternion,
        acceleration: Vector3,
    ) -> Option<(Vector3, Quaternion)> {
        let level = frame.level_rotation(body_rotation * Vector3::X)?;
        let rotation = level * self.tilt(level, acceleration);
        let position = frame.center + frame.up * self.height_offset;
        Some((position, rotation))
    }

    /// Move the body in `sink` one frame toward the target pose.
    pub fn smooth_toward(
        &self,
        sink: &mut impl LegworkPoseSink,
        target_position: Vector3,
        target_rotation: Quaternion,
        frame_duration: Float,
    ) {
        let position_factor = (self.position_smooth * frame_duration).clamp(0.0, 1.0);
        let rotation_factor = (self.rotation_smooth * frame_duration).clamp(0.0, 1.0);
        let position = sink.position().lerp(target_position, position_factor);
        let rotation = sink.rotation().slerp(target_rotation, rotation_factor);
        sink.set_position(position);
        sink.set_rotation(rotation);
    }
}

/// The plane the feet stand on, as seen from the body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegworkSupportFrame {
    /// The centroid of the support triangle.
    pub center: Vector3,
    /// The normal of the support triangle. Always a unit vector.
    pub up: Vector3,
}

impl LegworkSupportFrame {
    /// Returns `None` if the triangle is degenerate.
    pub fn from_triangle(front_left: Vector3, front_right: Vector3, rear: Vector3) -> Option<Self> {
        let up = (front_right - rear).cross(front_left - rear).try_normalize()?;
        Some(Self {
            center: (front_left + front_right + rear) / 3.0,
            up,
        })
    }

    /// A rotation whose up is the support normal, keeping `body_right` as its lateral axis.
    pub fn level_rotation(&self, body_right: Vector3) -> Option<Quaternion> {
        let forward = self.up.cross(body_right);
        look_rotation(forward, self.up)
    }
}

pub(crate) fn validate_body_orientations_system(
    query: Query<
        (Entity, &LegworkBodyOrientation, &LegworkStepPlanner),
        Added<LegworkBodyOrientation>,
    >,
) {
    for (entity, body_orientation, planner) in query.iter() {
        report_validation(
            entity,
            "body orientation",
            &body_orientation.validate(planner.legs.len()),
        );
    }
}

#[allow(clippy::type_complexity)]
pub(crate) fn apply_body_orientations_system(
    time: Res<Time>,
    query: Query<(
        Entity,
        &LegworkBodyOrientation,
        &LegworkStepPlanner,
        &LegworkRigidBodyTracker,
        Option<&LegworkToggle>,
    )>,
    mut poses_query: Query<&mut Transform>,
) {
    let frame_duration = time.delta_secs().adjust_precision();
    if frame_duration == 0.0 {
        return;
    }
    for (entity, body_orientation, planner, tracker, legwork_toggle) in query.iter() {
        match legwork_toggle.copied().unwrap_or_default() {
            LegworkToggle::Disabled => continue,
            LegworkToggle::SenseOnly => {}
            LegworkToggle::Enabled => {}
        }
        let [front_left, front_right, rear, ..] = planner.legs.as_slice() else {
            continue;
        };
        let (Ok(front_left), Ok(front_right), Ok(rear)) = (
            poses_query.get(front_left.ik_target),
            poses_query.get(front_right.ik_target),
            poses_query.get(rear.ik_target),
        ) else {
            bevy::log::warn_once!("{entity}: the IK targets of the support legs have no transforms");
            continue;
        };
        let Some(frame) = LegworkSupportFrame::from_triangle(
            front_left.position(),
            front_right.position(),
            rear.position(),
        ) else {
            debug!("{entity}: the support triangle is degenerate");
            continue;
        };

        let Ok(mut body) = poses_query.get_mut(body_orientation.body) else {
            bevy::log::warn_once!("{entity}: the body has no transform");
            continue;
        };
        let Some((target_position, target_rotation)) =
            body_orientation.target_pose(&frame, body.rotation(), tracker.acceleration)
        else {
            debug!("{entity}: the body's right axis is parallel to the support normal");
            continue;
        };
        body_orientation.smooth_toward(
            body.as_mut(),
            target_position,
            target_rotation,
            frame_duration,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level_triangle(scale: Float) -> LegworkSupportFrame {
        LegworkSupportFrame::from_triangle(
            Vector3::new(-1.0, 0.0, -1.0) * scale,
            Vector3::new(1.0, 0.0, -1.0) * scale,
            Vector3::new(0.0, 0.0, 1.0) * scale,
        )
        .unwrap()
    }

    #[test]
    fn support_up_points_up_for_level_ground() {
        let frame = level_triangle(1.0);
        assert!(frame.up.abs_diff_eq(Vector3::Y, 1e-6));
        assert!(frame.center.abs_diff_eq(Vector3::new(0.0, 0.0, -1.0 / 3.0), 1e-6));
    }

    #[test]
    fn support_up_is_scale_invariant() {
        let pl = Vector3::new(-0.8, 0.3, -1.1);
        let pr = Vector3::new(0.9, -0.2, -0.9);
        let pb = Vector3::new(0.1, 0.1, 1.2);
        let frame = LegworkSupportFrame::from_triangle(pl, pr, pb).unwrap();
        for scale in [0.01, 0.5, 3.0, 100.0] {
            let scaled = LegworkSupportFrame::from_triangle(pl * scale, pr * scale, pb * scale)
                .unwrap();
            assert!(scaled.up.abs_diff_eq(frame.up, 1e-5));
        }
    }

    #[test]
    fn swapping_front_feet_flips_up() {
        let pl = Vector3::new(-1.0, 0.2, -1.0);
        let pr = Vector3::new(1.0, 0.0, -1.0);
        let pb = Vector3::new(0.0, -0.1, 1.0);
        let frame = LegworkSupportFrame::from_triangle(pl, pr, pb).unwrap();
        let swapped = LegworkSupportFrame::from_triangle(pr, pl, pb).unwrap();
        assert!(swapped.up.abs_diff_eq(-frame.up, 1e-6));
    }

    #[test]
    fn degenerate_triangle_is_rejected() {
        assert!(LegworkSupportFrame::from_triangle(
            Vector3::ZERO,
            Vector3::X,
            Vector3::X * 2.0
        )
        .is_none());
        assert!(LegworkSupportFrame::from_triangle(Vector3::ONE, Vector3::ONE, Vector3::ONE)
            .is_none());
    }

    #[test]
    fn level_rotation_keeps_the_body_facing() {
        let frame = level_triangle(1.0);
        let level = frame.level_rotation(Vector3::X).unwrap();
        assert!(level.abs_diff_eq(Quaternion::IDENTITY, 1e-6));
        assert!(frame.level_rotation(Vector3::Y).is_none());
    }

    #[test]
    fn needs_three_legs() {
        let body_orientation = LegworkBodyOrientation::new(Entity::PLACEHOLDER);
        assert_eq!(
            body_orientation.validate(2),
            Err(LegworkConfigError::TooFewLegsForBodyOrientation { count: 2 })
        );
        assert_eq!(
            body_orientation.validate(0),
            Err(LegworkConfigError::TooFewLegsForBodyOrientation { count: 0 })
        );
        assert_eq!(body_orientation.validate(3), Ok(vec![]));
        assert_eq!(body_orientation.validate(6), Ok(vec![]));
    }

    #[test]
    fn no_acceleration_no_tilt() {
        let body_orientation = LegworkBodyOrientation::new(Entity::PLACEHOLDER);
        assert_eq!(
            body_orientation.tilt(Quaternion::IDENTITY, Vector3::ZERO),
            Quaternion::IDENTITY
        );
        // Purely vertical acceleration has no horizontal direction to lean toward.
        assert_eq!(
            body_orientation.tilt(Quaternion::IDENTITY, Vector3::new(0.0, 3.0, 0.0)),
            Quaternion::IDENTITY
        );
    }

    #[test]
    fn tilt_leans_into_acceleration() {
        let body_orientation = LegworkBodyOrientation::new(Entity::PLACEHOLDER);
        let tilt = body_orientation.tilt(Quaternion::IDENTITY, Vector3::new(1.0, 0.0, 0.0));
        let tilted_up = tilt * Vector3::Y;
        assert!(0.0 < tilted_up.x);
        assert!(tilted_up.z.abs() < 1e-6);
        assert!((tilted_up.angle_between(Vector3::Y).to_degrees() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn tilt_is_clamped() {
        let body_orientation = LegworkBodyOrientation::new(Entity::PLACEHOLDER);
        for magnitude in [2.0, 10.0, 1000.0] {
            let tilt =
                body_orientation.tilt(Quaternion::IDENTITY, Vector3::new(0.0, 0.0, -magnitude));
            let angle = (tilt * Vector3::Y).angle_between(Vector3::Y).to_degrees();
            assert!((angle - 30.0).abs() < 1e-3);
        }
    }

    #[test]
    fn target_pose_adds_height_offset_along_support_normal() {
        let body_orientation = LegworkBodyOrientation {
            height_offset: 0.5,
            ..LegworkBodyOrientation::new(Entity::PLACEHOLDER)
        };
        let frame = level_triangle(1.0);
        let (position, rotation) = body_orientation
            .target_pose(&frame, Quaternion::IDENTITY, Vector3::ZERO)
            .unwrap();
        assert!(position.abs_diff_eq(Vector3::new(0.0, 0.5, -1.0 / 3.0), 1e-6));
        assert!(rotation.abs_diff_eq(Quaternion::IDENTITY, 1e-6));
    }

    #[test]
    fn smoothing_is_partial_and_clamped() {
        let body_orientation = LegworkBodyOrientation {
            position_smooth: 2.0,
            ..LegworkBodyOrientation::new(Entity::PLACEHOLDER)
        };
        let mut transform = Transform::default();
        body_orientation.smooth_toward(
            &mut transform,
            Vector3::new(1.0, 0.0, 0.0),
            Quaternion::IDENTITY,
            0.25,
        );
        assert!((transform.translation.x - 0.5).abs() < 1e-6);

        // A long frame does not overshoot.
        body_orientation.smooth_toward(
            &mut transform,
            Vector3::new(1.0, 0.0, 0.0),
            Quaternion::IDENTITY,
            10.0,
        );
        assert!((transform.translation.x - 1.0).abs() < 1e-6);
    }
}
