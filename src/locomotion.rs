use bevy::prelude::*;
use bevy_legwork_physics_integration_layer::data_for_backends::{
    LegworkCastShape, LegworkGroundHit, LegworkGroundSensor, LegworkMotor, LegworkProbe,
    LegworkRigidBodyTracker, LegworkToggle,
};
use bevy_legwork_physics_integration_layer::math::{
    AdjustPrecision, Float, Quaternion, Vector2, Vector3,
};

use crate::util::look_rotation;
use crate::validation::{report_validation, LegworkConfigError};

/// Moves a character's rigid body by floating it above the ground and pushing it around.
///
/// The body hovers at [`float_height`](Self::float_height) above whatever the sphere probe under
/// its collider finds, and falls with [`gravity`](Self::gravity) when it finds nothing. The
/// physics engine's own gravity is disabled for the body by the backend.
///
/// Movement input is read from [`LegworkMoveInput`], relative to the camera.
#[derive(Component, Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[require(
    LegworkMotor,
    LegworkRigidBodyTracker,
    LegworkGroundSensor,
    LegworkMoveInput
)]
pub struct LegworkController {
    /// The force applied in the direction of the movement input, at full input.
    pub max_force: Float,

    /// The body's speed is clamped to this after every physics step.
    pub max_velocity: Float,

    /// How fast the body turns toward the movement direction, as the fraction of the way it covers
    /// per second.
    pub rotate_smooth: Float,

    /// The vertical force applied while the probe finds no ground. Should be negative.
    pub gravity: Float,

    /// The stiffness of the spring that keeps the body hovering.
    pub float_force: Float,

    /// The hover height, measured as the distance the probe sphere travels until it hits the
    /// ground.
    pub float_height: Float,

    /// The center of the body's collider, relative to the body. The ground probe is cast from
    /// here.
    ///
    /// This is not read from the collider. If it does not match, the body hovers higher or lower
    /// than [`float_height`](Self::float_height) by the difference along the vertical axis.
    pub collider_center: Vector3,

    /// The radius of the probe sphere. Should match the radius of the body's (sphere) collider.
    ///
    /// This is not read from the collider. A probe sphere smaller than the collider lets the body
    /// sink by the difference before the spring sees the ground, and a larger one lifts it.
    pub collider_radius: Float,

    /// Collision layers (as a bit mask) the body can hover over.
    pub ground_mask: u32,

    /// How far down the probe sphere travels.
    pub probe_distance: Float,

    /// The camera that movement input is relative to.
    ///
    /// If `None`, the only entity with [`LegworkCamera`] is used.
    pub camera: Option<Entity>,
}

impl Default for LegworkController {
    fn default() -> Self {
        Self {
            max_force: 1.0,
            max_velocity: 5.0,
            rotate_smooth: 1.0,
            gravity: -10.0,
            float_force: 5.0,
            float_height: 0.2,
            collider_center: Vector3::ZERO,
            collider_radius: 0.5,
            ground_mask: u32::MAX,
            probe_distance: 1.0,
            camera: None,
        }
    }
}

/// The movement the player asks for. `y` is forward and `x` is right, relative to the camera.
///
/// Legwork only reads this component. Whatever handles input should write it.
#[derive(Component, Debug, Default, Clone, Copy, PartialEq)]
pub struct LegworkMoveInput(pub Vector2);

/// Marks the camera that movement input is relative to, for controllers that don't set
/// [`LegworkController::camera`].
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct LegworkCamera;

/// The result of a physics step worth of locomotion logic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegworkLocomotionCommand {
    pub force: Vector3,
    /// The rotation the body should turn to, if it is moving.
    pub facing: Option<Quaternion>,
}

impl LegworkController {
    /// The vertical force: a spring toward the hover height when grounded, gravity otherwise.
    pub fn vertical_force(&self, ground: Option<&LegworkGroundHit>) -> Vector3 {
        match ground {
            Some(hit) => Vector3::Y * ((self.float_height - hit.distance) * self.float_force),
            None => Vector3::Y * self.gravity,
        }
    }

    /// The direction the body should be pushed, given the camera's axes and the normal of the
    /// ground under the body.
    ///
    /// The camera axes are flattened onto the ground, so that looking down at the character does
    /// not push it into the ground. Returns `None` when there is no input.
    pub fn move_direction(
        &self,
        input: Vector2,
        camera_forward: Vector3,
        camera_right: Vector3,
        ground_normal: Vector3,
    ) -> Option<Vector3> {
        if input == Vector2::ZERO {
            return None;
        }
        let project_on_ground =
            |vector: Vector3| (vector - ground_normal * vector.dot(ground_normal)).normalize_or_zero();
        let direction =
            project_on_ground(camera_forward) * input.y + project_on_ground(camera_right) * input.x;
        (direction != Vector3::ZERO).then_some(direction)
    }

    /// Compute the force and facing for one physics step.
    ///
    /// `camera_axes` is the camera's forward and right. Without them movement input is ignored,
    /// but the body still floats.
    pub fn command(
        &self,
        input: Vector2,
        camera_axes: Option<(Vector3, Vector3)>,
        ground: Option<&LegworkGroundHit>,
        current_rotation: Quaternion,
        frame_duration: Float,
    ) -> LegworkLocomotionCommand {
        let mut force = self.vertical_force(ground);
        let ground_normal = ground.map_or(Vector3::Y, |hit| hit.normal.adjust_precision());

        let Some(direction) = camera_axes.and_then(|(camera_forward, camera_right)| {
            self.move_direction(input, camera_forward, camera_right, ground_normal)
        }) else {
            return LegworkLocomotionCommand {
                force,
                facing: None,
            };
        };
        force += direction * self.max_force;

        let facing = look_rotation(direction, Vector3::Y).map(|target| {
            let factor = (self.rotate_smooth * frame_duration).clamp(0.0, 1.0);
            current_rotation.slerp(target, factor)
        });
        LegworkLocomotionCommand { force, facing }
    }

    /// Point the probe at the ground under the body's collider.
    pub fn aim_probe(&self, tracker: &LegworkRigidBodyTracker, probe: &mut LegworkProbe) {
        probe.cast_origin = tracker.translation + tracker.rotation * self.collider_center;
        probe.cast_direction = Dir3::NEG_Y;
        probe.cast_range = self.probe_distance;
        probe.cast_shape = LegworkCastShape::Sphere {
            radius: self.collider_radius,
        };
        probe.ground_mask = self.ground_mask;
    }

    fn resolve_camera(
        &self,
        marked_camera: Option<Entity>,
    ) -> Result<Entity, LegworkConfigError> {
        self.camera
            .or(marked_camera)
            .ok_or(LegworkConfigError::MissingCamera)
    }
}

pub(crate) fn validate_controllers_system(
    query: Query<(Entity, &LegworkController), Added<LegworkController>>,
    marked_cameras_query: Query<Entity, With<LegworkCamera>>,
) {
    let marked_camera = marked_cameras_query.single().ok();
    for (entity, controller) in query.iter() {
        let result = controller.resolve_camera(marked_camera).map(|_| Vec::new());
        report_validation(entity, "controller", &result);
    }
}

pub(crate) fn aim_ground_sensors_system(
    mut query: Query<(
        &LegworkController,
        &LegworkRigidBodyTracker,
        &mut LegworkGroundSensor,
        Option<&LegworkToggle>,
    )>,
) {
    for (controller, tracker, mut sensor, legwork_toggle) in query.iter_mut() {
        match legwork_toggle.copied().unwrap_or_default() {
            LegworkToggle::Disabled => {
                sensor.0.deactivate();
                continue;
            }
            LegworkToggle::SenseOnly => {}
            LegworkToggle::Enabled => {}
        }
        controller.aim_probe(tracker, &mut sensor.0);
    }
}

#[allow(clippy::type_complexity)]
pub(crate) fn apply_controllers_system(
    time: Res<Time>,
    mut query: Query<(
        &LegworkController,
        &LegworkRigidBodyTracker,
        &LegworkGroundSensor,
        &LegworkMoveInput,
        &mut LegworkMotor,
        Option<&LegworkToggle>,
    )>,
    marked_cameras_query: Query<Entity, With<LegworkCamera>>,
    cameras_query: Query<&GlobalTransform>,
) {
    let frame_duration = time.delta_secs().adjust_precision();
    if frame_duration == 0.0 {
        return;
    }
    let marked_camera = marked_cameras_query.single().ok();
    for (controller, tracker, sensor, move_input, mut motor, legwork_toggle) in query.iter_mut() {
        match legwork_toggle.copied().unwrap_or_default() {
            LegworkToggle::Disabled => continue,
            LegworkToggle::SenseOnly => {}
            LegworkToggle::Enabled => {}
        }

        let camera_axes = controller
            .resolve_camera(marked_camera)
            .ok()
            .and_then(|camera| cameras_query.get(camera).ok())
            .map(|camera| {
                (
                    camera.forward().adjust_precision(),
                    camera.right().adjust_precision(),
                )
            });

        let command = controller.command(
            move_input.0,
            camera_axes,
            sensor.0.output.as_ref(),
            tracker.rotation,
            frame_duration,
        );
        motor.force = command.force;
        motor.desired_rotation = command.facing;
        motor.max_speed = Some(controller.max_velocity.max(0.0));
    }
}
