use crate::math::{Float, Quaternion, Vector3};
use bevy::prelude::*;

/// Allows disabling Legwork for a specific entity.
///
/// This can be used to let some other system temporarily take control over a character.
///
/// This component is not mandatory - if omitted, Legwork will just assume it is enabled for that
/// entity.
#[derive(Component, Default, Debug, PartialEq, Eq, Clone, Copy)]
pub enum LegworkToggle {
    /// Do not update the sensors, and do not apply forces from the motor.
    ///
    /// Step transitions that are in flight are cancelled, leaving the feet where they are.
    Disabled,
    /// Update the sensors and run the logic, but do not apply forces from the motor.
    SenseOnly,
    #[default]
    /// The backend behaves normally - it updates the sensors and applies forces from the motor.
    Enabled,
}

/// Newtonian state of the rigid body.
///
/// Legwork takes the position and rotation of the rigid body from its `GlobalTransform`, but the
/// velocity is dependent on the physics engine. The physics backend is responsible for updating
/// this component during [`LegworkPipelineSystems::Trackers`](crate::LegworkPipelineSystems) of
/// the fixed schedule, using [`record_velocity`](Self::record_velocity).
#[derive(Component, Debug, Clone)]
pub struct LegworkRigidBodyTracker {
    pub translation: Vector3,
    pub rotation: Quaternion,
    pub velocity: Vector3,
    /// The velocity at the previous physics step, or `None` before the first one.
    pub previous_velocity: Option<Vector3>,
    /// Linear acceleration, sampled once per physics step as the velocity difference divided by
    /// the step duration.
    pub acceleration: Vector3,
}

impl Default for LegworkRigidBodyTracker {
    fn default() -> Self {
        Self {
            translation: Vector3::ZERO,
            rotation: Quaternion::IDENTITY,
            velocity: Vector3::ZERO,
            previous_velocity: None,
            acceleration: Vector3::ZERO,
        }
    }
}

impl LegworkRigidBodyTracker {
    /// Record the velocity of a new physics step and derive the acceleration from it.
    ///
    /// The first recorded velocity only seeds the history, so the acceleration stays zero.
    pub fn record_velocity(&mut self, velocity: Vector3, step_duration: Float) {
        if let Some(previous_velocity) = self.previous_velocity {
            if 0.0 < step_duration {
                self.acceleration = (velocity - previous_velocity) / step_duration;
            }
        }
        self.previous_velocity = Some(velocity);
        self.velocity = velocity;
    }

    /// Drop the velocity history, so that the next recorded velocity only seeds it again.
    ///
    /// Backends call this while Legwork is disabled for the entity, because the velocity they stop
    /// sampling keeps changing.
    pub fn forget_history(&mut self) {
        self.previous_velocity = None;
        self.acceleration = Vector3::ZERO;
    }
}

/// The shape that a [`LegworkProbe`] sweeps along its cast direction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum LegworkCastShape {
    Ray,
    Sphere { radius: Float },
}

/// The nearest ground hit of a [`LegworkProbe`].
#[derive(Debug, Clone, PartialEq)]
pub struct LegworkGroundHit {
    /// The entity of the collider that was hit.
    pub entity: Entity,
    /// The hit point, in world space.
    pub point: Vector3,
    /// The normal of the ground surface at the hit point.
    pub normal: Dir3,
    /// The distance travelled along the cast direction until the hit.
    pub distance: Float,
}

/// A downward cast against the ground, requested by Legwork and performed by the backend.
///
/// Unlike most sensors, the origin is given in world space - Legwork aims the probe itself.
#[derive(Debug, Clone)]
pub struct LegworkProbe {
    pub cast_origin: Vector3,
    pub cast_direction: Dir3,
    /// Legwork will update this field according to its need. A non-positive range means the probe
    /// is not active this tick, and the backend should clear the output without casting.
    pub cast_range: Float,
    pub cast_shape: LegworkCastShape,
    /// Collision layers (as a bit mask) that count as ground.
    pub ground_mask: u32,
    pub output: Option<LegworkGroundHit>,
}

impl Default for LegworkProbe {
    fn default() -> Self {
        Self {
            cast_origin: Vector3::ZERO,
            cast_direction: Dir3::NEG_Y,
            cast_range: 0.0,
            cast_shape: LegworkCastShape::Ray,
            ground_mask: u32::MAX,
            output: None,
        }
    }
}

impl LegworkProbe {
    pub fn is_active(&self) -> bool {
        0.0 < self.cast_range
    }

    /// Stop casting, and forget the previous output.
    pub fn deactivate(&mut self) {
        self.cast_range = 0.0;
        self.output = None;
    }
}

/// The probe that checks the ground under the character's body.
///
/// Cast by the backend once per physics step.
#[derive(Component, Debug, Default, Clone)]
pub struct LegworkGroundSensor(pub LegworkProbe);

/// The probe that samples the ground under the leg the step planner currently considers.
///
/// Cast by the backend once per frame.
#[derive(Component, Debug, Default, Clone)]
pub struct LegworkFootSensor(pub LegworkProbe);

/// Instructions on how to move the rigid body.
///
/// The physics backend is responsible for reading this component during
/// [`LegworkPipelineSystems::Motors`](crate::LegworkPipelineSystems) and apply it.
///
/// Entities with this component should not be affected by the physics engine's gravity - Legwork
/// applies its own gravity as part of the [`force`](Self::force). The backends enforce this.
#[derive(Component, Default, Debug, Clone)]
pub struct LegworkMotor {
    /// The force to apply to the rigid body during the next physics step.
    pub force: Vector3,
    /// If set, the rotation the rigid body should be turned to.
    pub desired_rotation: Option<Quaternion>,
    /// If set, the rigid body's speed will be clamped to it.
    pub max_speed: Option<Float>,
}

impl LegworkMotor {
    /// Apply [`max_speed`](Self::max_speed) to a velocity.
    pub fn clamp_velocity(&self, velocity: Vector3) -> Vector3 {
        match self.max_speed {
            Some(max_speed) => velocity.clamp_length_max(max_speed.max(0.0)),
            None => velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_velocity_sample_does_not_produce_acceleration() {
        let mut tracker = LegworkRigidBodyTracker::default();
        tracker.record_velocity(Vector3::new(3.0, 0.0, 0.0), 0.02);
        assert_eq!(tracker.acceleration, Vector3::ZERO);
        assert_eq!(tracker.velocity, Vector3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn acceleration_is_velocity_difference_over_step() {
        let mut tracker = LegworkRigidBodyTracker::default();
        tracker.record_velocity(Vector3::ZERO, 0.5);
        tracker.record_velocity(Vector3::new(0.0, 0.0, -2.0), 0.5);
        assert_eq!(tracker.acceleration, Vector3::new(0.0, 0.0, -4.0));
        tracker.record_velocity(Vector3::new(0.0, 0.0, -2.0), 0.5);
        assert_eq!(tracker.acceleration, Vector3::ZERO);
    }

    #[test]
    fn forgetting_history_reseeds_acceleration() {
        let mut tracker = LegworkRigidBodyTracker::default();
        tracker.record_velocity(Vector3::ZERO, 0.02);
        tracker.record_velocity(Vector3::new(1.0, 0.0, 0.0), 0.02);
        assert_eq!(tracker.acceleration, Vector3::new(50.0, 0.0, 0.0));

        tracker.forget_history();
        assert_eq!(tracker.acceleration, Vector3::ZERO);
        // A big jump in velocity after a pause is not an acceleration.
        tracker.record_velocity(Vector3::new(0.0, 0.0, 8.0), 0.02);
        assert_eq!(tracker.acceleration, Vector3::ZERO);
        tracker.record_velocity(Vector3::new(0.0, 0.0, 8.0), 0.02);
        assert_eq!(tracker.acceleration, Vector3::ZERO);
    }

    #[test]
    fn motor_clamp_never_exceeds_max_speed() {
        let motor = LegworkMotor {
            max_speed: Some(5.0),
            ..Default::default()
        };
        // Deterministic spread of velocities, many of them well past the cap.
        let mut seed: u32 = 12345;
        let mut next = || {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            (seed >> 8) as Float / (1 << 24) as Float * 40.0 - 20.0
        };
        for _ in 0..1000 {
            let velocity = Vector3::new(next(), next(), next());
            let clamped = motor.clamp_velocity(velocity);
            assert!(clamped.length() <= 5.0 + 1e-4);
            if velocity.length() <= 5.0 {
                assert_eq!(clamped, velocity);
            } else {
                assert!(clamped.normalize().abs_diff_eq(velocity.normalize(), 1e-4));
            }
        }
    }

    #[test]
    fn motor_without_max_speed_does_not_clamp() {
        let motor = LegworkMotor::default();
        let velocity = Vector3::new(100.0, -50.0, 3.0);
        assert_eq!(motor.clamp_velocity(velocity), velocity);

        let stopped = LegworkMotor {
            max_speed: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(stopped.clamp_velocity(velocity), Vector3::ZERO);
    }

    #[test]
    fn deactivated_probe_forgets_output() {
        let mut probe = LegworkProbe {
            cast_range: 2.0,
            output: Some(LegworkGroundHit {
                entity: Entity::PLACEHOLDER,
                point: Vector3::ZERO,
                normal: Dir3::Y,
                distance: 1.0,
            }),
            ..Default::default()
        };
        assert!(probe.is_active());
        probe.deactivate();
        assert!(!probe.is_active());
        assert!(probe.output.is_none());
    }
}
