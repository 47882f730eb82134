//! # Avian 3D Integration for bevy-legwork
//!
//! In addition to the instruction in bevy-legwork's documentation:
//!
//! * Add [`LegworkAvian3dPlugin`] to the Bevy app, using the same schedules as `LegworkPlugin`.
//! * The character entity must be an Avian [`RigidBody::Dynamic`]. Its gravity scale is forced to
//!   zero, because Legwork applies gravity itself.
mod ground_sampler;

use avian3d::prelude::*;
use bevy::ecs::schedule::{InternedScheduleLabel, ScheduleLabel};
use bevy::prelude::*;

use bevy_legwork_physics_integration_layer::data_for_backends::{
    LegworkFootSensor, LegworkGroundSensor, LegworkMotor, LegworkRigidBodyTracker, LegworkToggle,
};
use bevy_legwork_physics_integration_layer::ground_sampler::LegworkGroundSampler;
use bevy_legwork_physics_integration_layer::math::AdjustPrecision;
use bevy_legwork_physics_integration_layer::{LegworkPipelineSystems, LegworkSystems};
pub use ground_sampler::LegworkGroundSamplerAvian3d;

pub mod prelude {
    pub use crate::{LegworkAvian3dPlugin, LegworkGroundSamplerAvian3d};
}

/// Add this plugin to use avian3d as a physics backend.
///
/// This plugin should be used in addition to `LegworkPlugin`, and both plugins must use the same
/// schedules. Avian runs in [`FixedPostUpdate`] by default, so the defaults of both plugins -
/// [`FixedUpdate`] for locomotion and [`Update`] for the legs - fit it.
pub struct LegworkAvian3dPlugin {
    fixed_schedule: InternedScheduleLabel,
    frame_schedule: InternedScheduleLabel,
}

impl LegworkAvian3dPlugin {
    pub fn new(fixed_schedule: impl ScheduleLabel, frame_schedule: impl ScheduleLabel) -> Self {
        Self {
            fixed_schedule: fixed_schedule.intern(),
            frame_schedule: frame_schedule.intern(),
        }
    }
}

impl Default for LegworkAvian3dPlugin {
    fn default() -> Self {
        Self::new(FixedUpdate, Update)
    }
}

impl Plugin for LegworkAvian3dPlugin {
    fn build(&self, app: &mut App) {
        app.register_required_components::<LegworkMotor, LinearVelocity>()
            .register_required_components_with::<LegworkMotor, ExternalForce>(|| {
                ExternalForce::default().with_persistence(false)
            })
            .register_required_components_with::<LegworkMotor, GravityScale>(|| GravityScale(0.0));
        for schedule in [self.fixed_schedule, self.frame_schedule] {
            app.configure_sets(
                schedule,
                LegworkSystems.run_if(|physics_time: Res<Time<Physics>>| {
                    !physics_time.is_paused()
                }),
            );
        }
        app.add_systems(
            self.fixed_schedule,
            update_rigid_body_trackers_system.in_set(LegworkPipelineSystems::Trackers),
        );
        app.add_systems(
            self.fixed_schedule,
            update_ground_sensors_system.in_set(LegworkPipelineSystems::Sensors),
        );
        app.add_systems(
            self.fixed_schedule,
            apply_motors_system.in_set(LegworkPipelineSystems::Motors),
        );
        app.add_systems(
            self.frame_schedule,
            update_foot_sensors_system.in_set(LegworkPipelineSystems::Sensors),
        );
    }
}

fn update_rigid_body_trackers_system(
    time: Res<Time>,
    mut query: Query<(
        &GlobalTransform,
        &LinearVelocity,
        &mut LegworkRigidBodyTracker,
        Option<&LegworkToggle>,
    )>,
) {
    let step_duration = time.delta_secs().adjust_precision();
    for (transform, linear_velocity, mut tracker, legwork_toggle) in query.iter_mut() {
        match legwork_toggle.copied().unwrap_or_default() {
            LegworkToggle::Disabled => {
                tracker.forget_history();
                continue;
            }
            LegworkToggle::SenseOnly => {}
            LegworkToggle::Enabled => {}
        }
        let (_, rotation, translation) = transform.to_scale_rotation_translation();
        tracker.translation = translation.adjust_precision();
        tracker.rotation = rotation.adjust_precision();
        tracker.record_velocity(linear_velocity.0, step_duration);
    }
}

fn update_ground_sensors_system(
    sampler: LegworkGroundSamplerAvian3d,
    mut query: Query<(Entity, &mut LegworkGroundSensor, Option<&LegworkToggle>)>,
) {
    for (owner_entity, mut sensor, legwork_toggle) in query.iter_mut() {
        match legwork_toggle.copied().unwrap_or_default() {
            LegworkToggle::Disabled => continue,
            LegworkToggle::SenseOnly => {}
            LegworkToggle::Enabled => {}
        }
        let output = sampler.sample_probe(&sensor.0, Some(owner_entity));
        sensor.0.output = output;
    }
}

fn update_foot_sensors_system(
    sampler: LegworkGroundSamplerAvian3d,
    mut query: Query<(Entity, &mut LegworkFootSensor, Option<&LegworkToggle>)>,
) {
    for (owner_entity, mut sensor, legwork_toggle) in query.iter_mut() {
        match legwork_toggle.copied().unwrap_or_default() {
            LegworkToggle::Disabled => continue,
            LegworkToggle::SenseOnly => {}
            LegworkToggle::Enabled => {}
        }
        let output = sampler.sample_probe(&sensor.0, Some(owner_entity));
        sensor.0.output = output;
    }
}

fn apply_motors_system(
    mut query: Query<(
        &LegworkMotor,
        &mut ExternalForce,
        &mut LinearVelocity,
        &mut Rotation,
        Option<&LegworkToggle>,
    )>,
) {
    for (motor, mut external_force, mut linear_velocity, mut rotation, legwork_toggle) in
        query.iter_mut()
    {
        match legwork_toggle.copied().unwrap_or_default() {
            LegworkToggle::Disabled | LegworkToggle::SenseOnly => {
                external_force.clear();
                continue;
            }
            LegworkToggle::Enabled => {}
        }
        external_force.set_force(motor.force);
        if let Some(desired_rotation) = motor.desired_rotation {
            rotation.0 = desired_rotation;
        }
        // The clamp acts on the velocity the body entered this step with, before the physics
        // step integrates the force.
        linear_velocity.0 = motor.clamp_velocity(linear_velocity.0);
    }
}
