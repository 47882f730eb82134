//! # Legwork - procedural legs for floating characters
//!
//! Legwork moves a character's rigid body by floating it above the ground, and makes it look like
//! it walks: feet are placed procedurally on the ground around it, and its body is leveled over
//! them and leaned into accelerations.
//!
//! Legwork does not solve IK. It moves the IK targets of the feet, and leaves bending the legs
//! toward them to whatever IK solution the game uses.
//!
//! ## Using Legwork
//!
//! * Add [`LegworkPlugin`] and the plugin of a physics backend (e.g. `LegworkAvian3dPlugin` from
//!   the `bevy-legwork-avian3d` crate).
//! * Give the character's rigid body a [`LegworkController`]. Write the player's movement into its
//!   [`LegworkMoveInput`], and mark the camera with [`LegworkCamera`] (or set
//!   [`LegworkController::camera`]).
//! * Give it a [`LegworkStepPlanner`] with one [`LegworkLeg`] per leg. Each leg needs an anchor
//!   entity - usually a child of the character - and an IK target entity without a parent.
//! * Optionally, give it a [`LegworkBodyOrientation`] pointing at the entity of the visible body.
//!   This requires at least three legs.
//!
//! Locomotion runs in the fixed schedule, together with the physics. Steps and body orientation
//! run in the frame schedule, so that the feet move smoothly regardless of the physics rate.
mod body_orientation;
mod locomotion;
mod pose;
mod step_planner;
mod step_transition;
pub mod util;
mod validation;

use bevy::ecs::schedule::{InternedScheduleLabel, ScheduleLabel};
use bevy::prelude::*;

pub use bevy_legwork_physics_integration_layer::data_for_backends::*;
pub use bevy_legwork_physics_integration_layer::ground_sampler::LegworkGroundSampler;
pub use bevy_legwork_physics_integration_layer::*;

pub use body_orientation::{LegworkBodyOrientation, LegworkSupportFrame};
pub use locomotion::{
    LegworkCamera, LegworkController, LegworkLocomotionCommand, LegworkMoveInput,
};
pub use pose::LegworkPoseSink;
pub use step_planner::{
    LegworkBusyPolicy, LegworkLeg, LegworkStepCandidate, LegworkStepDecision, LegworkStepPlanner,
    LegworkStepPlannerState, LegworkUpdateMode,
};
pub use step_transition::{LegworkStepProgress, LegworkStepTransition};
pub use validation::{LegworkConfigError, LegworkConfigWarning};

pub mod prelude {
    pub use crate::{
        LegworkBodyOrientation, LegworkCamera, LegworkController, LegworkLeg, LegworkMoveInput,
        LegworkPipelineSystems, LegworkPlugin, LegworkStepPlanner, LegworkSystems, LegworkToggle,
        LegworkUpdateMode,
    };
}

/// The main plugin for Legwork.
///
/// A physics backend plugin must be added as well, with the same schedules.
pub struct LegworkPlugin {
    fixed_schedule: InternedScheduleLabel,
    frame_schedule: InternedScheduleLabel,
}

impl LegworkPlugin {
    /// Create the plugin.
    ///
    /// `fixed_schedule` runs the floating locomotion and should be synchronized with the physics.
    /// `frame_schedule` runs the step planner and the body orientation, and should run once per
    /// rendered frame.
    pub fn new(fixed_schedule: impl ScheduleLabel, frame_schedule: impl ScheduleLabel) -> Self {
        Self {
            fixed_schedule: fixed_schedule.intern(),
            frame_schedule: frame_schedule.intern(),
        }
    }
}

impl Default for LegworkPlugin {
    fn default() -> Self {
        Self::new(FixedUpdate, Update)
    }
}

impl Plugin for LegworkPlugin {
    fn build(&self, app: &mut App) {
        for schedule in [self.fixed_schedule, self.frame_schedule] {
            app.configure_sets(
                schedule,
                (
                    LegworkPipelineSystems::Trackers,
                    LegworkPipelineSystems::Aim,
                    LegworkPipelineSystems::Sensors,
                    LegworkPipelineSystems::Logic,
                    LegworkPipelineSystems::Motors,
                )
                    .chain()
                    .in_set(LegworkSystems),
            );
        }

        app.add_systems(
            self.fixed_schedule,
            (
                locomotion::validate_controllers_system,
                locomotion::aim_ground_sensors_system,
            )
                .in_set(LegworkPipelineSystems::Aim),
        );
        app.add_systems(
            self.fixed_schedule,
            locomotion::apply_controllers_system.in_set(LegworkPipelineSystems::Logic),
        );

        app.add_systems(
            self.frame_schedule,
            (
                step_planner::validate_step_planners_system,
                body_orientation::validate_body_orientations_system,
                step_planner::aim_foot_sensors_system,
            )
                .in_set(LegworkPipelineSystems::Aim),
        );
        app.add_systems(
            self.frame_schedule,
            (
                step_planner::apply_step_planners_system,
                body_orientation::apply_body_orientations_system,
            )
                .chain()
                .in_set(LegworkPipelineSystems::Logic),
        );
    }
}
