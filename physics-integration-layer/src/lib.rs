use bevy::prelude::*;

pub mod data_for_backends;
pub mod ground_sampler;
pub mod math;

/// Umbrella system set for [`LegworkPipelineSystems`].
///
/// The physics backends' plugins are responsible for preventing this entire system set from
/// running when the physics backend itself is paused.
#[derive(SystemSet, Clone, PartialEq, Eq, Debug, Hash)]
pub struct LegworkSystems;

/// The various stages of the Legwork pipeline.
///
/// The pipeline runs in two schedules: the fixed schedule, which drives the floating locomotion,
/// and the frame schedule, which drives the step planner and the body orientation. Not every stage
/// has systems in both.
#[derive(SystemSet, Clone, PartialEq, Eq, Debug, Hash)]
pub enum LegworkPipelineSystems {
    /// The rigid body trackers are updated from the physics backend.
    Trackers,
    /// Legwork decides where the ground probes should be cast from.
    Aim,
    /// The physics backend casts the ground probes.
    Sensors,
    /// Legwork decides how the character, its feet and its body should be manipulated.
    Logic,
    /// Forces are applied in the physics backend.
    Motors,
}
