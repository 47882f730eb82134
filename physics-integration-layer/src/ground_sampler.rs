use bevy::prelude::*;

use crate::data_for_backends::{LegworkCastShape, LegworkGroundHit, LegworkProbe};
use crate::math::{Float, Vector3};

/// Ground queries a physics backend offers to Legwork.
///
/// Implementations must return only the nearest hit, and must report a miss as `None` - never
/// panic. Implementations are typically a `SystemParam` wrapping the backend's spatial query
/// pipeline.
pub trait LegworkGroundSampler {
    fn cast_ray(
        &self,
        origin: Vector3,
        direction: Dir3,
        max_distance: Float,
        ground_mask: u32,
        exclude: Option<Entity>,
    ) -> Option<LegworkGroundHit>;

    fn cast_sphere(
        &self,
        origin: Vector3,
        radius: Float,
        direction: Dir3,
        max_distance: Float,
        ground_mask: u32,
        exclude: Option<Entity>,
    ) -> Option<LegworkGroundHit>;

    /// Perform the cast a probe describes. Inactive probes always miss.
    fn sample_probe(
        &self,
        probe: &LegworkProbe,
        exclude: Option<Entity>,
    ) -> Option<LegworkGroundHit> {
        if !probe.is_active() {
            return None;
        }
        match probe.cast_shape {
            LegworkCastShape::Ray => self.cast_ray(
                probe.cast_origin,
                probe.cast_direction,
                probe.cast_range,
                probe.ground_mask,
                exclude,
            ),
            LegworkCastShape::Sphere { radius } => self.cast_sphere(
                probe.cast_origin,
                radius,
                probe.cast_direction,
                probe.cast_range,
                probe.ground_mask,
                exclude,
            ),
        }
    }
}
