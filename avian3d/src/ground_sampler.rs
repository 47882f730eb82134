use avian3d::prelude::*;
use bevy::{ecs::system::SystemParam, prelude::*};
use bevy_legwork_physics_integration_layer::{
    data_for_backends::LegworkGroundHit,
    ground_sampler::LegworkGroundSampler,
    math::{AdjustPrecision, AsF32, Float, Quaternion, Vector3},
};

/// [`LegworkGroundSampler`] over Avian's spatial query pipeline.
#[derive(SystemParam)]
pub struct LegworkGroundSamplerAvian3d<'w, 's> {
    spatial_query: SpatialQuery<'w, 's>,
}

fn ground_filter(ground_mask: u32, exclude: Option<Entity>) -> SpatialQueryFilter {
    SpatialQueryFilter::from_mask(LayerMask(ground_mask)).with_excluded_entities(exclude)
}

impl LegworkGroundSampler for LegworkGroundSamplerAvian3d<'_, '_> {
    fn cast_ray(
        &self,
        origin: Vector3,
        direction: Dir3,
        max_distance: Float,
        ground_mask: u32,
        exclude: Option<Entity>,
    ) -> Option<LegworkGroundHit> {
        let hit = self.spatial_query.cast_ray(
            origin,
            direction,
            max_distance,
            true,
            &ground_filter(ground_mask, exclude),
        )?;
        Some(LegworkGroundHit {
            entity: hit.entity,
            point: origin + direction.adjust_precision() * hit.distance,
            normal: Dir3::new(hit.normal.f32()).unwrap_or(-direction),
            distance: hit.distance,
        })
    }

    fn cast_sphere(
        &self,
        origin: Vector3,
        radius: Float,
        direction: Dir3,
        max_distance: Float,
        ground_mask: u32,
        exclude: Option<Entity>,
    ) -> Option<LegworkGroundHit> {
        let hit = self.spatial_query.cast_shape(
            &Collider::sphere(radius),
            origin,
            Quaternion::IDENTITY,
            direction,
            &ShapeCastConfig::from_max_distance(max_distance),
            &ground_filter(ground_mask, exclude),
        )?;
        Some(LegworkGroundHit {
            entity: hit.entity,
            point: hit.point1,
            normal: Dir3::new(hit.normal1.f32()).unwrap_or(-direction),
            distance: hit.distance,
        })
    }
}
