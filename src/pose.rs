use bevy::prelude::*;
use bevy_legwork_physics_integration_layer::math::{AdjustPrecision, AsF32, Quaternion, Vector3};

/// Where Legwork writes the poses it computes - foot IK targets and the character's body.
///
/// Implemented for [`Transform`]. Note that Legwork treats the values as world space, so the
/// entities whose `Transform` serves as a sink should not have a parent.
pub trait LegworkPoseSink {
    fn position(&self) -> Vector3;
    fn rotation(&self) -> Quaternion;
    fn set_position(&mut self, position: Vector3);
    fn set_rotation(&mut self, rotation: Quaternion);
}

impl LegworkPoseSink for Transform {
    fn position(&self) -> Vector3 {
        self.translation.adjust_precision()
    }

    fn rotation(&self) -> Quaternion {
        self.rotation.adjust_precision()
    }

    fn set_position(&mut self, position: Vector3) {
        self.translation = position.f32();
    }

    fn set_rotation(&mut self, rotation: Quaternion) {
        self.rotation = rotation.f32();
    }
}
