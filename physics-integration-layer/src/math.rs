#[cfg(feature = "f64")]
pub type Float = f64;
#[cfg(not(feature = "f64"))]
pub type Float = f32;

#[cfg(feature = "f64")]
use bevy::math::{DMat3, DQuat, DVec2, DVec3};
use bevy::math::{Mat3, Quat, Vec2, Vec3};

#[cfg(feature = "f64")]
pub type Vector3 = DVec3;
#[cfg(not(feature = "f64"))]
pub type Vector3 = Vec3;

#[cfg(feature = "f64")]
pub type Vector2 = DVec2;
#[cfg(not(feature = "f64"))]
pub type Vector2 = Vec2;

#[cfg(feature = "f64")]
pub type Quaternion = DQuat;
#[cfg(not(feature = "f64"))]
pub type Quaternion = Quat;

#[cfg(feature = "f64")]
pub type Matrix3 = DMat3;
#[cfg(not(feature = "f64"))]
pub type Matrix3 = Mat3;

/// Adjust the precision of the math construct to the precision chosen for compilation.
pub trait AdjustPrecision {
    /// A math construct type with the desired precision.
    type Adjusted;
    /// Adjusts the precision of [`self`] to [`Self::Adjusted`](#associatedtype.Adjusted).
    fn adjust_precision(&self) -> Self::Adjusted;
}

impl AdjustPrecision for f32 {
    type Adjusted = Float;
    fn adjust_precision(&self) -> Self::Adjusted {
        #[cfg(feature = "f64")]
        return (*self).into();
        #[cfg(not(feature = "f64"))]
        return *self;
    }
}

impl AdjustPrecision for Vec3 {
    type Adjusted = Vector3;
    fn adjust_precision(&self) -> Self::Adjusted {
        #[cfg(feature = "f64")]
        return self.as_dvec3();
        #[cfg(not(feature = "f64"))]
        return *self;
    }
}

impl AdjustPrecision for Vec2 {
    type Adjusted = Vector2;
    fn adjust_precision(&self) -> Self::Adjusted {
        #[cfg(feature = "f64")]
        return self.as_dvec2();
        #[cfg(not(feature = "f64"))]
        return *self;
    }
}

impl AdjustPrecision for Quat {
    type Adjusted = Quaternion;
    fn adjust_precision(&self) -> Self::Adjusted {
        #[cfg(feature = "f64")]
        return self.as_dquat();
        #[cfg(not(feature = "f64"))]
        return *self;
    }
}

/// Adjust the precision down to `f32` regardless of compilation.
///
/// Needed wherever a value crosses into Bevy's own (always `f32`) types, like `Transform` or
/// `Dir3`.
pub trait AsF32 {
    /// The `f32` version of a math construct.
    type F32;
    /// Returns the `f32` version of this type.
    fn f32(&self) -> Self::F32;
}

impl AsF32 for Vec3 {
    type F32 = Self;
    fn f32(&self) -> Self::F32 {
        *self
    }
}

#[cfg(feature = "f64")]
impl AsF32 for DVec3 {
    type F32 = Vec3;
    fn f32(&self) -> Self::F32 {
        self.as_vec3()
    }
}

impl AsF32 for Quat {
    type F32 = Self;
    fn f32(&self) -> Self::F32 {
        *self
    }
}

#[cfg(feature = "f64")]
impl AsF32 for DQuat {
    type F32 = Quat;
    fn f32(&self) -> Self::F32 {
        self.as_quat()
    }
}
