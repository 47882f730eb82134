use bevy::prelude::*;
use bevy_legwork_physics_integration_layer::math::{AdjustPrecision, Float, Vector3};

use crate::pose::LegworkPoseSink;
use crate::util::{smooth_damp, step_arc};

/// The movement of a single foot's IK target from where it stood to where it should land.
///
/// While [`Active`](Self::Active) the transition owns the IK target's position: nothing else
/// should write it.
#[derive(Debug, Clone, Default)]
pub enum LegworkStepTransition {
    #[default]
    Idle,
    Active {
        destination: Vector3,
        /// The position on the damped path toward the destination, without the step arc.
        base: Vector3,
        smooth_velocity: Vector3,
        /// Time, in seconds, until the foot lands.
        remaining: Float,
        smooth_time: Float,
        step_height: Float,
        up: Dir3,
    },
}

/// What [`LegworkStepTransition::advance`] did with the foot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LegworkStepProgress {
    /// There was no transition to advance.
    Idle,
    /// The foot is in the air, at the given position.
    Moving(Vector3),
    /// The foot has reached its destination and the transition is over.
    Landed(Vector3),
}

impl LegworkStepProgress {
    /// The position the IK target should be placed at, if it should be moved.
    pub fn position(&self) -> Option<Vector3> {
        match self {
            LegworkStepProgress::Idle => None,
            LegworkStepProgress::Moving(position) | LegworkStepProgress::Landed(position) => {
                Some(*position)
            }
        }
    }

    pub fn apply_to(&self, sink: &mut impl LegworkPoseSink) {
        if let Some(position) = self.position() {
            sink.set_position(position);
        }
    }
}

impl LegworkStepTransition {
    /// Start moving the foot from `from` to `destination`.
    ///
    /// If a transition was already in flight it is preempted - the new one starts from `from`, and
    /// the old destination is returned.
    pub fn begin(
        &mut self,
        from: Vector3,
        destination: Vector3,
        smooth_time: Float,
        step_height: Float,
        up: Dir3,
    ) -> Option<Vector3> {
        let preempted = self.destination();
        *self = Self::Active {
            destination,
            base: from,
            smooth_velocity: Vector3::ZERO,
            remaining: smooth_time,
            smooth_time,
            step_height,
            up,
        };
        preempted
    }

    /// Stop the transition where it is. Returns the destination it was heading to.
    pub fn cancel(&mut self) -> Option<Vector3> {
        let destination = self.destination();
        *self = Self::Idle;
        destination
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn destination(&self) -> Option<Vector3> {
        match self {
            Self::Idle => None,
            Self::Active { destination, .. } => Some(*destination),
        }
    }

    /// Advance the transition by one frame.
    ///
    /// Once the remaining time runs out the foot is placed exactly at the destination and the
    /// transition becomes [`Idle`](Self::Idle).
    pub fn advance(&mut self, frame_duration: Float) -> LegworkStepProgress {
        let Self::Active {
            destination,
            base,
            smooth_velocity,
            remaining,
            smooth_time,
            step_height,
            up,
        } = self
        else {
            return LegworkStepProgress::Idle;
        };

        let time_left = *remaining;
        *remaining -= frame_duration;
        if *remaining <= 0.0 {
            let destination = *destination;
            *self = Self::Idle;
            return LegworkStepProgress::Landed(destination);
        }

        let p = time_left / *smooth_time;
        *base = smooth_damp(
            *base,
            *destination,
            smooth_velocity,
            time_left,
            frame_duration,
        );
        LegworkStepProgress::Moving(
            *base + step_arc(p) * *step_height * up.adjust_precision(),
        )
    }
}
