use bevy::prelude::*;
use bevy_legwork_physics_integration_layer::data_for_backends::{
    LegworkCastShape, LegworkFootSensor, LegworkGroundHit, LegworkProbe, LegworkRigidBodyTracker,
    LegworkToggle,
};
use bevy_legwork_physics_integration_layer::math::{AdjustPrecision, Float, Vector3};

use crate::pose::LegworkPoseSink;
use crate::step_transition::{LegworkStepProgress, LegworkStepTransition};
use crate::util::lerp_unclamped;
use crate::validation::{report_validation, LegworkConfigError, LegworkConfigWarning};

/// How the step planner picks which legs may step.
///
/// Only [`Sequential`](Self::Sequential) is implemented. The other modes are accepted, but choosing
/// them leaves the feet where they are and logs an error every frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum LegworkUpdateMode {
    /// Every leg steps as soon as its foot leaves its bound.
    Simple,
    /// When any foot leaves its bound, all the legs step.
    AllTogether,
    /// Alternating legs step together. Needs an even number of legs.
    ZigZag,
    /// The legs take turns, in order. A leg only gets to step when it is its turn.
    #[default]
    Sequential,
}

/// What prevents the planner from starting a new step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum LegworkBusyPolicy {
    /// No step may start while any foot is in the air. Only one foot moves at a time.
    #[default]
    Global,
    /// A step may start as long as the leg whose turn it is is not already stepping.
    PerLeg,
}

/// A single leg, as the step planner sees it.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LegworkLeg {
    /// The point whose ground projection is where the foot wants to be. Usually a child of the
    /// character, so that it moves with it.
    pub anchor: Entity,

    /// The entity the foot's IK chain reaches for. Legwork moves it during steps.
    ///
    /// Must not have a parent - its `Transform` is treated as world space.
    pub ik_target: Entity,

    /// How far above the anchor the ground probe starts.
    pub vertical_offset: Float,

    /// How far down the ground probe reaches.
    pub ray_distance: Float,

    /// How far the ground point may drift away from the foot before it steps, when standing still.
    pub min_bound: Float,

    /// How far the ground point may drift away from the foot before it steps, at the speed
    /// configured by [`max_offset_sqr_velocity`](LegworkStepPlanner::max_offset_sqr_velocity).
    pub max_bound: Float,

    /// The duration of a step, in seconds.
    pub smooth_time: Float,

    /// How high the foot is lifted at the middle of a step.
    pub step_height: Float,
}

impl LegworkLeg {
    pub fn new(anchor: Entity, ik_target: Entity) -> Self {
        Self {
            anchor,
            ik_target,
            vertical_offset: 1.0,
            ray_distance: 2.0,
            min_bound: 0.1,
            max_bound: 0.5,
            smooth_time: 0.2,
            step_height: 0.2,
        }
    }
}

/// Procedural foot placement: decides when and where each foot steps.
///
/// Every frame, the planner probes the ground under the anchor of the leg whose turn it is,
/// shifted in the direction of motion. If the point it finds is too far from where the foot
/// currently stands, the foot steps there and the turn passes to the next leg.
///
/// Positions of the feet are written to the [IK targets](LegworkLeg::ik_target). Solving the
/// actual IK chains is left to whatever IK solution the game uses.
#[derive(Component, Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[require(LegworkStepPlannerState, LegworkFootSensor, LegworkRigidBodyTracker)]
pub struct LegworkStepPlanner {
    pub update_mode: LegworkUpdateMode,

    pub busy_policy: LegworkBusyPolicy,

    /// Collision layers (as a bit mask) that feet can stand on.
    pub ground_mask: u32,

    /// Where between the foot and the found ground point the foot steps to.
    ///
    /// 1.0 steps exactly to the ground point. Values above 1.0 overshoot in the direction the
    /// ground point moved away from the foot - which is usually the direction of motion.
    pub step_distance_ratio: Float,

    /// The squared speed at which the bounds reach [`max_bound`](LegworkLeg::max_bound).
    ///
    /// Faster characters get proportionally larger bounds.
    pub max_offset_sqr_velocity: Float,

    /// How far ahead, in seconds of the current velocity, the ground is probed.
    pub velocity_offset_multiply: Float,

    /// The direction considered as upward. Probes are cast opposite to it, and steps arc along it.
    pub up: Dir3,

    pub legs: Vec<LegworkLeg>,
}

impl Default for LegworkStepPlanner {
    fn default() -> Self {
        Self {
            update_mode: LegworkUpdateMode::Sequential,
            busy_policy: LegworkBusyPolicy::Global,
            ground_mask: u32::MAX,
            step_distance_ratio: 1.0,
            max_offset_sqr_velocity: 25.0,
            velocity_offset_multiply: 0.1,
            up: Dir3::Y,
            legs: Vec::new(),
        }
    }
}

/// A potential step for a leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegworkStepCandidate {
    /// Where the foot would land.
    pub position: Vector3,
    /// The distance between where the foot stands and where it would land.
    pub distance: Float,
    /// How far the foot is allowed to drift at the current speed.
    pub bound: Float,
    pub out_of_bounds: bool,
}

/// The outcome of a frame of step planning.
#[derive(Debug, Clone, PartialEq)]
pub enum LegworkStepDecision {
    /// The configured [update mode](LegworkUpdateMode) is not implemented.
    Unimplemented(LegworkUpdateMode),
    NoLegs,
    /// A step in flight prevents new steps this frame.
    Busy,
    NoGround {
        leg: usize,
    },
    /// The IK target of the leg could not be read.
    MissingIkTarget {
        leg: usize,
    },
    WithinBound {
        leg: usize,
        candidate: LegworkStepCandidate,
    },
    Triggered {
        leg: usize,
        destination: Vector3,
    },
}

/// The mutable side of [`LegworkStepPlanner`].
#[derive(Component, Debug, Default, Clone)]
pub struct LegworkStepPlannerState {
    armed_leg: usize,
    /// The leg the foot sensor was aimed for this frame.
    probed_leg: Option<usize>,
    transitions: Vec<LegworkStepTransition>,
}

impl LegworkStepPlannerState {
    /// The leg whose turn it is to step.
    pub fn armed_leg(&self) -> usize {
        self.armed_leg
    }

    pub fn transition(&self, leg: usize) -> Option<&LegworkStepTransition> {
        self.transitions.get(leg)
    }

    pub fn transitions_mut(
        &mut self,
    ) -> impl Iterator<Item = (usize, &mut LegworkStepTransition)> {
        self.transitions.iter_mut().enumerate()
    }

    pub fn is_leg_busy(&self, leg: usize) -> bool {
        self.transitions
            .get(leg)
            .is_some_and(LegworkStepTransition::is_active)
    }

    pub fn any_busy(&self) -> bool {
        self.transitions.iter().any(LegworkStepTransition::is_active)
    }

    /// Stop all the steps in flight, leaving the feet where they are. Returns how many were
    /// cancelled.
    pub fn cancel_all(&mut self) -> usize {
        self.transitions
            .iter_mut()
            .filter_map(LegworkStepTransition::cancel)
            .count()
    }

    fn ensure_legs(&mut self, count: usize) {
        if self.transitions.len() != count {
            self.transitions.resize_with(count, Default::default);
        }
        if count <= self.armed_leg {
            self.armed_leg = 0;
        }
    }
}

impl LegworkStepPlanner {
    pub fn validate(&self) -> Result<Vec<LegworkConfigWarning>, LegworkConfigError> {
        if self.legs.is_empty() {
            return Err(LegworkConfigError::NoLegs);
        }
        let mut warnings = Vec::new();
        if self.update_mode == LegworkUpdateMode::ZigZag && self.legs.len() % 2 == 1 {
            warnings.push(LegworkConfigWarning::OddLegCountForZigZag {
                mode: self.update_mode,
                count: self.legs.len(),
            });
        }
        for (leg_index, leg) in self.legs.iter().enumerate() {
            if leg.smooth_time <= 0.0 {
                warnings.push(LegworkConfigWarning::NonPositiveSmoothTime { leg: leg_index });
            }
        }
        Ok(warnings)
    }

    /// The distance a foot may drift before stepping, given the squared speed of the character.
    ///
    /// Interpolates from [`min_bound`](LegworkLeg::min_bound) at rest to
    /// [`max_bound`](LegworkLeg::max_bound) at
    /// [`max_offset_sqr_velocity`](Self::max_offset_sqr_velocity), and keeps growing beyond it.
    pub fn step_bound(&self, leg: &LegworkLeg, speed_squared: Float) -> Float {
        let t = if 0.0 < self.max_offset_sqr_velocity {
            speed_squared / self.max_offset_sqr_velocity
        } else {
            1.0
        };
        lerp_unclamped(leg.min_bound, leg.max_bound, t)
    }

    /// Where the ground probe of a leg starts.
    pub fn probe_origin(
        &self,
        leg: &LegworkLeg,
        anchor_position: Vector3,
        velocity: Vector3,
    ) -> Vector3 {
        anchor_position
            + self.up.adjust_precision() * leg.vertical_offset
            + velocity * self.velocity_offset_multiply
    }

    pub fn evaluate_candidate(
        &self,
        leg: &LegworkLeg,
        ik_position: Vector3,
        ground_point: Vector3,
        velocity: Vector3,
    ) -> LegworkStepCandidate {
        let position = ik_position.lerp(ground_point, self.step_distance_ratio);
        let distance = position.distance(ik_position);
        let bound = self.step_bound(leg, velocity.length_squared());
        LegworkStepCandidate {
            position,
            distance,
            bound,
            out_of_bounds: bound < distance,
        }
    }

    fn is_blocked(&self, state: &LegworkStepPlannerState, leg: usize) -> bool {
        match self.busy_policy {
            LegworkBusyPolicy::Global => state.any_busy(),
            LegworkBusyPolicy::PerLeg => state.is_leg_busy(leg),
        }
    }

    /// The leg whose ground should be probed this frame, if any.
    pub fn leg_to_probe(&self, state: &LegworkStepPlannerState) -> Option<usize> {
        match self.update_mode {
            LegworkUpdateMode::Simple
            | LegworkUpdateMode::AllTogether
            | LegworkUpdateMode::ZigZag => None,
            LegworkUpdateMode::Sequential => {
                let leg = state.armed_leg;
                if self.legs.len() <= leg || self.is_blocked(state, leg) {
                    None
                } else {
                    Some(leg)
                }
            }
        }
    }

    /// Point the probe at the ground under a leg.
    pub fn aim_probe(
        &self,
        state: &mut LegworkStepPlannerState,
        leg_index: usize,
        anchor_position: Vector3,
        velocity: Vector3,
        probe: &mut LegworkProbe,
    ) {
        let Some(leg) = self.legs.get(leg_index) else {
            probe.deactivate();
            state.probed_leg = None;
            return;
        };
        probe.cast_origin = self.probe_origin(leg, anchor_position, velocity);
        probe.cast_direction = -self.up;
        probe.cast_range = leg.ray_distance;
        probe.cast_shape = LegworkCastShape::Ray;
        probe.ground_mask = self.ground_mask;
        state.probed_leg = Some(leg_index);
    }

    /// Decide whether the leg whose turn it is should step, and start its step if so.
    ///
    /// `hit` is the output of the probe aimed by [`aim_probe`](Self::aim_probe) this frame.
    pub fn decide(
        &self,
        state: &mut LegworkStepPlannerState,
        hit: Option<&LegworkGroundHit>,
        velocity: Vector3,
        ik_position_of: impl Fn(&LegworkLeg) -> Option<Vector3>,
    ) -> LegworkStepDecision {
        state.ensure_legs(self.legs.len());
        let probed_leg = state.probed_leg.take();
        match self.update_mode {
            LegworkUpdateMode::Simple => {
                return LegworkStepDecision::Unimplemented(LegworkUpdateMode::Simple);
            }
            LegworkUpdateMode::AllTogether => {
                return LegworkStepDecision::Unimplemented(LegworkUpdateMode::AllTogether);
            }
            LegworkUpdateMode::ZigZag => {
                return LegworkStepDecision::Unimplemented(LegworkUpdateMode::ZigZag);
            }
            LegworkUpdateMode::Sequential => {}
        }

        let leg_index = state.armed_leg;
        let Some(leg) = self.legs.get(leg_index) else {
            return LegworkStepDecision::NoLegs;
        };
        if self.is_blocked(state, leg_index) {
            return LegworkStepDecision::Busy;
        }
        let Some(hit) = hit.filter(|_| probed_leg == Some(leg_index)) else {
            return LegworkStepDecision::NoGround { leg: leg_index };
        };
        let Some(ik_position) = ik_position_of(leg) else {
            return LegworkStepDecision::MissingIkTarget { leg: leg_index };
        };

        let candidate = self.evaluate_candidate(leg, ik_position, hit.point, velocity);
        if !candidate.out_of_bounds {
            return LegworkStepDecision::WithinBound {
                leg: leg_index,
                candidate,
            };
        }

        if let Some(preempted) = state.transitions[leg_index].begin(
            ik_position,
            candidate.position,
            leg.smooth_time,
            leg.step_height,
            self.up,
        ) {
            debug!("Step of leg {leg_index} toward {preempted} was preempted");
        }
        state.armed_leg = (leg_index + 1) % self.legs.len();
        LegworkStepDecision::Triggered {
            leg: leg_index,
            destination: candidate.position,
        }
    }
}

pub(crate) fn validate_step_planners_system(
    query: Query<(Entity, &LegworkStepPlanner), Added<LegworkStepPlanner>>,
) {
    for (entity, planner) in query.iter() {
        report_validation(entity, "step planner", &planner.validate());
    }
}

#[allow(clippy::type_complexity)]
pub(crate) fn aim_foot_sensors_system(
    mut query: Query<(
        Entity,
        &LegworkStepPlanner,
        &mut LegworkStepPlannerState,
        &LegworkRigidBodyTracker,
        &mut LegworkFootSensor,
        Option<&LegworkToggle>,
    )>,
    anchors_query: Query<&GlobalTransform>,
) {
    for (entity, planner, mut state, tracker, mut sensor, legwork_toggle) in query.iter_mut() {
        let state = state.as_mut();
        match legwork_toggle.copied().unwrap_or_default() {
            LegworkToggle::Disabled => {
                let cancelled = state.cancel_all();
                if 0 < cancelled {
                    debug!("{entity}: cancelled {cancelled} steps because Legwork was disabled");
                }
                sensor.0.deactivate();
                continue;
            }
            LegworkToggle::SenseOnly => {}
            LegworkToggle::Enabled => {}
        }
        state.ensure_legs(planner.legs.len());

        let Some(leg_index) = planner.leg_to_probe(state) else {
            sensor.0.deactivate();
            state.probed_leg = None;
            continue;
        };
        let Ok(anchor) = anchors_query.get(planner.legs[leg_index].anchor) else {
            bevy::log::warn_once!("{entity}: the anchor of leg {leg_index} has no transform");
            sensor.0.deactivate();
            state.probed_leg = None;
            continue;
        };
        planner.aim_probe(
            state,
            leg_index,
            anchor.translation().adjust_precision(),
            tracker.velocity,
            &mut sensor.0,
        );
    }
}

#[allow(clippy::type_complexity)]
pub(crate) fn apply_step_planners_system(
    time: Res<Time>,
    mut query: Query<(
        Entity,
        &LegworkStepPlanner,
        &mut LegworkStepPlannerState,
        &LegworkRigidBodyTracker,
        &LegworkFootSensor,
        Option<&LegworkToggle>,
    )>,
    mut poses_query: Query<&mut Transform>,
) {
    let frame_duration = time.delta_secs().adjust_precision();
    if frame_duration == 0.0 {
        return;
    }
    for (entity, planner, mut state, tracker, sensor, legwork_toggle) in query.iter_mut() {
        match legwork_toggle.copied().unwrap_or_default() {
            LegworkToggle::Disabled => continue,
            LegworkToggle::SenseOnly => {}
            LegworkToggle::Enabled => {}
        }
        let state = state.as_mut();

        let decision = planner.decide(state, sensor.0.output.as_ref(), tracker.velocity, |leg| {
            poses_query
                .get(leg.ik_target)
                .ok()
                .map(|transform| transform.position())
        });
        match decision {
            LegworkStepDecision::Unimplemented(update_mode) => {
                error!("{entity}: update mode {update_mode:?} is not implemented - the feet will not move");
            }
            LegworkStepDecision::MissingIkTarget { leg } => {
                bevy::log::warn_once!("{entity}: the IK target of leg {leg} has no transform");
            }
            LegworkStepDecision::Triggered { leg, destination } => {
                debug!("{entity}: leg {leg} steps to {destination}");
            }
            LegworkStepDecision::NoLegs
            | LegworkStepDecision::Busy
            | LegworkStepDecision::NoGround { .. }
            | LegworkStepDecision::WithinBound { .. } => {}
        }

        for (leg_index, transition) in state.transitions_mut() {
            let progress = transition.advance(frame_duration);
            if progress == LegworkStepProgress::Idle {
                continue;
            }
            let Ok(mut ik_target) = poses_query.get_mut(planner.legs[leg_index].ik_target) else {
                transition.cancel();
                continue;
            };
            progress.apply_to(ik_target.as_mut());
        }
    }
}
