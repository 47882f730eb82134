use bevy::prelude::*;

use crate::LegworkUpdateMode;

/// A configuration problem that prevents part of Legwork from working on a character.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LegworkConfigError {
    /// Without a camera there is no reference for the movement directions, so movement input is
    /// ignored. Floating still works.
    #[error("no camera to derive movement directions from - set `LegworkController::camera` or add `LegworkCamera` to exactly one entity")]
    MissingCamera,
    #[error("the step planner has no legs")]
    NoLegs,
    /// The body orientation needs a support triangle, and is skipped.
    #[error("body orientation needs at least 3 legs, but only {count} are configured")]
    TooFewLegsForBodyOrientation { count: usize },
}

/// A configuration smell that Legwork can live with.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LegworkConfigWarning {
    #[error("update mode is {mode:?}, but the number of legs ({count}) is odd")]
    OddLegCountForZigZag {
        mode: LegworkUpdateMode,
        count: usize,
    },
    #[error("leg {leg} has a non-positive smooth time, so its steps will land instantly")]
    NonPositiveSmoothTime { leg: usize },
}

/// Log the outcome of validating the configuration of `entity`.
pub(crate) fn report_validation(
    entity: Entity,
    what: &str,
    result: &Result<Vec<LegworkConfigWarning>, LegworkConfigError>,
) {
    match result {
        Ok(warnings) => {
            for warning in warnings {
                warn!("{entity}: {what}: {warning}");
            }
        }
        Err(err) => {
            error!("{entity}: {what}: {err}");
        }
    }
}
