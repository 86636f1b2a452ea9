//! Action executor
//!
//! Runs an ordered action list against one row. The first `Filtered`
//! outcome stops the list; any error aborts the run.

use crate::error::ActionResult;
use crate::models::Row;
use crate::transform::ids::IdAllocator;

use super::actions::{Action, ActionOutcome};

/// Apply `actions` to `row` in declaration order.
pub fn run_actions(
    actions: &[Action],
    row: &mut Row,
    ids: &mut IdAllocator,
) -> ActionResult<ActionOutcome> {
    for (index, action) in actions.iter().enumerate() {
        if action.apply(row, ids)? == ActionOutcome::Filtered {
            tracing::debug!(action = action.name(), index, "row filtered out");
            return Ok(ActionOutcome::Filtered);
        }
    }
    Ok(ActionOutcome::Keep)
}
