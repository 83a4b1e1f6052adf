//! Entity-change directives.

use serde::{Deserialize, Serialize};

use super::error::ScenarioError;
use crate::domain::EntityAction;

/// One call to `change_entity`, kept as given.
///
/// A directive with several targets expands to one wire record per target,
/// but two directives are never merged, even when they name the same target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChange {
    pub action: EntityAction,
    pub targets: Vec<String>,
    /// Template for replace, destination for migrate.
    pub new_target: Option<String>,
    pub count: u32,
    /// Days from submission at which the change takes effect.
    pub projection: Vec<u32>,
}

impl EntityChange {
    /// Build a validated directive. `count` defaults to 1.
    pub fn new(
        action: EntityAction,
        targets: Vec<String>,
        projection: Vec<u32>,
        count: Option<u32>,
        new_target: Option<String>,
    ) -> Result<Self, ScenarioError> {
        if targets.is_empty() {
            return Err(ScenarioError::NoTargets { action });
        }
        if projection.is_empty() {
            return Err(ScenarioError::EmptyProjection);
        }
        let count = count.unwrap_or(1);
        if action.requires_count() && count == 0 {
            return Err(ScenarioError::ZeroCount { action });
        }
        let new_target = new_target.filter(|t| !t.is_empty());
        if action.requires_destination() && new_target.is_none() {
            return Err(ScenarioError::MissingDestination { action });
        }

        Ok(Self {
            action,
            targets,
            new_target,
            count,
            projection,
        })
    }

    /// Single-period actions (remove/replace/migrate) take effect on the first day given.
    pub fn first_day(&self) -> u32 {
        self.projection.first().copied().unwrap_or(0)
    }
}
