// file: src/orchestrator/lifecycle.rs
// version: 1.0.0
// guid: ce2c1202-ccb5-4094-b879-d656cbe9ab71

//! Machine lifecycle states

use crate::error::{FleetError, Result};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
    Failed,
}

impl LifecycleState {
    /// Allowed moves between states.
    ///
    /// A failed create leaves the machine `Failed`; it is never assumed present.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Absent, Creating)
                | (Creating, Present)
                | (Creating, Failed)
                | (Present, Updating)
                | (Present, Deleting)
                | (Present, Present)
                | (Updating, Present)
                | (Updating, Failed)
                | (Deleting, Absent)
                | (Deleting, Failed)
                | (Failed, Present)
                | (Failed, Deleting)
        )
    }

    pub fn transition(self, next: LifecycleState) -> Result<LifecycleState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(FleetError::configuration(format!(
                "Invalid lifecycle transition: {} -> {}",
                self, next
            )))
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Absent => "absent",
            LifecycleState::Creating => "creating",
            LifecycleState::Present => "present",
            LifecycleState::Updating => "updating",
            LifecycleState::Deleting => "deleting",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}
