//! Lifecycle guard.
//!
//! Maps a host invoice action to what the chain must do about it. Issued
//! invoices are frozen: their chain-relevant data can only change through
//! a new record (a cancellation or a corrective invoice), never by editing.

use serde::{Deserialize, Serialize};
use vf_record::{InvoiceSnapshot, InvoiceStatus};

/// Host-side invoice action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// Issue the invoice.
    Validate,
    /// Cancel an issued invoice. `by_replacement` is set when the host
    /// cancels it as a side effect of validating its replacement.
    Cancel { by_replacement: bool },
    /// Revert an issued invoice to draft.
    Unvalidate,
    /// Edit the invoice.
    Modify,
    /// Delete the invoice.
    Delete,
}

/// What the chain must do for an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    /// Emit a registration record before the action may succeed.
    Register,
    /// Emit a cancellation record before the action may succeed.
    Cancel,
    /// The action does not touch the chain.
    Skip,
    /// The action must be refused.
    Deny(String),
}

/// Decide what `action` on `snapshot` requires.
pub fn guard(action: LifecycleAction, snapshot: &InvoiceSnapshot) -> Decision {
    let issued = snapshot.status.is_issued();
    match action {
        LifecycleAction::Validate if snapshot.status == InvoiceStatus::Draft => Decision::Register,
        LifecycleAction::Validate => Decision::Skip,
        LifecycleAction::Cancel { by_replacement: true } => Decision::Skip,
        LifecycleAction::Cancel { .. } if issued => Decision::Cancel,
        LifecycleAction::Cancel { .. } => Decision::Skip,
        LifecycleAction::Unvalidate | LifecycleAction::Modify | LifecycleAction::Delete
            if issued =>
        {
            Decision::Deny(format!(
                "invoice {} has been issued and recorded; issue a corrective invoice instead",
                snapshot.number
            ))
        }
        LifecycleAction::Unvalidate | LifecycleAction::Modify | LifecycleAction::Delete => {
            Decision::Skip
        }
    }
}
