// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Condition types, reasons, and state values for LMS resources.
//!
//! # Condition Hierarchy
//!
//! An `LMSMoodle` carries one encompassing `type: Ready` condition plus one
//! mirrored condition per configured dependant:
//!
//! - `PostgresReady` ← `Postgres` `Ready` condition
//! - `KeydbReady` ← `Keydb` `Ready` condition
//! - `NfsReady` ← `Ganesha` `Ready` condition
//! - `MoodleReady` ← `Moodle` `Ready` condition
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   state: PostgresPending
//!   conditions:
//!     - type: Ready
//!       status: "False"
//!       reason: DependantNotReady
//!       message: "Dependant is not ready"
//!     - type: PostgresReady
//!       status: "False"
//!       reason: Pending
//!       message: "Waiting for primary"
//! ```
//!
//! # State Strings
//!
//! `status.state` is either one of the base states below or a composite
//! `<Kind><Reason>` (e.g. `PostgresFailed`), optionally prefixed with
//! `Suspending` while a suspend is in flight.

// ============================================================================
// Condition Types
// ============================================================================

/// Encompassing readiness condition
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Mirrored Moodle readiness
pub const CONDITION_TYPE_MOODLE_READY: &str = "MoodleReady";

/// Mirrored Postgres readiness
pub const CONDITION_TYPE_POSTGRES_READY: &str = "PostgresReady";

/// Mirrored Keydb readiness
pub const CONDITION_TYPE_KEYDB_READY: &str = "KeydbReady";

/// Mirrored NFS Ganesha readiness
pub const CONDITION_TYPE_NFS_READY: &str = "NfsReady";

/// Condition status values
pub const CONDITION_STATUS_TRUE: &str = "True";
pub const CONDITION_STATUS_FALSE: &str = "False";

// ============================================================================
// States
// ============================================================================

pub const STATE_UNKNOWN: &str = "Unknown";
pub const STATE_READY: &str = "Ready";
pub const STATE_TERMINATING: &str = "Terminating";
pub const STATE_TERMINATED: &str = "Terminated";
pub const STATE_SUCCESSFUL: &str = "Successful";
pub const STATE_SUSPENDED: &str = "Suspended";

/// Prefix applied to dependant sub-states while suspending
pub const STATE_PREFIX_SUSPENDING: &str = "Suspending";

// ============================================================================
// Reasons
// ============================================================================

/// Reason reported when a dependant has no `Ready` condition yet.
///
/// Also used as the sub-state suffix, e.g. `PostgresPending`.
pub const REASON_PENDING: &str = "Pending";

/// Dependant converged; the expected reason during normal operation.
pub const REASON_SUCCESSFUL: &str = STATE_SUCCESSFUL;

/// Dependant suspended; the expected reason while suspending.
pub const REASON_SUSPENDED: &str = STATE_SUSPENDED;

/// A dependant's `Ready` condition is not `True`.
///
/// **Usage:** set on the parent `Ready` condition whenever any mirrored
/// dependant condition is not `True`.
pub const REASON_DEPENDANT_NOT_READY: &str = "DependantNotReady";

/// Deletion started; dependants are being torn down.
pub const REASON_TERMINATING: &str = STATE_TERMINATING;

/// Deletion finished; the finalizer is about to be removed.
pub const REASON_TERMINATED: &str = STATE_TERMINATED;

// ============================================================================
// Messages
// ============================================================================

pub const MESSAGE_LMS_MOODLE_READY: &str = "LMSMoodle is ready";
pub const MESSAGE_LMS_MOODLE_SUSPENDED: &str = "LMSMoodle is suspended";
pub const MESSAGE_DEPENDANT_NOT_READY: &str = "Dependant is not ready";
pub const MESSAGE_FINALIZER_STARTED: &str = "Finalizer started";
pub const MESSAGE_FINALIZER_ENDED: &str = "Finalizer ended";

/// Returns `true` for states after which no periodic requeue is needed.
///
/// # Example
///
/// ```rust
/// use lms_moodle_operator::status_reasons::is_settled_state;
///
/// assert!(is_settled_state("Ready"));
/// assert!(!is_settled_state("PostgresPending"));
/// ```
#[must_use]
pub fn is_settled_state(state: &str) -> bool {
    matches!(state, STATE_READY | STATE_TERMINATING | STATE_SUSPENDED)
}
