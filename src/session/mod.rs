// In-memory interactive session state: confirmations, the setup wizard and
// scoring-panel locks. Nothing here is persisted; a restart drops it all.

pub mod confirm;
pub mod panel;
pub mod wizard;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use confirm::{ConfirmKind, ConfirmationBook, PendingConfirmation, Settlement};
pub use panel::{parse_stat_delta, EntryError, PanelSession, PanelSessions};
pub use wizard::{WizardEffect, WizardEvent, WizardRegistry, WizardState, WizardStep};

/// A panicked holder leaves the map consistent, so keep using it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
