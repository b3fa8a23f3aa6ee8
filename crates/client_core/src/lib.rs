//! Synchronization core for the contact directory client.
//!
//! Three layers, leaf-first: [`repository`] maps typed operations onto the
//! remote REST resource, [`store`] holds the ordered in-memory read model,
//! and [`SyncController`] orchestrates when the store refreshes and how
//! mutations reconcile against it (optimistic delete with rollback,
//! non-optimistic create/update).

use std::sync::Arc;

use serde::Serialize;
use shared::{
    domain::{Contact, ContactDraft, ContactId, DraftField},
    error::DirectoryError,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod repository;
pub mod store;

pub use repository::{
    ContactRepository, HttpContactRepository, NoToken, StaticToken, TokenProvider,
};
pub use store::{DirectoryStore, RemovedEntry};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Top-level state of one list-view session. `Refreshing` is only reachable
/// from `Ready` (explicit pull-to-refresh over already displayed data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Loading,
    Ready,
    Refreshing,
    Failed,
}

/// What the presentation layer renders from.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryReadModel {
    pub phase: SyncPhase,
    pub contacts: Vec<Contact>,
    pub error_message: Option<String>,
}

impl DirectoryReadModel {
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

/// Events pushed to presentation. The read model stays pullable via
/// [`SyncController::read_model`]; these only signal that something changed
/// or that a one-shot surface (alert, validation feedback) is due.
#[derive(Debug, Clone)]
pub enum DirectoryEvent {
    PhaseChanged(SyncPhase),
    ContactsChanged(Vec<Contact>),
    /// Two-step delete: the user asked, presentation must show the
    /// confirmation dialog and call `confirm_delete` or `cancel_delete`.
    DeleteRequested(ContactId),
    /// Dismissible message (delete outcome, rejected submission, ...).
    Alert(String),
    /// Field-level feedback for a submission that never left the client.
    ValidationFailed(Vec<DraftField>),
}

/// Marker sent by the navigation layer when the list screen regains focus.
#[derive(Debug, Clone, Copy)]
pub struct FocusEvent;

/// Handle for a focus subscription. Dropping (or calling `unsubscribe`)
/// aborts the listening task, so no refresh fires after session teardown.
pub struct FocusSubscription {
    task: JoinHandle<()>,
}

impl FocusSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for FocusSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ControllerState {
    phase: SyncPhase,
    error_message: Option<String>,
    /// An in-flight `list()` suppresses any further list-class call.
    load_in_flight: bool,
    pending_delete: Option<ContactId>,
    /// Bumped by `end_session`; completions carrying an older epoch are
    /// dropped instead of mutating state for a screen that is gone.
    epoch: u64,
}

/// Orchestrates refreshes and mutations for one mounted list-view session.
///
/// Single logical thread of control: every repository call is awaited and
/// its completion re-checks the session epoch before touching the store or
/// the phase. The store itself is process-wide and outlives the controller.
pub struct SyncController {
    repository: Arc<dyn ContactRepository>,
    store: Arc<DirectoryStore>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<DirectoryEvent>,
}

impl SyncController {
    pub fn new(repository: Arc<dyn ContactRepository>, store: Arc<DirectoryStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            repository,
            store,
            inner: Mutex::new(ControllerState {
                phase: SyncPhase::Idle,
                error_message: None,
                load_in_flight: false,
                pending_delete: None,
                epoch: 0,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<DirectoryStore> {
        &self.store
    }

    pub async fn read_model(&self) -> DirectoryReadModel {
        let (phase, error_message) = {
            let guard = self.inner.lock().await;
            (guard.phase, guard.error_message.clone())
        };
        DirectoryReadModel {
            phase,
            contacts: self.store.snapshot().await,
            error_message,
        }
    }

    pub async fn phase(&self) -> SyncPhase {
        self.inner.lock().await.phase
    }

    /// Loads the directory. Triggered on mount, on navigation focus regain,
    /// and as the retry affordance from `Failed`. A call while a load is
    /// already in flight is a no-op.
    pub async fn refresh(&self) -> Result<(), DirectoryError> {
        let epoch = {
            let mut guard = self.inner.lock().await;
            if guard.load_in_flight {
                debug!("refresh suppressed: list already in flight");
                return Ok(());
            }
            guard.load_in_flight = true;
            self.set_phase(&mut guard, SyncPhase::Loading);
            guard.epoch
        };

        let result = self.repository.list().await;
        self.finish_load(epoch, result).await
    }

    /// Explicit pull-to-refresh. Only meaningful over an already `Ready`
    /// list; suppressed in every other phase.
    pub async fn pull_to_refresh(&self) -> Result<(), DirectoryError> {
        let epoch = {
            let mut guard = self.inner.lock().await;
            if guard.phase != SyncPhase::Ready || guard.load_in_flight {
                debug!(phase = ?guard.phase, "pull-to-refresh suppressed");
                return Ok(());
            }
            guard.load_in_flight = true;
            self.set_phase(&mut guard, SyncPhase::Refreshing);
            guard.epoch
        };

        let result = self.repository.list().await;
        self.finish_load(epoch, result).await
    }

    async fn finish_load(
        &self,
        epoch: u64,
        result: Result<Vec<Contact>, DirectoryError>,
    ) -> Result<(), DirectoryError> {
        let mut guard = self.inner.lock().await;
        if guard.epoch != epoch {
            debug!("dropping list completion from an ended session");
            return Ok(());
        }
        guard.load_in_flight = false;
        match result {
            Ok(contacts) => {
                info!(count = contacts.len(), "directory list applied");
                self.store.replace_all(contacts).await;
                guard.error_message = None;
                self.set_phase(&mut guard, SyncPhase::Ready);
                drop(guard);
                self.emit_contacts().await;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "directory list failed");
                guard.error_message = Some("Could not load contacts.".to_string());
                self.set_phase(&mut guard, SyncPhase::Failed);
                Err(err)
            }
        }
    }

    /// First step of the destructive flow: record the intent and ask the
    /// presentation layer to confirm. Returns `false` when the id is not in
    /// the store (nothing to delete).
    pub async fn request_delete(&self, id: &ContactId) -> bool {
        if self.store.find_by_id(id).await.is_none() {
            debug!(contact_id = %id, "delete requested for unknown contact");
            return false;
        }
        {
            let mut guard = self.inner.lock().await;
            guard.pending_delete = Some(id.clone());
        }
        self.emit(DirectoryEvent::DeleteRequested(id.clone()));
        true
    }

    pub async fn cancel_delete(&self) {
        self.inner.lock().await.pending_delete = None;
    }

    /// Second step: the user confirmed. The entry is removed from the store
    /// before the network call is issued; a failed call restores it (unless
    /// a refresh superseded the snapshot it was removed from). The top-level
    /// phase is untouched either way: one item failing to delete does not
    /// invalidate the list.
    ///
    /// Returns `Ok(false)` when nothing happened (no matching pending
    /// confirmation, or the entry vanished locally).
    pub async fn confirm_delete(&self, id: &ContactId) -> Result<bool, DirectoryError> {
        let epoch = {
            let mut guard = self.inner.lock().await;
            if guard.pending_delete.as_ref() != Some(id) {
                debug!(contact_id = %id, "delete confirmation without matching request");
                return Ok(false);
            }
            guard.pending_delete = None;
            guard.epoch
        };

        let Some(removed) = self.store.optimistic_remove(id).await else {
            return Ok(false);
        };
        self.emit_contacts().await;

        let result = self.repository.delete(id).await;

        if self.inner.lock().await.epoch != epoch {
            debug!(contact_id = %id, "dropping delete completion from an ended session");
            return Ok(false);
        }

        match result {
            Ok(()) => {
                info!(contact_id = %id, "contact deleted");
                self.emit(DirectoryEvent::Alert("Contact deleted.".to_string()));
                Ok(true)
            }
            Err(DirectoryError::NotFound) => {
                // Already gone remotely; keep the removal but resynchronize
                // so the rest of the list is trustworthy again.
                warn!(contact_id = %id, "contact vanished remotely before delete");
                self.emit(DirectoryEvent::Alert(
                    "Contact no longer exists; reloading.".to_string(),
                ));
                let _ = self.refresh().await;
                Err(DirectoryError::NotFound)
            }
            Err(err) => {
                warn!(contact_id = %id, error = %err, "delete failed, rolling back");
                if self.store.restore(removed).await {
                    self.emit_contacts().await;
                } else {
                    debug!(contact_id = %id, "rollback discarded: refreshed list is authoritative");
                }
                self.emit(DirectoryEvent::Alert(
                    "Could not delete the contact.".to_string(),
                ));
                Err(err)
            }
        }
    }

    /// Creates a contact from a validated draft. Validation failures are
    /// reported synchronously and never reach the repository. No optimistic
    /// insertion: there is no id to reconcile against until the server
    /// answers.
    pub async fn submit_create(&self, draft: ContactDraft) -> Result<Contact, DirectoryError> {
        self.validated(&draft)?;
        let epoch = self.inner.lock().await.epoch;

        match self.repository.create(&draft).await {
            Ok(contact) => {
                if self.inner.lock().await.epoch != epoch {
                    return Ok(contact);
                }
                info!(contact_id = %contact.id, "contact created");
                self.store.upsert(contact.clone()).await;
                self.emit_contacts().await;
                Ok(contact)
            }
            Err(err) => {
                warn!(error = %err, "create failed");
                self.surface_submit_failure(&err, "Could not add the contact.");
                Err(err)
            }
        }
    }

    /// Whole-record replace of an existing contact. Same validation and
    /// error surfacing as create; a `NotFound` additionally forces a refresh
    /// because the local list is provably stale.
    pub async fn submit_update(
        &self,
        id: &ContactId,
        draft: ContactDraft,
    ) -> Result<Contact, DirectoryError> {
        self.validated(&draft)?;
        let epoch = self.inner.lock().await.epoch;

        match self.repository.update(id, &draft).await {
            Ok(contact) => {
                if self.inner.lock().await.epoch != epoch {
                    return Ok(contact);
                }
                info!(contact_id = %contact.id, "contact updated");
                self.store.upsert(contact.clone()).await;
                self.emit_contacts().await;
                Ok(contact)
            }
            Err(DirectoryError::NotFound) => {
                warn!(contact_id = %id, "update target vanished remotely");
                self.emit(DirectoryEvent::Alert(
                    "Contact no longer exists; reloading.".to_string(),
                ));
                let _ = self.refresh().await;
                Err(DirectoryError::NotFound)
            }
            Err(err) => {
                warn!(contact_id = %id, error = %err, "update failed");
                self.surface_submit_failure(&err, "Could not edit the contact.");
                Err(err)
            }
        }
    }

    /// Fetches one contact for the edit-form prefill. Read-only: the store
    /// is not touched, the form owns the draft until submission.
    pub async fn load_contact(&self, id: &ContactId) -> Result<Contact, DirectoryError> {
        self.repository.get_by_id(id).await
    }

    /// Spawns a task that refreshes on every navigation-focus event until
    /// the returned handle is dropped.
    pub fn subscribe_focus(
        self: &Arc<Self>,
        mut focus: broadcast::Receiver<FocusEvent>,
    ) -> FocusSubscription {
        let controller = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match focus.recv().await {
                    Ok(FocusEvent) => {
                        debug!("screen focus regained, refreshing");
                        if let Err(err) = controller.refresh().await {
                            warn!(error = %err, "focus-triggered refresh failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "focus events lagged; coalescing into one refresh");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        FocusSubscription { task }
    }

    /// Tears the session down: any still-in-flight completion is dropped
    /// when it arrives. The store is left resident for the next session.
    pub async fn end_session(&self) {
        let mut guard = self.inner.lock().await;
        guard.epoch += 1;
        guard.load_in_flight = false;
        guard.pending_delete = None;
        guard.error_message = None;
        self.set_phase(&mut guard, SyncPhase::Idle);
    }

    fn validated(&self, draft: &ContactDraft) -> Result<(), DirectoryError> {
        if let Err(fields) = draft.validate() {
            debug!(?fields, "submission blocked by field validation");
            self.emit(DirectoryEvent::ValidationFailed(fields.clone()));
            return Err(DirectoryError::Validation { fields });
        }
        Ok(())
    }

    fn surface_submit_failure(&self, err: &DirectoryError, fallback: &str) {
        match err {
            DirectoryError::Rejected { message } => {
                self.emit(DirectoryEvent::Alert(message.clone()));
            }
            _ => self.emit(DirectoryEvent::Alert(fallback.to_string())),
        }
    }

    fn set_phase(&self, guard: &mut ControllerState, phase: SyncPhase) {
        if guard.phase != phase {
            debug!(from = ?guard.phase, to = ?phase, "sync phase transition");
            guard.phase = phase;
            self.emit(DirectoryEvent::PhaseChanged(phase));
        }
    }

    async fn emit_contacts(&self) {
        self.emit(DirectoryEvent::ContactsChanged(self.store.snapshot().await));
    }

    fn emit(&self, event: DirectoryEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
