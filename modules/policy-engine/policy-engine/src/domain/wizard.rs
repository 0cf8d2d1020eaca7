//! Wizard session store.
//!
//! A keyed arena of per-session authoring state with idle-TTL expiry and a
//! bounded size. Expired entries are purged lazily on access and insert;
//! there is no background sweeper. Concurrent saves to the same session id
//! are last-writer-wins.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use policy_engine_sdk::dto::{AssignmentChange, WizardContext, WizardProgress, WizardState};
use policy_engine_sdk::PolicyEngineError;
use uuid::Uuid;

use crate::config::WizardConfig;

struct WizardEntry {
    context: WizardContext,
    state: WizardState,
    touched_at: Instant,
}

/// Bounded, TTL-evicting session store.
pub struct WizardSessionStore {
    sessions: DashMap<Uuid, WizardEntry>,
    ttl: Duration,
    max_sessions: usize,
}

impl WizardSessionStore {
    #[must_use]
    pub fn new(cfg: &WizardConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::from_secs(cfg.ttl_secs),
            max_sessions: cfg.max_sessions.max(1),
        }
    }

    /// Store a freshly started session. An existing entry under the same id
    /// is overwritten.
    pub fn insert(&self, context: WizardContext) {
        self.purge_expired();
        if self.sessions.len() >= self.max_sessions
            && !self.sessions.contains_key(&context.context_id)
        {
            self.evict_stalest();
        }
        self.sessions.insert(
            context.context_id,
            WizardEntry {
                context,
                state: WizardState::Started,
                touched_at: Instant::now(),
            },
        );
    }

    /// Current progress of a live session.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown, cleared or expired id
    pub fn progress(&self, context_id: Uuid) -> Result<WizardProgress, PolicyEngineError> {
        self.drop_if_expired(context_id);
        let entry = self
            .sessions
            .get(&context_id)
            .ok_or(PolicyEngineError::SessionNotFound { context_id })?;
        Ok(WizardProgress {
            state: entry.state,
            context: entry.context.clone(),
        })
    }

    /// Save a wizard step, overwriting the pending delta (last writer
    /// wins) and refreshing the TTL.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown, cleared or expired id
    pub fn save_step(
        &self,
        context_id: Uuid,
        change: AssignmentChange,
    ) -> Result<(), PolicyEngineError> {
        self.drop_if_expired(context_id);
        let mut entry = self
            .sessions
            .get_mut(&context_id)
            .ok_or(PolicyEngineError::SessionNotFound { context_id })?;
        entry.context.pending_change = Some(change);
        entry.state = WizardState::InProgress;
        entry.touched_at = Instant::now();
        Ok(())
    }

    /// Remove a session (clear or commit), returning its final context.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown, cleared or expired id
    pub fn remove(&self, context_id: Uuid) -> Result<WizardContext, PolicyEngineError> {
        self.drop_if_expired(context_id);
        self.sessions
            .remove(&context_id)
            .map(|(_, entry)| entry.context)
            .ok_or(PolicyEngineError::SessionNotFound { context_id })
    }

    /// Number of live (non-expired) sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.purge_expired();
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drop_if_expired(&self, context_id: Uuid) {
        self.sessions
            .remove_if(&context_id, |_, entry| self.is_expired(entry));
    }

    fn purge_expired(&self) {
        self.sessions.retain(|_, entry| !self.is_expired(entry));
    }

    fn is_expired(&self, entry: &WizardEntry) -> bool {
        entry.touched_at.elapsed() >= self.ttl
    }

    fn evict_stalest(&self) {
        let stalest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().touched_at)
            .map(|entry| *entry.key());
        if let Some(context_id) = stalest {
            tracing::warn!(%context_id, "wizard store full, evicting stalest session");
            self.sessions.remove(&context_id);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use policy_engine_sdk::models::SubjectKind;

    fn store(ttl_secs: u64, max_sessions: usize) -> WizardSessionStore {
        WizardSessionStore::new(&WizardConfig {
            ttl_secs,
            max_sessions,
        })
    }

    fn context(id: Uuid) -> WizardContext {
        WizardContext {
            context_id: id,
            subject_id: Uuid::new_v4(),
            subject_kind: SubjectKind::User,
            subject_name: "jdoe".to_owned(),
            initial_assignments: vec![],
            pending_change: None,
        }
    }

    #[test]
    fn lifecycle_started_to_in_progress() {
        let store = store(60, 8);
        let id = Uuid::new_v4();
        store.insert(context(id));

        let progress = store.progress(id).unwrap();
        assert_eq!(progress.state, WizardState::Started);

        store.save_step(id, AssignmentChange::default()).unwrap();
        let progress = store.progress(id).unwrap();
        assert_eq!(progress.state, WizardState::InProgress);
        assert!(progress.context.pending_change.is_some());
    }

    #[test]
    fn unknown_session_is_not_found() {
        let store = store(60, 8);
        let id = Uuid::new_v4();
        match store.progress(id).unwrap_err() {
            PolicyEngineError::SessionNotFound { context_id } => assert_eq!(context_id, id),
            other => panic!("expected SessionNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn cleared_session_is_not_found() {
        let store = store(60, 8);
        let id = Uuid::new_v4();
        store.insert(context(id));
        store.remove(id).unwrap();
        assert!(store.progress(id).is_err());
    }

    #[test]
    fn expired_session_is_not_found() {
        // Zero TTL: every entry expires immediately.
        let store = store(0, 8);
        let id = Uuid::new_v4();
        store.insert(context(id));
        match store.progress(id).unwrap_err() {
            PolicyEngineError::SessionNotFound { .. } => {}
            other => panic!("expected SessionNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn capacity_bound_evicts_the_stalest() {
        let store = store(60, 2);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();
        store.insert(context(first));
        store.insert(context(second));
        // Refresh `first` so `second` is the stalest.
        store.save_step(first, AssignmentChange::default()).unwrap();
        store.insert(context(third));

        assert_eq!(store.len(), 2);
        assert!(store.progress(first).is_ok());
        assert!(store.progress(second).is_err());
        assert!(store.progress(third).is_ok());
    }

    #[test]
    fn same_id_insert_is_last_writer_wins() {
        let store = store(60, 8);
        let id = Uuid::new_v4();
        store.insert(context(id));
        let mut replacement = context(id);
        replacement.subject_name = "asmith".to_owned();
        store.insert(replacement);

        let progress = store.progress(id).unwrap();
        assert_eq!(progress.context.subject_name, "asmith");
        assert_eq!(store.len(), 1);
    }
}
