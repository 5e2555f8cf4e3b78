// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction coordinator
//!
//! Runs callbacks inside remote read/write transactions:
//!
//! - The outermost call owns the real remote transaction (level 1). When
//!   the store aborts it, the whole callback is replayed on a fresh
//!   transaction until the attempt budget is spent.
//! - Calls made while a transaction is open become virtual nested levels.
//!   They share the remote transaction, never talk to the store on their
//!   own, and never retry.
//! - Post-commit hooks are queued per level. A nested level that succeeds
//!   hands its hooks to its parent; one that fails drops them. Only a
//!   successful remote commit runs them.

use super::context::TransactionContext;
use super::state::TransactionHandle;
use crate::error::{Error, Result};
use crate::events::{Event, EventSink};
use crate::mutation::MutationBatcher;
use crate::session::{SessionHandle, SessionSource};
use crate::store::{RequestOptions, StoreClient, TransactionId};
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) type CommitHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct CoordinatorState {
    level: u32,
    handle: Option<TransactionHandle>,
    /// One queue per open level; `hooks[0]` belongs to level 1
    hooks: Vec<Vec<CommitHook>>,
    request_tag: Option<String>,
    transaction_tag: Option<String>,
}

pub struct TransactionCoordinator {
    pub(crate) store: Arc<dyn StoreClient>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) batcher: Arc<MutationBatcher>,
    default_attempts: u32,
    state: Mutex<CoordinatorState>,
}

impl TransactionCoordinator {
    pub fn new(
        store: Arc<dyn StoreClient>,
        events: Arc<dyn EventSink>,
        batcher: Arc<MutationBatcher>,
        default_attempts: u32,
    ) -> Self {
        Self {
            store,
            events,
            batcher,
            default_attempts: default_attempts.max(1),
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    pub fn default_attempts(&self) -> u32 {
        self.default_attempts
    }

    pub fn in_transaction(&self) -> bool {
        self.state.lock().level > 0
    }

    pub fn transaction_level(&self) -> u32 {
        self.state.lock().level
    }

    pub fn set_request_tag(&self, tag: Option<String>) {
        self.state.lock().request_tag = tag;
    }

    pub fn set_transaction_tag(&self, tag: Option<String>) {
        self.state.lock().transaction_tag = tag;
    }

    pub fn request_tag(&self) -> Option<String> {
        self.state.lock().request_tag.clone()
    }

    pub fn transaction_tag(&self) -> Option<String> {
        self.state.lock().transaction_tag.clone()
    }

    /// Tags to attach to the next request
    pub fn request_options(&self) -> RequestOptions {
        let state = self.state.lock();
        RequestOptions {
            request_tag: state.request_tag.clone(),
            transaction_tag: state.transaction_tag.clone(),
        }
    }

    /// Context for statements issued on the open transaction, if any
    pub fn current_context(&self) -> Option<TransactionContext<'_>> {
        let state = self.state.lock();
        let handle = state.handle.as_ref()?;
        Some(TransactionContext::new(
            self,
            handle.session.name.clone(),
            handle.id.clone(),
        ))
    }

    /// Queue `hook` to run after the remote commit
    ///
    /// Outside a transaction the hook runs immediately.
    pub fn after_commit(&self, hook: impl FnOnce() + Send + 'static) {
        let hook: CommitHook = Box::new(hook);
        let pending = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            match state.hooks.last_mut() {
                Some(queue) if state.level > 0 => {
                    queue.push(hook);
                    None
                }
                _ => Some(hook),
            }
        };
        if let Some(hook) = pending {
            hook();
        }
    }

    /// Run `f` in a transaction
    ///
    /// `attempts` bounds how often an aborted outer transaction is tried;
    /// it is ignored for nested calls.
    pub fn run_in_transaction<T, F>(
        &self,
        sessions: &SessionSource,
        attempts: Option<u32>,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut(&TransactionContext<'_>) -> Result<T>,
    {
        if self.in_transaction() {
            return self.run_nested(f);
        }

        let attempts = attempts.unwrap_or(self.default_attempts).max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let session = sessions.acquire()?;
            let outcome = self.attempt(&session, &mut f);
            sessions.finish(&session, &outcome);

            match outcome {
                Ok((value, hooks)) => {
                    for hook in hooks {
                        hook();
                    }
                    return Ok(value);
                }
                Err(err) if err.is_aborted() && attempt < attempts => {
                    log::warn!(
                        "Transaction aborted (attempt {}/{}), retrying: {}",
                        attempt,
                        attempts,
                        err
                    );
                }
                Err(err) => {
                    if err.is_aborted() {
                        log::error!("Transaction aborted after {} attempts: {}", attempt, err);
                    }
                    return Err(err);
                }
            }
        }
    }

    /// One try of the outer transaction: begin, run, commit or roll back
    fn attempt<T, F>(&self, session: &SessionHandle, f: &mut F) -> Result<(T, Vec<CommitHook>)>
    where
        F: FnMut(&TransactionContext<'_>) -> Result<T>,
    {
        let id = self
            .store
            .begin_transaction(&session.name, &self.request_options())?;
        {
            let mut state = self.state.lock();
            state.level = 1;
            state.handle = Some(TransactionHandle::new(session.clone(), id.clone()));
            state.hooks = vec![Vec::new()];
        }
        log::debug!("Began transaction {} on session {}", id, session.name);
        self.events
            .dispatch(&Event::TransactionBeginning { level: 1 });

        let context = TransactionContext::new(self, session.name.clone(), id.clone());
        let outcome = f(&context).and_then(|value| {
            self.events
                .dispatch(&Event::TransactionCommitting { level: 1 });
            self.store
                .commit(&session.name, &id, &self.request_options())?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                let hooks: Vec<CommitHook> = {
                    let mut state = self.state.lock();
                    if let Some(handle) = state.handle.as_mut() {
                        handle.mark_committed();
                    }
                    state.level = 0;
                    state.handle = None;
                    std::mem::take(&mut state.hooks)
                        .into_iter()
                        .flatten()
                        .collect()
                };
                log::debug!("Committed transaction {}", id);
                self.events
                    .dispatch(&Event::TransactionCommitted { level: 1 });
                Ok((value, hooks))
            }
            Err(err) => {
                self.rollback(&session.name, &id, &err);
                {
                    let mut state = self.state.lock();
                    state.level = 0;
                    state.handle = None;
                    state.hooks.clear();
                }
                self.events
                    .dispatch(&Event::TransactionRolledBack { level: 1 });
                Err(err)
            }
        }
    }

    /// Roll back the remote transaction if it is still open
    ///
    /// A failed rollback is logged; the error that caused it stands.
    fn rollback(&self, session: &str, id: &TransactionId, cause: &Error) {
        let active = {
            let mut state = self.state.lock();
            match state.handle.as_mut() {
                Some(handle) if handle.is_active() => {
                    handle.mark_rolled_back();
                    true
                }
                _ => false,
            }
        };
        if !active {
            return;
        }
        log::debug!("Rolling back transaction {} after error: {}", id, cause);
        if let Err(status) = self.store.rollback(session, id) {
            log::warn!("Rollback of transaction {} failed: {}", id, status);
        }
    }

    /// A virtual level inside the open transaction
    pub(crate) fn run_nested<T, F>(&self, mut f: F) -> Result<T>
    where
        F: FnMut(&TransactionContext<'_>) -> Result<T>,
    {
        let (level, session, id) = {
            let mut state = self.state.lock();
            let Some(handle) = state.handle.as_ref() else {
                return Err(Error::Logic(
                    "No open transaction to nest into".to_string(),
                ));
            };
            let (session, id) = (handle.session.name.clone(), handle.id.clone());
            state.level += 1;
            state.hooks.push(Vec::new());
            (state.level, session, id)
        };
        log::debug!("Entering nested transaction level {}", level);
        self.events.dispatch(&Event::TransactionBeginning { level });

        let context = TransactionContext::new(self, session, id);
        match f(&context) {
            Ok(value) => {
                {
                    let mut state = self.state.lock();
                    let own = (level as usize - 1).min(state.hooks.len());
                    let hooks: Vec<CommitHook> =
                        state.hooks.split_off(own).into_iter().flatten().collect();
                    if let Some(parent) = state.hooks.last_mut() {
                        parent.extend(hooks);
                    }
                    state.level = level - 1;
                }
                self.events.dispatch(&Event::TransactionCommitted { level });
                Ok(value)
            }
            Err(err) => {
                {
                    let mut state = self.state.lock();
                    let own = (level as usize - 1).min(state.hooks.len());
                    state.hooks.truncate(own);
                }
                self.events.dispatch(&Event::TransactionRolledBack { level });
                self.state.lock().level = level - 1;
                Err(err)
            }
        }
    }
}
