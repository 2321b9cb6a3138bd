//! Re-entrancy guard
//!
//! Writing a destination copy raises a save event of its own. The records
//! currently being synchronized, origins and the copies being written, are
//! kept in an [`InFlight`] set together with the thread doing the work.
//!
//! Events raised on the owning thread are nested and ignored. Events raised
//! on another thread are real saves that landed mid-sync: they mark the key
//! pending, and the owner picks them up before it lets go (see
//! [`InFlightGuard::release`]).

use mirror_common::RecordKey;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct State {
    owners: HashMap<RecordKey, ThreadId>,
    pending: HashSet<RecordKey>,
}

/// Records currently being synchronized
#[derive(Debug, Default)]
pub struct InFlight {
    state: Mutex<State>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: RecordKey) -> bool {
        self.lock().owners.contains_key(&key)
    }

    /// Whether another thread saved `key` while it was held
    pub fn is_pending(&self, key: RecordKey) -> bool {
        self.lock().pending.contains(&key)
    }

    /// Claim `key`, or `None` if it is already in flight.
    ///
    /// A key held by another thread is marked pending so its owner syncs it
    /// again before releasing it.
    pub fn enter(&self, key: RecordKey) -> Option<InFlightGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.lock();
        match state.owners.get(&key) {
            Some(owner) if *owner == me => None,
            Some(_) => {
                state.pending.insert(key);
                None
            }
            None => {
                state.owners.insert(key, me);
                Some(InFlightGuard {
                    set: self,
                    held: vec![key],
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().owners.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of [`InFlightGuard::release`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// The entered key was saved again meanwhile; nothing was released
    Rerun,

    /// Every key was released. These other held keys were saved by another
    /// thread while held.
    Released(Vec<RecordKey>),
}

/// Keys claimed for one save event; released on drop
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    set: &'a InFlight,
    held: Vec<RecordKey>,
}

impl InFlightGuard<'_> {
    /// Claim another key until this guard drops.
    ///
    /// Keys someone else already holds stay theirs.
    pub fn hold(&mut self, key: RecordKey) {
        let me = thread::current().id();
        let mut state = self.set.lock();
        if !state.owners.contains_key(&key) {
            state.owners.insert(key, me);
            self.held.push(key);
        }
    }

    pub fn held(&self) -> &[RecordKey] {
        &self.held
    }

    /// The key this guard was entered with
    pub fn root(&self) -> Option<RecordKey> {
        self.held.first().copied()
    }

    /// Release every held key unless the entered key is pending.
    ///
    /// The pending check and the release happen under one lock, so a save
    /// from another thread either lands before (and is returned) or finds the
    /// key free.
    pub fn release(&mut self) -> Release {
        let mut state = self.set.lock();
        if let Some(root) = self.held.first() {
            if state.pending.remove(root) {
                return Release::Rerun;
            }
        }

        let mut saved = Vec::new();
        for key in self.held.drain(..) {
            state.owners.remove(&key);
            if state.pending.remove(&key) {
                saved.push(key);
            }
        }
        Release::Released(saved)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.set.lock();
        for key in &self.held {
            state.owners.remove(key);
            state.pending.remove(key);
        }
    }
}
