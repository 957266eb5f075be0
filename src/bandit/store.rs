use dashmap::DashMap;
use ndarray::Array1;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use super::linucb::LinUcb;
use crate::ranking::features::FEATURE_DIM;
use crate::TARGET_BANDIT;

/// Number of recently ranked article contexts retained per user, so a later
/// feedback call can recover the exact vector used at prediction time.
pub const CONTEXT_CACHE_SIZE: usize = 64;

/// Capacity policy for the per-user bandit store.
#[derive(Debug, Clone, Copy)]
pub enum CapacityPolicy {
    Unbounded,
    /// Evict the least-recently-used user once this many users are tracked.
    MaxUsers(usize),
}

/// One user's bandit plus the contexts of articles recently ranked for them.
pub struct UserBandit {
    pub bandit: LinUcb,
    contexts: VecDeque<(String, Array1<f64>)>,
}

impl UserBandit {
    fn new(alpha: f64) -> Self {
        Self {
            bandit: LinUcb::new(FEATURE_DIM, alpha),
            contexts: VecDeque::with_capacity(CONTEXT_CACHE_SIZE),
        }
    }

    /// Remembers the context an article was scored with. The cache is
    /// bounded; the oldest entry falls out first.
    pub fn remember_context(&mut self, article_id: &str, context: Array1<f64>) {
        self.contexts.retain(|(id, _)| id != article_id);
        self.contexts.push_back((article_id.to_string(), context));
        if self.contexts.len() > CONTEXT_CACHE_SIZE {
            self.contexts.pop_front();
        }
    }

    /// The context the article was last scored with, if still cached.
    pub fn context_for(&self, article_id: &str) -> Option<Array1<f64>> {
        self.contexts
            .iter()
            .find(|(id, _)| id == article_id)
            .map(|(_, context)| context.clone())
    }
}

/// A stored user entry. The mutex serializes all access to the bandit state
/// for one user; distinct users proceed fully in parallel.
pub struct BanditHandle {
    state: Mutex<UserBandit>,
    last_used: AtomicI64,
}

impl BanditHandle {
    pub fn lock(&self) -> MutexGuard<'_, UserBandit> {
        // A poisoned lock only records that some caller panicked while
        // holding it; the state itself stays consistent (updates mutate A
        // and b before the solve, which cannot panic), so recover the guard
        // rather than failing every later request for this user.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self, tick: i64) {
        self.last_used.store(tick, Ordering::Relaxed);
    }
}

/// Process-wide registry of per-user bandit state.
///
/// Lookup and first-access creation are atomic per user id. Memory growth is
/// bounded by the configured [`CapacityPolicy`] instead of growing without
/// limit for the process lifetime.
pub struct BanditStore {
    users: DashMap<String, Arc<BanditHandle>>,
    clock: AtomicI64,
    alpha: f64,
    policy: CapacityPolicy,
}

impl BanditStore {
    pub fn new(alpha: f64, policy: CapacityPolicy) -> Self {
        Self {
            users: DashMap::new(),
            clock: AtomicI64::new(0),
            alpha,
            policy,
        }
    }

    /// Returns the handle for a user, creating fresh bandit state on first
    /// access. Exactly one instance is created even under concurrent first
    /// requests for the same new user.
    pub fn get_or_create(&self, user_id: &str) -> Arc<BanditHandle> {
        let handle = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| {
                info!(target: TARGET_BANDIT, "Creating bandit state for user {}", user_id);
                Arc::new(BanditHandle {
                    state: Mutex::new(UserBandit::new(self.alpha)),
                    last_used: AtomicI64::new(0),
                })
            })
            .clone();

        handle.touch(self.clock.fetch_add(1, Ordering::Relaxed));

        // Enforce the bound after the insert: a check before it would be
        // check-then-act, and concurrent first requests for different new
        // users could each pass it and leave the store over capacity for
        // good. Any transient overshoot is shrunk back here, one victim per
        // iteration, never evicting the entry just returned.
        if let CapacityPolicy::MaxUsers(max) = self.policy {
            while self.users.len() > max {
                if !self.evict_least_recently_used(user_id) {
                    break;
                }
            }
        }

        handle
    }

    /// Returns the handle for a user, if one exists.
    pub fn get(&self, user_id: &str) -> Option<Arc<BanditHandle>> {
        let handle = self.users.get(user_id)?.clone();
        handle.touch(self.clock.fetch_add(1, Ordering::Relaxed));
        Some(handle)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Removes the least-recently-used entry other than `keep_user`.
    /// Returns false when no evictable entry remains.
    fn evict_least_recently_used(&self, keep_user: &str) -> bool {
        let oldest = self
            .users
            .iter()
            .filter(|entry| entry.key() != keep_user)
            .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        match oldest {
            Some(user_id) => {
                debug!(target: TARGET_BANDIT, "Evicting bandit state for user {}", user_id);
                self.users.remove(&user_id);
                true
            }
            None => false,
        }
    }
}
