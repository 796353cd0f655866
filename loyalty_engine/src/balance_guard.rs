//! Per-user mutual exclusion for balance updates.
//!
//! A credit from the reconciler and a withdrawal from the request path can target the same user at the same time.
//! Both paths acquire the user's lock from the same [`BalanceGuard`] before touching the balance, so the two never
//! interleave.
//!
//! Locks are created on first use and then live for as long as the guard does. For deployments with very many users,
//! [`BalanceGuard::with_shards`] bounds the lock table to a fixed number of locks, at the cost of unrelated users
//! occasionally waiting on each other.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use log::trace;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::db_types::UserId;

type UserLock = Arc<AsyncMutex<()>>;

#[derive(Clone)]
enum LockTable {
    PerUser(Arc<Mutex<HashMap<UserId, UserLock>>>),
    Sharded(Arc<Vec<UserLock>>),
}

#[derive(Clone)]
pub struct BalanceGuard {
    locks: LockTable,
}

/// Holds a user's balance lock. The lock is released when this value is dropped.
#[must_use = "the balance lock is released as soon as the guard is dropped"]
pub struct BalanceLock {
    user_id: UserId,
    _guard: OwnedMutexGuard<()>,
}

impl BalanceLock {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Default for BalanceGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl BalanceGuard {
    /// One lock per user id.
    pub fn new() -> Self {
        Self { locks: LockTable::PerUser(Arc::new(Mutex::new(HashMap::new()))) }
    }

    /// A fixed table of `shards` locks. Users are mapped onto a shard by their id. A shard count of zero means one
    /// lock per user, as with [`BalanceGuard::new`].
    pub fn with_shards(shards: usize) -> Self {
        if shards == 0 {
            return Self::new();
        }
        let locks = (0..shards).map(|_| Arc::new(AsyncMutex::new(()))).collect::<Vec<_>>();
        Self { locks: LockTable::Sharded(Arc::new(locks)) }
    }

    /// Waits until the user's balance lock is free and takes it.
    pub async fn acquire(&self, user_id: UserId) -> BalanceLock {
        let lock = self.lock_for(user_id);
        let guard = lock.lock_owned().await;
        trace!("🔒️ Balance lock acquired for {user_id}");
        BalanceLock { user_id, _guard: guard }
    }

    /// The number of distinct locks currently held in the table.
    pub fn lock_count(&self) -> usize {
        match &self.locks {
            LockTable::PerUser(map) => map.lock().unwrap_or_else(PoisonError::into_inner).len(),
            LockTable::Sharded(shards) => shards.len(),
        }
    }

    fn lock_for(&self, user_id: UserId) -> UserLock {
        match &self.locks {
            LockTable::PerUser(map) => {
                let mut map = map.lock().unwrap_or_else(PoisonError::into_inner);
                Arc::clone(map.entry(user_id).or_default())
            },
            LockTable::Sharded(shards) => {
                let index = user_id.value().rem_euclid(shards.len() as i64) as usize;
                Arc::clone(&shards[index])
            },
        }
    }
}
