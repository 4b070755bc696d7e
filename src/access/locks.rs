use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Owners sort before repositories, so a caller that needs both always
/// takes the owner locks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum LockKey {
    Owner(i64),
    Repo(i64),
}

/// Per-owner and per-repository write locks.
///
/// Recalculations of the same repository are serialized so their
/// delete/insert pairs never interleave. Distinct repositories do not share
/// a lock. The owner lock guards the set of repositories an owner has:
/// creating or transferring a repository takes it, and so does every team
/// change before it lists the organization's repositories.
///
/// Callers acquire owner locks before repository locks.
#[derive(Debug, Clone, Default)]
pub struct RepoLocks {
    inner: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

/// Held locks; released on drop.
#[derive(Debug)]
pub struct RepoGuard {
    guards: Vec<OwnedMutexGuard<()>>,
}

impl RepoGuard {
    /// Hold the locks of `other` as well.
    pub fn join(mut self, other: RepoGuard) -> RepoGuard {
        self.guards.extend(other.guards);
        self
    }
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn acquire(&self, keys: BTreeSet<LockKey>) -> RepoGuard {
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.handle(key).lock_owned().await);
        }
        RepoGuard { guards }
    }

    pub async fn lock(&self, repo_id: i64) -> RepoGuard {
        self.lock_many([repo_id]).await
    }

    /// Lock several repositories, always in ascending id order so two
    /// callers with overlapping sets cannot deadlock.
    pub async fn lock_many<I>(&self, repo_ids: I) -> RepoGuard
    where
        I: IntoIterator<Item = i64>,
    {
        self.acquire(repo_ids.into_iter().map(LockKey::Repo).collect())
            .await
    }

    /// Lock the repository sets of one or more owners, in ascending id order.
    pub async fn lock_owners<I>(&self, owner_ids: I) -> RepoGuard
    where
        I: IntoIterator<Item = i64>,
    {
        self.acquire(owner_ids.into_iter().map(LockKey::Owner).collect())
            .await
    }
}
