//! Per-member mutual exclusion for role mutations.
//!
//! One async mutex per (guild, user) pair, created on first use and removed
//! again once the last holder or waiter is gone.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::platform::{GuildId, MemberRef, UserId};

type MemberKey = (GuildId, UserId);

#[derive(Debug, Default)]
pub struct MemberLocks {
    locks: Arc<DashMap<MemberKey, Arc<Mutex<()>>>>,
}

impl MemberLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `member`'s role set.
    pub async fn acquire(&self, member: &MemberRef) -> MemberLease {
        let key = (member.guild_id, member.user_id);
        let lock = Arc::clone(self.locks.entry(key).or_default().value());
        let guard = lock.lock_owned().await;
        MemberLease {
            guard: Some(guard),
            key,
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of members with a live lock entry.
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive access to one member's role set. Released on drop.
#[derive(Debug)]
pub struct MemberLease {
    guard: Option<OwnedMutexGuard<()>>,
    key: MemberKey,
    locks: Arc<DashMap<MemberKey, Arc<Mutex<()>>>>,
}

impl Drop for MemberLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map itself still references the mutex: nobody is waiting.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn member(user: u64) -> MemberRef {
        MemberRef::new(GuildId(1), UserId(user), "m")
    }

    #[tokio::test]
    async fn test_lease_is_exclusive_per_member() {
        let locks = Arc::new(MemberLocks::new());
        let first = locks.acquire(&member(1)).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _lease = locks.acquire(&member(1)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // A different member is not blocked.
        let other = locks.acquire(&member(2)).await;
        drop(other);

        drop(first);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_entries_are_removed_after_release() {
        let locks = MemberLocks::new();
        {
            let _a = locks.acquire(&member(1)).await;
            let _b = locks.acquire(&member(2)).await;
            assert_eq!(locks.active(), 2);
        }
        assert_eq!(locks.active(), 0);
    }
}
