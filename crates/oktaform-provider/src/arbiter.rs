//! Per-parent serialization of child mutations.
//!
//! Some parent entities (a sign-on policy, a profile schema, the
//! linked-object registry, the trusted-origin set) accept only one writer
//! at a time. Every mutation of their children runs inside
//! [`Arbiter::serialize`] keyed by the parent ID. Reads never lock.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

tokio::task_local! {
    /// Keys already held by the current task. Nested `serialize` calls on
    /// a held key run straight through instead of deadlocking.
    static HELD: HashSet<String>;
}

/// Process-wide table of named async locks.
///
/// Locks are FIFO (tokio's mutex queues waiters in arrival order). There
/// is no acquire timeout; the caller's cancellation token is the only
/// way out of a wait.
#[derive(Clone, Default)]
pub struct Arbiter {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Arbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` while holding the lock for `key`.
    pub async fn serialize<F, T>(&self, key: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        if is_held(key) {
            tracing::trace!(parent = %key, "arbiter lock already held, reentering");
            return fut.await;
        }

        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        tracing::debug!(parent = %key, "arbiter lock acquired");

        let mut held = HELD.try_with(Clone::clone).unwrap_or_default();
        held.insert(key.to_string());
        let out = HELD.scope(held, fut).await;

        tracing::debug!(parent = %key, "arbiter lock released");
        out
    }

    /// Number of distinct keys seen so far.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}

fn is_held(key: &str) -> bool {
    HELD.try_with(|held| held.contains(key)).unwrap_or(false)
}

/// Arbiter key for a parent entity.
pub fn parent_key(kind: &str, id: &str) -> String {
    format!("{kind}:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type Log = Arc<std::sync::Mutex<Vec<String>>>;

    async fn critical_section(arbiter: &Arbiter, key: &str, who: &str, log: &Log) {
        arbiter
            .serialize(key, async {
                log.lock().unwrap().push(format!("{who}:start"));
                tokio::time::sleep(Duration::from_millis(20)).await;
                log.lock().unwrap().push(format!("{who}:end"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn same_parent_does_not_interleave() {
        let arbiter = Arbiter::new();
        let log: Log = Default::default();
        tokio::join!(
            critical_section(&arbiter, "policy:p1", "a", &log),
            critical_section(&arbiter, "policy:p1", "b", &log),
            critical_section(&arbiter, "policy:p1", "c", &log),
        );
        let log = log.lock().unwrap();
        for pair in log.chunks(2) {
            let who = pair[0].split(':').next().unwrap();
            assert_eq!(pair[1], format!("{who}:end"), "interleaved: {log:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn different_parents_overlap() {
        let arbiter = Arbiter::new();
        let log: Log = Default::default();
        tokio::join!(
            critical_section(&arbiter, "policy:p1", "a", &log),
            critical_section(&arbiter, "policy:p2", "b", &log),
        );
        let log = log.lock().unwrap();
        assert_eq!(log[0..2], ["a:start".to_string(), "b:start".to_string()]);
        assert_eq!(arbiter.len(), 2);
    }

    #[tokio::test]
    async fn nested_acquire_is_reentrant() {
        let arbiter = Arbiter::new();
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            arbiter.serialize("schema:default", async {
                arbiter
                    .serialize("schema:default", async { 7 })
                    .await
            }),
        )
        .await;
        assert_eq!(result.ok(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_served_in_arrival_order() {
        let arbiter = Arbiter::new();
        let log: Log = Default::default();
        let first = critical_section(&arbiter, "k", "first", &log);
        let second = async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            critical_section(&arbiter, "k", "second", &log).await
        };
        let third = async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            critical_section(&arbiter, "k", "third", &log).await
        };
        tokio::join!(first, second, third);
        let starts: Vec<_> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.ends_with(":start"))
            .cloned()
            .collect();
        assert_eq!(starts, ["first:start", "second:start", "third:start"]);
    }
}
