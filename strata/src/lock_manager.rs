//! Manages page-level locks for strict two-phase locking.
//!
//! All state lives behind one monitor: a mutex over the lock table plus a
//! condition variable that blocked acquirers wait on. Deadlocks are found by
//! the transaction that closes a cycle in the waits-for graph, which then
//! fails its own acquisition instead of waiting forever.

use crate::transaction::TransactionId;
use crate::PageId;
use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};

/// Represents the two modes of locking a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub enum LockError {
    Deadlock,
}

#[derive(Debug, Default)]
struct LockState {
    /// Locks held per page. A page has either one exclusive holder or any
    /// number of distinct shared holders.
    page_locks: HashMap<PageId, Vec<(TransactionId, LockMode)>>,
    /// Pages locked per transaction, the inverse of `page_locks`.
    txn_pages: HashMap<TransactionId, HashSet<PageId>>,
    /// The waits-for graph. An edge `t -> u` exists only while `t` is blocked
    /// on a lock that `u` holds; edges are rebuilt on every wait-loop pass.
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

/// The main lock manager struct.
#[derive(Debug, Default)]
pub struct LockManager {
    state: Mutex<LockState>,
    cvar: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a lock on `pid` for `tid`, blocking until it can be granted.
    /// Fails with [`LockError::Deadlock`] if waiting would close a cycle in
    /// the waits-for graph.
    pub fn acquire(
        &self,
        tid: TransactionId,
        pid: PageId,
        mode: LockMode,
    ) -> Result<(), LockError> {
        let mut state = self.state.lock().unwrap();
        loop {
            if can_grant(&state, tid, pid, mode) {
                grant(&mut state, tid, pid, mode);
                state.waits_for.remove(&tid);
                return Ok(());
            }

            // Rebuild our out-edges from the current holders before checking
            // for a cycle; stale edges from an earlier pass must not linger.
            let blockers = conflicting_holders(&state, tid, pid, mode);
            let edges = state.waits_for.entry(tid).or_default();
            edges.clear();
            edges.extend(blockers);

            if cycle_from(&state.waits_for, tid) {
                state.waits_for.remove(&tid);
                crate::strata_debug_log!("[LockManager::acquire] deadlock: aborting {tid}");
                self.cvar.notify_all();
                return Err(LockError::Deadlock);
            }

            state = self.cvar.wait(state).unwrap();
        }
    }

    /// Releases `tid`'s lock on a single page and wakes all waiters.
    ///
    /// Releasing before transaction end violates strict 2PL; the only
    /// legitimate callers are recovery and the heap file's walk over full
    /// pages it has not modified.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut state = self.state.lock().unwrap();
        release_one(&mut state, tid, pid);
        forget_waiter(&mut state, tid);
        self.cvar.notify_all();
    }

    /// Releases every lock `tid` holds and removes it from the waits-for
    /// graph. After this returns, no lock-manager state mentions `tid`.
    pub fn release_all(&self, tid: TransactionId) {
        let mut state = self.state.lock().unwrap();
        if let Some(pages) = state.txn_pages.remove(&tid) {
            for pid in pages {
                if let Some(locks) = state.page_locks.get_mut(&pid) {
                    locks.retain(|(holder, _)| *holder != tid);
                    if locks.is_empty() {
                        state.page_locks.remove(&pid);
                    }
                }
            }
        }
        forget_waiter(&mut state, tid);
        self.cvar.notify_all();
    }

    /// True if `tid` holds a lock of any mode on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        let state = self.state.lock().unwrap();
        state
            .page_locks
            .get(&pid)
            .is_some_and(|locks| locks.iter().any(|(holder, _)| *holder == tid))
    }

    /// The mode `tid` holds on `pid`, if any.
    pub fn held_mode(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        let state = self.state.lock().unwrap();
        state.page_locks.get(&pid).and_then(|locks| {
            locks
                .iter()
                .find(|(holder, _)| *holder == tid)
                .map(|(_, mode)| *mode)
        })
    }

    /// The number of pages `tid` currently has locked.
    pub fn locked_page_count(&self, tid: TransactionId) -> usize {
        let state = self.state.lock().unwrap();
        state.txn_pages.get(&tid).map_or(0, |pages| pages.len())
    }
}

fn can_grant(state: &LockState, tid: TransactionId, pid: PageId, mode: LockMode) -> bool {
    match state.page_locks.get(&pid) {
        None => true,
        Some(locks) => locks.iter().all(|(holder, held)| {
            *holder == tid || (mode == LockMode::Shared && *held == LockMode::Shared)
        }),
    }
}

fn grant(state: &mut LockState, tid: TransactionId, pid: PageId, mode: LockMode) {
    let locks = state.page_locks.entry(pid).or_default();
    match locks.iter().position(|(holder, _)| *holder == tid) {
        Some(i) => {
            // Upgrade in place; a shared re-request keeps an exclusive lock.
            if locks[i].1 == LockMode::Shared && mode == LockMode::Exclusive {
                locks[i].1 = LockMode::Exclusive;
            }
        }
        None => locks.push((tid, mode)),
    }
    state.txn_pages.entry(tid).or_default().insert(pid);
}

fn conflicting_holders(
    state: &LockState,
    tid: TransactionId,
    pid: PageId,
    mode: LockMode,
) -> Vec<TransactionId> {
    match state.page_locks.get(&pid) {
        None => Vec::new(),
        Some(locks) => locks
            .iter()
            .filter(|(holder, held)| {
                *holder != tid && (mode == LockMode::Exclusive || *held == LockMode::Exclusive)
            })
            .map(|(holder, _)| *holder)
            .collect(),
    }
}

fn release_one(state: &mut LockState, tid: TransactionId, pid: PageId) {
    if let Some(locks) = state.page_locks.get_mut(&pid) {
        locks.retain(|(holder, _)| *holder != tid);
        if locks.is_empty() {
            state.page_locks.remove(&pid);
        }
    }
    if let Some(pages) = state.txn_pages.get_mut(&tid) {
        pages.remove(&pid);
        if pages.is_empty() {
            state.txn_pages.remove(&tid);
        }
    }
}

/// Drops `tid`'s out-edges and removes it from every other waiter's edge set.
fn forget_waiter(state: &mut LockState, tid: TransactionId) {
    state.waits_for.remove(&tid);
    for edges in state.waits_for.values_mut() {
        edges.remove(&tid);
    }
}

/// DFS over the waits-for graph from `start`; a back-edge into the current
/// path is a cycle.
fn cycle_from(waits_for: &HashMap<TransactionId, HashSet<TransactionId>>, start: TransactionId) -> bool {
    let mut visited = HashSet::new();
    let mut path = HashSet::new();
    dfs(waits_for, start, &mut visited, &mut path)
}

fn dfs(
    waits_for: &HashMap<TransactionId, HashSet<TransactionId>>,
    current: TransactionId,
    visited: &mut HashSet<TransactionId>,
    path: &mut HashSet<TransactionId>,
) -> bool {
    visited.insert(current);
    path.insert(current);

    if let Some(edges) = waits_for.get(&current) {
        for &next in edges {
            if path.contains(&next) {
                return true;
            }
            if !visited.contains(&next) && dfs(waits_for, next, visited, path) {
                return true;
            }
        }
    }

    path.remove(&current);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    fn pid(n: u32) -> PageId {
        PageId::new(1, n)
    }

    #[test]
    fn shared_locks_coexist() {
        let lm = LockManager::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t2, pid(0), LockMode::Shared).unwrap();
        assert!(lm.holds_lock(t1, pid(0)));
        assert!(lm.holds_lock(t2, pid(0)));
    }

    #[test]
    fn sole_shared_holder_upgrades_in_place() {
        let lm = Arc::new(LockManager::new());
        let t1 = TransactionId::new();
        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t1, pid(0), LockMode::Exclusive).unwrap();
        assert_eq!(lm.held_mode(t1, pid(0)), Some(LockMode::Exclusive));

        // A later shared request must block until the upgrade holder lets go.
        let acquired = Arc::new(AtomicUsize::new(0));
        let lm2 = lm.clone();
        let acquired2 = acquired.clone();
        let t2 = TransactionId::new();
        let handle = thread::spawn(move || {
            lm2.acquire(t2, pid(0), LockMode::Shared).unwrap();
            acquired2.store(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(100));
        assert_eq!(acquired.load(Ordering::SeqCst), 0);

        lm.release_all(t1);
        handle.join().unwrap();
        assert_eq!(acquired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exclusive_re_request_is_idempotent() {
        let lm = LockManager::new();
        let t1 = TransactionId::new();
        lm.acquire(t1, pid(0), LockMode::Exclusive).unwrap();
        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t1, pid(0), LockMode::Exclusive).unwrap();
        assert_eq!(lm.held_mode(t1, pid(0)), Some(LockMode::Exclusive));
    }

    #[test]
    fn upgrade_waits_for_other_shared_holders() {
        let lm = Arc::new(LockManager::new());
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t2, pid(0), LockMode::Shared).unwrap();

        let lm2 = lm.clone();
        let handle = thread::spawn(move || lm2.acquire(t1, pid(0), LockMode::Exclusive));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(lm.held_mode(t1, pid(0)), Some(LockMode::Shared));

        lm.release_all(t2);
        handle.join().unwrap().unwrap();
        assert_eq!(lm.held_mode(t1, pid(0)), Some(LockMode::Exclusive));
    }

    #[test]
    fn release_all_leaves_no_trace() {
        let lm = LockManager::new();
        let t1 = TransactionId::new();
        lm.acquire(t1, pid(0), LockMode::Shared).unwrap();
        lm.acquire(t1, pid(1), LockMode::Exclusive).unwrap();
        assert_eq!(lm.locked_page_count(t1), 2);

        lm.release_all(t1);
        assert_eq!(lm.locked_page_count(t1), 0);
        assert!(!lm.holds_lock(t1, pid(0)));
        assert!(!lm.holds_lock(t1, pid(1)));

        let state = lm.state.lock().unwrap();
        assert!(state.page_locks.is_empty());
        assert!(state.txn_pages.is_empty());
        assert!(state.waits_for.is_empty());
    }

    #[test]
    fn crossed_exclusive_requests_abort_exactly_one() {
        let lm = Arc::new(LockManager::new());
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire(t1, pid(0), LockMode::Exclusive).unwrap();
        lm.acquire(t2, pid(1), LockMode::Exclusive).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let spawn = |tid: TransactionId, want: PageId, lm: Arc<LockManager>, b: Arc<Barrier>| {
            thread::spawn(move || {
                b.wait();
                let result = lm.acquire(tid, want, LockMode::Exclusive);
                if result.is_err() {
                    lm.release_all(tid);
                }
                result.is_err()
            })
        };
        let h1 = spawn(t1, pid(1), lm.clone(), barrier.clone());
        let h2 = spawn(t2, pid(0), lm.clone(), barrier.clone());

        let aborted = [h1.join().unwrap(), h2.join().unwrap()];
        assert_eq!(
            aborted.iter().filter(|&&a| a).count(),
            1,
            "exactly one side of the cycle must abort"
        );

        // The survivor holds both pages; after it releases, a newcomer can
        // lock both.
        let survivor = if aborted[0] { t2 } else { t1 };
        assert!(lm.holds_lock(survivor, pid(0)));
        assert!(lm.holds_lock(survivor, pid(1)));
        lm.release_all(survivor);

        let t3 = TransactionId::new();
        lm.acquire(t3, pid(0), LockMode::Exclusive).unwrap();
        lm.acquire(t3, pid(1), LockMode::Exclusive).unwrap();
    }
}
