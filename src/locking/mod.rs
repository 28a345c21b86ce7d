//! Dual-graph locking
//!
//! A [`DualGraph`] keeps two physical copies of one logical graph. Readers
//! always see the read target, the single writer mutates the write target.
//! An outermost commit publishes the write target as the new read target and
//! replays the edit journal onto the former read target, which then becomes
//! the next write target. Readers therefore never wait for writer progress
//! and the writer never copies the whole graph.
//!
//! Write locks are re-entrant on the owning thread: nested acquisitions open
//! nested edit frames that can be committed into their parent or rolled back
//! on their own.

use crate::graph::{Graph, GraphError, GraphId, GraphReadMethods, GraphResult, GraphWriteMethods, ModificationCounters};
use parking_lot::lock_api::ArcRwLockReadGuard;
use parking_lot::{Condvar, Mutex, MutexGuard, RawRwLock, RwLock};
use rustc_hash::FxHashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Published to commit listeners after every outermost commit or flush
#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvent {
    pub graph: GraphId,
    /// Name the write lock was acquired with
    pub name: String,
    pub significant: bool,
    /// Counters of the new read target
    pub counters: ModificationCounters,
    /// Number of journaled edits published
    pub edits: usize,
}

/// Observer of committed changes
pub trait CommitListener: Send + Sync {
    fn graph_committed(&self, event: &CommitEvent);
}

/// Snapshot of lock state for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockSnapshot {
    /// Number of read handles currently held.
    pub readers: usize,
    /// Nesting depth of the write lock, 0 when no writer holds it.
    pub writer_depth: usize,
    /// Threads blocked waiting for the write lock.
    pub waiting_writers: usize,
    /// Outermost commits and flushes so far.
    pub commits: u64,
}

/// Tuning for a [`DualGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Write-lock waits longer than this are logged as warnings
    pub slow_write_wait: Option<Duration>,
}

impl Default for LockOptions {
    fn default() -> Self {
        LockOptions {
            slow_write_wait: Some(Duration::from_secs(1)),
        }
    }
}

#[derive(Debug, Default)]
struct LockState {
    read_index: usize,
    owner: Option<ThreadId>,
    /// Serials of the open write handles, outermost first
    open: Vec<u64>,
    next_serial: u64,
    /// Read handles held per thread
    readers: FxHashMap<ThreadId, usize>,
    waiting_writers: usize,
    commits: u64,
}

impl LockState {
    fn write_index(&self) -> usize {
        1 - self.read_index
    }

    fn reads_held_by(&self, thread: ThreadId) -> usize {
        self.readers.get(&thread).copied().unwrap_or(0)
    }
}

struct Shared {
    id: GraphId,
    targets: [Arc<RwLock<Graph>>; 2],
    state: Mutex<LockState>,
    wakeup: Condvar,
    listeners: Mutex<Vec<Arc<dyn CommitListener>>>,
    options: LockOptions,
}

#[derive(Clone, Copy)]
enum Wait<'a> {
    Forever,
    Until(Instant),
    Interruptible(&'a Interrupter),
}

/// A logical graph with separate read and write targets
#[derive(Clone)]
pub struct DualGraph {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for DualGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualGraph")
            .field("id", &self.shared.id)
            .field("lock", &self.lock_snapshot())
            .finish()
    }
}

impl DualGraph {
    /// Wrap a graph; both targets start as copies of it
    pub fn new(graph: Graph) -> Self {
        Self::with_options(graph, LockOptions::default())
    }

    pub fn with_options(graph: Graph, options: LockOptions) -> Self {
        let graph = graph.detached_copy();
        let id = graph.id();
        info!(
            "Created dual graph {} ({} vertices, {} transactions)",
            id,
            graph.vertex_count(),
            graph.transaction_count()
        );
        let copy = graph.clone();
        DualGraph {
            shared: Arc::new(Shared {
                id,
                targets: [Arc::new(RwLock::new(graph)), Arc::new(RwLock::new(copy))],
                state: Mutex::new(LockState::default()),
                wakeup: Condvar::new(),
                listeners: Mutex::new(Vec::new()),
                options,
            }),
        }
    }

    /// Stable identity shared by both targets
    pub fn id(&self) -> GraphId {
        self.shared.id
    }

    /// Acquire a read handle on the last committed state.
    ///
    /// Never waits for the writer. On the thread holding the write lock it
    /// returns the read target, not the uncommitted write target.
    pub fn get_readable_graph(&self) -> ReadHandle {
        let thread = thread::current().id();
        let mut state = self.shared.state.lock();
        // The current read target is never write-locked, so this does not block
        let guard = self.shared.targets[state.read_index].read_arc();
        *state.readers.entry(thread).or_insert(0) += 1;
        trace!("Read lock acquired on graph {}", self.shared.id);
        ReadHandle {
            shared: Arc::clone(&self.shared),
            guard: Some(guard),
            thread,
        }
    }

    /// Acquire the write lock, blocking until it is available
    pub fn get_writable_graph(&self, name: &str, significant: bool) -> GraphResult<WriteHandle> {
        self.acquire(name, significant, Wait::Forever)?
            .ok_or_else(|| GraphError::IllegalState("write lock not granted".to_string()))
    }

    /// Acquire the write lock, failing with `Interrupted` if `interrupter`
    /// fires while waiting or has fired since its last use. The interrupt is
    /// consumed either way.
    pub fn get_writable_graph_interruptibly(
        &self,
        name: &str,
        significant: bool,
        interrupter: &Interrupter,
    ) -> GraphResult<WriteHandle> {
        if !Arc::ptr_eq(&interrupter.shared, &self.shared) {
            return Err(GraphError::IllegalState(
                "interrupter belongs to another graph".to_string(),
            ));
        }
        if interrupter.consume() {
            debug!("Write lock '{}' requested with a pending interrupt", name);
            return Err(GraphError::Interrupted);
        }
        self.acquire(name, significant, Wait::Interruptible(interrupter))?
            .ok_or(GraphError::Interrupted)
    }

    /// Acquire the write lock if it is granted within `timeout`
    pub fn try_get_writable_graph(
        &self,
        name: &str,
        significant: bool,
        timeout: Duration,
    ) -> GraphResult<Option<WriteHandle>> {
        self.acquire(name, significant, Wait::Until(Instant::now() + timeout))
    }

    fn acquire(&self, name: &str, significant: bool, wait: Wait<'_>) -> GraphResult<Option<WriteHandle>> {
        let me = thread::current().id();
        let mut state = self.shared.state.lock();
        if state.reads_held_by(me) > 0 {
            return Err(GraphError::IllegalState(
                "attempting to write while holding a read lock".to_string(),
            ));
        }

        if state.owner != Some(me) {
            let started = Instant::now();
            state.waiting_writers += 1;
            while state.owner.is_some() {
                match wait {
                    Wait::Forever => self.shared.wakeup.wait(&mut state),
                    Wait::Until(deadline) => {
                        if self.shared.wakeup.wait_until(&mut state, deadline).timed_out()
                            && state.owner.is_some()
                        {
                            state.waiting_writers -= 1;
                            debug!("Write lock '{}' not granted before timeout", name);
                            return Ok(None);
                        }
                    }
                    Wait::Interruptible(interrupter) => {
                        if interrupter.consume() {
                            state.waiting_writers -= 1;
                            debug!("Wait for write lock '{}' interrupted", name);
                            return Err(GraphError::Interrupted);
                        }
                        self.shared.wakeup.wait(&mut state);
                    }
                }
            }
            state.waiting_writers -= 1;
            state.owner = Some(me);

            let waited = started.elapsed();
            if let Some(threshold) = self.shared.options.slow_write_wait {
                if waited > threshold {
                    warn!("Waited {:?} for write lock '{}' on graph {}", waited, name, self.shared.id);
                }
            }
        }

        let serial = state.next_serial;
        state.next_serial += 1;
        state.open.push(serial);
        let depth = state.open.len();
        let write_index = state.write_index();
        drop(state);

        self.shared.targets[write_index].write().begin_frame(name);
        debug!("Write lock '{}' granted at depth {}", name, depth);
        Ok(Some(WriteHandle {
            shared: Arc::clone(&self.shared),
            name: name.to_string(),
            significant,
            depth,
            serial,
            finished: false,
            _not_send: PhantomData,
        }))
    }

    /// Handle that can interrupt interruptible waits on this graph
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            flag: Arc::new(AtomicBool::new(false)),
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn add_commit_listener(&self, listener: Arc<dyn CommitListener>) {
        self.shared.listeners.lock().push(listener);
    }

    pub fn remove_commit_listener(&self, listener: &Arc<dyn CommitListener>) {
        self.shared
            .listeners
            .lock()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn lock_snapshot(&self) -> LockSnapshot {
        let state = self.shared.state.lock();
        LockSnapshot {
            readers: state.readers.values().sum(),
            writer_depth: state.open.len(),
            waiting_writers: state.waiting_writers,
            commits: state.commits,
        }
    }
}

/// Interrupts a thread waiting in `get_writable_graph_interruptibly`.
///
/// Clone it and hand the clone to the thread that should do the
/// interrupting.
#[derive(Clone)]
pub struct Interrupter {
    flag: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Taking the state lock orders the flag before the waiter's next check
        let _state = self.shared.state.lock();
        self.shared.wakeup.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn consume(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

/// Grant to read the last committed state
pub struct ReadHandle {
    shared: Arc<Shared>,
    guard: Option<ArcRwLockReadGuard<RawRwLock, Graph>>,
    thread: ThreadId,
}

impl ReadHandle {
    /// Release the handle; a second release fails
    pub fn release(&mut self) -> GraphResult<()> {
        if self.guard.take().is_none() {
            return Err(GraphError::IllegalState("read lock already released".to_string()));
        }
        let mut state = self.shared.state.lock();
        if let Some(count) = state.readers.get_mut(&self.thread) {
            *count -= 1;
            if *count == 0 {
                state.readers.remove(&self.thread);
            }
        }
        trace!("Read lock released on graph {}", self.shared.id);
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.guard.is_none()
    }
}

impl GraphReadMethods for ReadHandle {
    fn with_read<R, F>(&self, f: F) -> GraphResult<R>
    where
        F: FnOnce(&Graph) -> GraphResult<R>,
    {
        match &self.guard {
            Some(guard) => f(&**guard),
            None => Err(GraphError::IllegalState(
                "read lock used after release".to_string(),
            )),
        }
    }
}

impl Drop for ReadHandle {
    fn drop(&mut self) {
        if self.guard.is_some() {
            let _ = self.release();
        }
    }
}

/// Grant to modify the write target.
///
/// Finish every handle with [`commit`](WriteHandle::commit) or
/// [`roll_back`](WriteHandle::roll_back), innermost first. A handle dropped
/// unfinished is rolled back together with any handles nested inside it,
/// which are then finished.
pub struct WriteHandle {
    shared: Arc<Shared>,
    name: String,
    significant: bool,
    depth: usize,
    serial: u64,
    finished: bool,
    /// Write handles belong to the thread that owns the lock
    _not_send: PhantomData<*const ()>,
}

impl WriteHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_significant(&self) -> bool {
        self.significant
    }

    /// Nesting depth of this handle, 1 for the outermost
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Write target, while this handle is still open
    fn target(&self) -> GraphResult<&Arc<RwLock<Graph>>> {
        let state = self.shared.state.lock();
        if self.finished || !state.open.contains(&self.serial) {
            return Err(GraphError::IllegalState(format!(
                "write handle '{}' used after it finished",
                self.name
            )));
        }
        Ok(&self.shared.targets[state.write_index()])
    }

    fn check_innermost(&self, state: &LockState) -> GraphResult<()> {
        if self.finished {
            return Err(GraphError::IllegalState(format!(
                "write handle '{}' already finished",
                self.name
            )));
        }
        if state.open.last() != Some(&self.serial) || state.owner != Some(thread::current().id()) {
            return Err(GraphError::IllegalState(format!(
                "write handle '{}' at depth {} is not the innermost open handle",
                self.name, self.depth
            )));
        }
        Ok(())
    }

    /// Commit this handle's edits.
    ///
    /// A nested commit hands its edits to the enclosing handle. The outermost
    /// commit publishes them to readers and releases the write lock.
    pub fn commit(&mut self) -> GraphResult<()> {
        let mut state = self.shared.state.lock();
        self.check_innermost(&state)?;
        let write_index = state.write_index();

        if self.depth > 1 {
            state.open.pop();
            drop(state);
            self.shared.targets[write_index].write().commit_frame();
            self.finished = true;
            debug!("Nested write '{}' committed into depth {}", self.name, self.depth - 1);
            return Ok(());
        }

        if state.reads_held_by(thread::current().id()) > 0 {
            return Err(GraphError::IllegalState(
                "cannot commit while this thread holds a read lock".to_string(),
            ));
        }
        drop(state);

        let event = self.publish(write_index);

        let mut state = self.shared.state.lock();
        state.owner = None;
        state.open.clear();
        self.shared.wakeup.notify_all();
        drop(state);
        self.finished = true;

        debug!("Write lock '{}' released after commit", self.name);
        self.notify(&event);
        Ok(())
    }

    /// Publish the edits so far and keep the write lock with an empty journal
    pub fn flush(&mut self) -> GraphResult<()> {
        let state = self.shared.state.lock();
        self.check_innermost(&state)?;
        if self.depth > 1 {
            return Err(GraphError::IllegalState(format!(
                "cannot flush nested write handle '{}'",
                self.name
            )));
        }
        if state.reads_held_by(thread::current().id()) > 0 {
            return Err(GraphError::IllegalState(
                "cannot flush while this thread holds a read lock".to_string(),
            ));
        }
        let write_index = state.write_index();
        drop(state);

        let event = self.publish(write_index);
        self.shared.targets[1 - write_index].write().begin_frame(&self.name);
        debug!("Write '{}' flushed", self.name);
        self.notify(&event);
        Ok(())
    }

    /// Swap the targets and bring the former read target up to date
    fn publish(&self, write_index: usize) -> CommitEvent {
        let read_index = 1 - write_index;
        let ops = {
            let mut target = self.shared.targets[write_index].write();
            target
                .commit_frame()
                .map(|frame| frame.ops)
                .unwrap_or_default()
        };
        let counters = self.shared.targets[write_index].read().modification_counters();

        {
            let mut state = self.shared.state.lock();
            state.read_index = write_index;
            state.commits += 1;
        }

        debug!("Replaying {} edits of '{}' onto graph {}", ops.len(), self.name, self.shared.id);
        let mut stale = self.shared.targets[read_index].write();
        if let Err(e) = stale.replay(&ops) {
            error!("Replay of '{}' diverged: {}; copying the published graph instead", self.name, e);
            *stale = self.shared.targets[write_index].read().detached_copy();
        }
        drop(stale);

        CommitEvent {
            graph: self.shared.id,
            name: self.name.clone(),
            significant: self.significant,
            counters,
            edits: ops.len(),
        }
    }

    fn notify(&self, event: &CommitEvent) {
        let listeners = self.shared.listeners.lock().clone();
        for listener in listeners {
            listener.graph_committed(event);
        }
    }

    /// Discard this handle's edits. The outermost rollback releases the lock.
    pub fn roll_back(&mut self) -> GraphResult<()> {
        let shared = Arc::clone(&self.shared);
        let state = shared.state.lock();
        self.check_innermost(&state)?;
        let position = state.open.len() - 1;
        self.unwind(state, position)
    }

    /// Roll back the frames from `position` inward and release the lock when
    /// nothing stays open
    fn unwind(&mut self, mut state: MutexGuard<'_, LockState>, position: usize) -> GraphResult<()> {
        let write_index = state.write_index();
        let frames = state.open.len() - position;
        state.open.truncate(position);
        let released = state.open.is_empty();
        drop(state);

        let result = {
            let mut target = self.shared.targets[write_index].write();
            let mut result = Ok(());
            for _ in 0..frames {
                if let Err(e) = target.roll_back_frame() {
                    result = result.and(Err(e));
                }
            }
            if result.is_err() && released {
                error!("Rollback of '{}' failed; restoring from the read target", self.name);
                *target = self.shared.targets[1 - write_index].read().detached_copy();
            }
            result
        };
        self.finished = true;

        if released {
            let mut state = self.shared.state.lock();
            state.owner = None;
            self.shared.wakeup.notify_all();
            drop(state);
            debug!("Write lock '{}' released after rollback", self.name);
        } else {
            debug!("Nested write '{}' rolled back", self.name);
        }
        result
    }
}

impl GraphReadMethods for WriteHandle {
    fn with_read<R, F>(&self, f: F) -> GraphResult<R>
    where
        F: FnOnce(&Graph) -> GraphResult<R>,
    {
        let graph = self.target()?.read();
        f(&*graph)
    }
}

impl GraphWriteMethods for WriteHandle {
    fn with_write<R, F>(&self, f: F) -> GraphResult<R>
    where
        F: FnOnce(&mut Graph) -> GraphResult<R>,
    {
        let mut graph = self.target()?.write();
        f(&mut *graph)
    }
}

impl Drop for WriteHandle {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let state = shared.state.lock();
        let position = state.open.iter().position(|&serial| serial == self.serial);
        let position = match position {
            Some(position) if state.owner == Some(thread::current().id()) => position,
            _ => {
                // An enclosing handle already discarded this one
                self.finished = true;
                return;
            }
        };
        if position + 1 < state.open.len() {
            warn!(
                "Write handle '{}' dropped with {} nested handles open; rolling them back",
                self.name,
                state.open.len() - position - 1
            );
        } else {
            warn!("Write handle '{}' dropped without commit or rollback; rolling back", self.name);
        }
        if let Err(e) = self.unwind(state, position) {
            error!("Rollback of dropped write handle '{}' failed: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AttributeType, ElementType};

    #[test]
    fn test_commit_publishes_to_readers() {
        let graph = DualGraph::new(Graph::new());
        let mut wg = graph.get_writable_graph("add", true).unwrap();
        let v = wg.add_vertex().unwrap();

        let rg = graph.get_readable_graph();
        assert_eq!(rg.vertex_count().unwrap(), 0);
        drop(rg);

        wg.commit().unwrap();
        let rg = graph.get_readable_graph();
        assert_eq!(rg.vertex_count().unwrap(), 1);
        assert!(rg.has_vertex(v).unwrap());
    }

    #[test]
    fn test_both_targets_agree_after_commit() {
        let graph = DualGraph::new(Graph::new());
        for round in 0..3 {
            let mut wg = graph.get_writable_graph("round", false).unwrap();
            let name = wg
                .add_attribute(ElementType::Vertex, AttributeType::Integer, "round", "", None, None)
                .unwrap();
            let v = wg.add_vertex().unwrap();
            wg.set_value(name, v, round).unwrap();
            wg.commit().unwrap();
        }
        let a = graph.shared.targets[0].read().modification_counters();
        let b = graph.shared.targets[1].read().modification_counters();
        assert_eq!(a, b);
        assert_eq!(graph.shared.targets[0].read().vertex_count(), 3);
        assert_eq!(graph.shared.targets[1].read().vertex_count(), 3);
    }

    #[test]
    fn test_rollback_discards_edits() {
        let graph = DualGraph::new(Graph::new());
        let before = graph.get_readable_graph().modification_counters().unwrap();

        let mut wg = graph.get_writable_graph("discard", true).unwrap();
        wg.add_vertex().unwrap();
        wg.roll_back().unwrap();

        let wg = graph.get_writable_graph("check", true).unwrap();
        assert_eq!(wg.vertex_count().unwrap(), 0);
        assert_eq!(wg.modification_counters().unwrap(), before);
    }

    #[test]
    fn test_write_while_reading_rejected() {
        let graph = DualGraph::new(Graph::new());
        let _rg = graph.get_readable_graph();
        assert!(matches!(
            graph.get_writable_graph("w", true),
            Err(GraphError::IllegalState(_))
        ));
    }

    #[test]
    fn test_commit_twice_rejected() {
        let graph = DualGraph::new(Graph::new());
        let mut wg = graph.get_writable_graph("once", true).unwrap();
        wg.commit().unwrap();
        assert!(matches!(wg.commit(), Err(GraphError::IllegalState(_))));
        assert!(matches!(wg.roll_back(), Err(GraphError::IllegalState(_))));
        assert!(matches!(wg.vertex_count(), Err(GraphError::IllegalState(_))));
    }

    #[test]
    fn test_outer_before_inner_rejected() {
        let graph = DualGraph::new(Graph::new());
        let mut outer = graph.get_writable_graph("outer", true).unwrap();
        let mut inner = graph.get_writable_graph("inner", true).unwrap();
        assert_eq!(inner.depth(), 2);
        assert!(matches!(outer.commit(), Err(GraphError::IllegalState(_))));
        inner.commit().unwrap();
        outer.commit().unwrap();
        assert_eq!(graph.lock_snapshot().writer_depth, 0);
    }

    #[test]
    fn test_dropped_handle_rolls_back() {
        let graph = DualGraph::new(Graph::new());
        {
            let wg = graph.get_writable_graph("forgotten", true).unwrap();
            wg.add_vertex().unwrap();
        }
        assert_eq!(graph.lock_snapshot().writer_depth, 0);
        let wg = graph.get_writable_graph("after", true).unwrap();
        assert_eq!(wg.vertex_count().unwrap(), 0);
    }

    #[test]
    fn test_flush_keeps_lock() {
        let graph = DualGraph::new(Graph::new());
        let mut wg = graph.get_writable_graph("flush", true).unwrap();
        wg.add_vertex().unwrap();
        wg.flush().unwrap();
        assert_eq!(graph.get_readable_graph().vertex_count().unwrap(), 1);
        assert_eq!(graph.lock_snapshot().writer_depth, 1);

        wg.add_vertex().unwrap();
        wg.roll_back().unwrap();
        assert_eq!(graph.get_readable_graph().vertex_count().unwrap(), 1);
        let wg = graph.get_writable_graph("check", true).unwrap();
        assert_eq!(wg.vertex_count().unwrap(), 1);
    }

    #[test]
    fn test_lock_snapshot_counts_readers() {
        let graph = DualGraph::new(Graph::new());
        let mut a = graph.get_readable_graph();
        let _b = graph.get_readable_graph();
        assert_eq!(graph.lock_snapshot().readers, 2);
        a.release().unwrap();
        assert!(a.is_released());
        assert_eq!(graph.lock_snapshot().readers, 1);
    }
}
