use std::sync::Arc;

use crate::action::{Action, ActionHandle, IntoActionHandle, PauseAction, ResumeAction, ShutdownAction};
use crate::event::{band, ActionStatus, DispatcherStatus, Event, ThreadStatus, WorkerSignal, NUM_PARALLEL_THREADS};
use crate::hub::{Client, Hub};
use crate::locking::Mutex;
use crate::pchannel;
use crate::queue::{DemandQueue, PriorityActionQueue};
use crate::supervisor::Supervisor;
use crate::task::Builder;
use crate::worker::Worker;
use crate::Result;

/// Identifies one of the three queues owned by a [`Dispatcher`] (§4.2), for snapshotting.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum QueueKind {
    /// `immediate_q`, the priority queue consumed by every parallel worker
    Immediate,
    /// `demand_q`, the FIFO staging queue fed in only on explicit start
    Demand,
    /// `series_q`, the priority queue consumed by the single serial worker
    Series,
}

/// One row of the thread view (§4.6): a worker slot's id, status and current action.
#[derive(Debug, Clone)]
pub struct ThreadRow {
    /// worker id
    pub id: usize,
    /// current slot status
    pub status: ThreadStatus,
    /// short description of the action the worker is currently executing, if any
    pub current_action: Option<String>,
}

#[derive(Clone)]
struct WorkerSlot {
    status: ThreadStatus,
    current_action: Option<ActionHandle>,
}

impl Default for WorkerSlot {
    fn default() -> Self {
        Self {
            status: ThreadStatus::Uninit,
            current_action: None,
        }
    }
}

/// Shared dispatcher state, reachable both from the owning [`Dispatcher`] and from the dedicated
/// event-loop thread that drains [`WorkerSignal`]s (§9, Open Question: the dispatcher-thread
/// model).
struct Core {
    immediate_q: Arc<PriorityActionQueue<ActionHandle>>,
    series_q: Arc<PriorityActionQueue<ActionHandle>>,
    demand_q: Arc<DemandQueue<ActionHandle>>,
    slots: Mutex<Vec<WorkerSlot>>,
    status: Mutex<DispatcherStatus>,
    event_hub: Hub<Event>,
    parallel_count: usize,
}

impl Core {
    /// The slot index of the single serial worker; always the last slot.
    fn series_id(&self) -> usize {
        self.parallel_count
    }
}

/// The coordinator that owns the three queues, the worker pool, the worker-slot table and the
/// dispatcher lifecycle (§4.5).
///
/// All mutation of action-tree state and worker slots happens on one dedicated event-loop thread
/// that is the sole consumer of the [`WorkerSignal`] channel every worker's sender feeds; workers
/// themselves never touch dispatcher state (§5, shared-resource policy).
pub struct Dispatcher {
    core: Arc<Core>,
    supervisor: Supervisor<()>,
}

impl Dispatcher {
    /// Creates a new, unstarted dispatcher with `parallel_count` parallel workers plus one serial
    /// worker (always present).
    pub fn new(parallel_count: usize) -> Self {
        let core = Arc::new(Core {
            immediate_q: Arc::new(PriorityActionQueue::new()),
            series_q: Arc::new(PriorityActionQueue::new()),
            demand_q: Arc::new(DemandQueue::new()),
            slots: Mutex::new(vec![WorkerSlot::default(); parallel_count + 1]),
            status: Mutex::new(DispatcherStatus::Idle),
            event_hub: Hub::new(),
            parallel_count,
        });
        Self {
            core,
            supervisor: Supervisor::new(),
        }
    }

    /// Current dispatcher lifecycle status
    pub fn status(&self) -> DispatcherStatus {
        *self.core.status.lock()
    }

    /// Subscribes to dispatcher/action notifications (§6). `condition` decides which [`Event`]
    /// variants are delivered to the returned client; see [`crate::event_matches`].
    pub fn subscribe<F>(&self, name: &str, condition: F) -> Result<Client<Event>>
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.core.event_hub.register(name, condition)
    }

    /// A clone of the dispatcher's event hub, for views that want to subscribe themselves.
    pub fn events(&self) -> Hub<Event> {
        self.core.event_hub.clone()
    }

    /// Read-only snapshot of one queue's current contents, in dequeue order (§4.6).
    pub fn queue_snapshot(&self, which: QueueKind) -> Vec<ActionHandle> {
        match which {
            QueueKind::Immediate => self.core.immediate_q.snapshot(),
            QueueKind::Series => self.core.series_q.snapshot(),
            QueueKind::Demand => self.core.demand_q.snapshot(),
        }
    }

    /// Read-only snapshot of every worker slot, ordered by id, for the thread view (§4.6).
    pub fn thread_table_snapshot(&self) -> Vec<ThreadRow> {
        self.core
            .slots
            .lock()
            .iter()
            .enumerate()
            .map(|(id, slot)| ThreadRow {
                id,
                status: slot.status,
                current_action: slot.current_action.as_ref().map(|a| a.short_description().to_owned()),
            })
            .collect()
    }

    /// Walks `action` through `dispatch()` recursively, enqueuing every leaf it bottoms out at
    /// (§4.5, `dispatch_action`). Call this for a fresh root action.
    pub fn submit(&self, action: ActionHandle) {
        dispatch_action(&self.core, &action);
    }

    /// Buffers `action` in the FIFO demand queue without dispatching it yet (§4.2).
    pub fn demand_enqueue(&self, action: ActionHandle) {
        self.core.demand_q.push(action);
        self.core.event_hub.send(Event::DemandQueueContentsChanged);
    }

    /// Drains the demand queue in FIFO order, feeding every buffered action through
    /// [`Self::submit`]'s walk, one at a time, emitting `contents-changed` after each removal
    /// (§4.5, "Demand queue start").
    pub fn start_demand_queue(&self) {
        while let Some(action) = self.core.demand_q.pop_front() {
            self.core.event_hub.send(Event::DemandQueueContentsChanged);
            dispatch_action(&self.core, &action);
        }
    }

    /// Launches the worker pool and the dispatcher event loop (`IDLE`/`SHUTDOWN` → `STARTING` →
    /// `READY`, §4.5). A no-op, logged, if the dispatcher is not idle/shutdown or any slot is not
    /// `UNINIT`/`DEAD` ("launch guard", §4.5).
    pub fn start(&mut self) -> Result<()> {
        {
            let mut status = self.core.status.lock();
            if !matches!(*status, DispatcherStatus::Idle | DispatcherStatus::Shutdown) {
                tracing::warn!(?status, "start: invalid lifecycle transition, ignored");
                return Ok(());
            }
            let mut slots = self.core.slots.lock();
            if !slots
                .iter()
                .all(|s| matches!(s.status, ThreadStatus::Uninit | ThreadStatus::Dead))
            {
                tracing::warn!("start: worker slots not in a launchable state, ignored");
                return Ok(());
            }
            *status = DispatcherStatus::Starting;
            for slot in slots.iter_mut() {
                slot.status = ThreadStatus::Starting;
                slot.current_action = None;
            }
        }

        let (tx, rx) = pchannel::bounded(1024);
        let core_for_loop = self.core.clone();
        self.supervisor.spawn(Builder::new().name("act-evtloop"), move || {
            event_loop(core_for_loop, rx);
        })?;
        for id in 0..self.core.parallel_count {
            let worker = Worker::new(id, self.core.immediate_q.clone(), tx.clone());
            self.supervisor
                .spawn(Builder::new().name(format!("act-wk{id}")), move || worker.run())?;
        }
        let series_worker = Worker::new(self.core.series_id(), self.core.series_q.clone(), tx);
        self.supervisor
            .spawn(Builder::new().name("act-wk-series"), move || series_worker.run())?;
        tracing::debug!(parallel = self.core.parallel_count, "dispatcher started");
        Ok(())
    }

    /// Requests a graceful stop (`READY` → `STOPPING` → `SHUTDOWN`, §4.5): enqueues one
    /// [`ShutdownAction`] per worker, joins every thread, then drains all three queues. Pending
    /// standard work is bypassed, not awaited (§5, Cancellation). A no-op, logged, if the
    /// dispatcher is not ready or any slot is not idle/active ("kill guard", §4.5).
    pub fn stop(&mut self) {
        {
            let mut status = self.core.status.lock();
            if *status != DispatcherStatus::Ready {
                tracing::warn!(?status, "stop: invalid lifecycle transition, ignored");
                return;
            }
            let slots = self.core.slots.lock();
            if !slots.iter().all(|s| matches!(s.status, ThreadStatus::Idle | ThreadStatus::Active)) {
                tracing::warn!("stop: worker slots not in a killable state, ignored");
                return;
            }
            *status = DispatcherStatus::Stopping;
        }
        let series_shutdown = ShutdownAction::new().into_handle();
        self.prime(&series_shutdown);
        self.core.event_hub.send(Event::CreatedAction { action: series_shutdown.clone() });
        enqueue_series(&self.core, series_shutdown, band::QUEUE_SHUTDOWN);
        for _ in 0..self.core.parallel_count {
            let shutdown = ShutdownAction::new().into_handle();
            self.prime(&shutdown);
            self.core.event_hub.send(Event::CreatedAction { action: shutdown.clone() });
            enqueue_immediate(&self.core, shutdown, band::QUEUE_SHUTDOWN);
        }
        self.supervisor.join_all();
        self.core.immediate_q.drain();
        self.core.series_q.drain();
        self.core.demand_q.drain();
        tracing::debug!("dispatcher stopped");
    }

    /// Requests that every worker suspend (`READY` → `PAUSED` once all slots are `SUSPENDED`,
    /// §4.5): enqueues one [`PauseAction`] per worker. A no-op, logged, unless the dispatcher is
    /// `READY`.
    pub fn suspend(&self) {
        let status = *self.core.status.lock();
        if status != DispatcherStatus::Ready {
            tracing::warn!(?status, "suspend: invalid lifecycle transition, ignored");
            return;
        }
        for _ in 0..self.core.parallel_count {
            let pause = PauseAction::new().into_handle();
            self.prime(&pause);
            self.core.event_hub.send(Event::CreatedAction { action: pause.clone() });
            enqueue_immediate(&self.core, pause, band::WORKER_PAUSE);
        }
        let pause = PauseAction::new().into_handle();
        self.prime(&pause);
        self.core.event_hub.send(Event::CreatedAction { action: pause.clone() });
        enqueue_series(&self.core, pause, band::WORKER_PAUSE);
    }

    /// Requests that every worker resume (`PAUSED` → `READY` once all slots are `IDLE`/`ACTIVE`,
    /// §4.5): enqueues one [`ResumeAction`] per worker. A no-op, logged, unless the dispatcher is
    /// `PAUSED`.
    pub fn resume(&self) {
        let status = *self.core.status.lock();
        if status != DispatcherStatus::Paused {
            tracing::warn!(?status, "resume: invalid lifecycle transition, ignored");
            return;
        }
        for _ in 0..self.core.parallel_count {
            let resume = ResumeAction::new().into_handle();
            self.prime(&resume);
            self.core.event_hub.send(Event::CreatedAction { action: resume.clone() });
            enqueue_immediate(&self.core, resume, band::WORKER_RESUME);
        }
        let resume = ResumeAction::new().into_handle();
        self.prime(&resume);
        self.core.event_hub.send(Event::CreatedAction { action: resume.clone() });
        enqueue_series(&self.core, resume, band::WORKER_RESUME);
    }

    /// Attaches this dispatcher's event hub to `action` without walking it through `dispatch()`.
    /// Used for the control-plane tokens pushed directly by suspend/resume/stop, which never go
    /// through [`dispatch_action`].
    fn prime(&self, action: &ActionHandle) {
        action.core().set_hub(self.core.event_hub.clone());
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(NUM_PARALLEL_THREADS)
    }
}

fn enqueue_immediate(core: &Core, action: ActionHandle, band: i32) {
    let id = action.core().id();
    core.immediate_q.push(band, id, action);
    core.event_hub.send(Event::ImmediateQueueContentsChanged);
}

fn enqueue_series(core: &Core, action: ActionHandle, band: i32) {
    let id = action.core().id();
    core.series_q.push(band, id, action);
    core.event_hub.send(Event::SeriesQueueContentsChanged);
}

/// The dispatch walk (§4.5): decomposes `action` via `dispatch()` until every leaf is reached,
/// enqueuing leaves to the queue their `series_limited` flag selects.
fn dispatch_action(core: &Core, action: &ActionHandle) {
    action.core().set_hub(core.event_hub.clone());
    action.tick("Idle", true);
    let children = action.dispatch();
    if children.is_empty() {
        if action.core().is_series_limited() {
            enqueue_series(core, action.clone(), band::STD_ACTION);
        } else {
            enqueue_immediate(core, action.clone(), band::STD_ACTION);
        }
        return;
    }
    // +1 accounts for process_children, the tick this parent receives once every child has
    // completed and the aggregate status has been rolled up (§4.5).
    action.core().set_total_ticks(children.len() as u64 + 1);
    action.core().set_children(children.clone());
    let parent_weak = Arc::downgrade(action);
    for child in &children {
        child.core().set_parent(parent_weak.clone());
        core.event_hub.send(Event::CreatedAction { action: child.clone() });
        dispatch_action(core, child);
    }
}

/// Body of the dispatcher's dedicated event-loop thread: the sole consumer of every worker's
/// [`WorkerSignal`]s, and the sole mutator of worker slots and action-tree state (§5, §9).
fn event_loop(core: Arc<Core>, rx: pchannel::Receiver<WorkerSignal>) {
    while let Ok(signal) = rx.recv() {
        match signal {
            WorkerSignal::Started { id } => on_started(&core, id),
            WorkerSignal::StartingAction { id, action } => on_starting_action(&core, id, action),
            WorkerSignal::DoneWithAction { id, action } => on_done_with_action(&core, id, action),
            WorkerSignal::Paused { id } => on_paused(&core, id),
            WorkerSignal::Resumed { id } => on_resumed(&core, id),
            WorkerSignal::Shutdown { id } => {
                let all_dead = on_shutdown(&core, id);
                if all_dead {
                    break;
                }
            }
        }
    }
}

fn on_started(core: &Core, id: usize) {
    {
        core.slots.lock()[id].status = ThreadStatus::Idle;
    }
    core.event_hub.send(Event::ThreadStatusChanged { id });
    let all_running = core
        .slots
        .lock()
        .iter()
        .all(|s| matches!(s.status, ThreadStatus::Idle | ThreadStatus::Active));
    if all_running {
        core.event_hub.send(Event::AllThreadsRunning);
        let mut status = core.status.lock();
        if *status == DispatcherStatus::Starting {
            *status = DispatcherStatus::Ready;
            drop(status);
            core.event_hub.send(Event::Ready);
        }
    }
}

fn on_starting_action(core: &Core, id: usize, action: ActionHandle) {
    {
        let mut slots = core.slots.lock();
        slots[id].status = ThreadStatus::Active;
        slots[id].current_action = Some(action.clone());
    }
    core.event_hub.send(Event::ThreadStatusChanged { id });
    core.event_hub.send(Event::ThreadActionChanged { id });
    if id == core.series_id() {
        core.event_hub.send(Event::SeriesQueueContentsChanged);
    } else {
        core.event_hub.send(Event::ImmediateQueueContentsChanged);
    }

    // Walk ancestors upward, bumping anything still below IN_PROGRESS (§4.5).
    let mut current = action.core().parent();
    while let Some(ancestor) = current {
        if !ancestor.core().mark_in_progress_if_needed() {
            break;
        }
        core.event_hub.send(Event::ActionStarted { action: ancestor.clone() });
        ancestor.tick("Children Running", true);
        current = ancestor.core().parent();
    }
}

fn on_done_with_action(core: &Core, id: usize, action: ActionHandle) {
    {
        let mut slots = core.slots.lock();
        slots[id].status = ThreadStatus::Idle;
        slots[id].current_action = None;
    }
    core.event_hub.send(Event::ThreadStatusChanged { id });
    core.event_hub.send(Event::ThreadActionChanged { id });

    if let Some(follow_up) = action.core().follow_up() {
        dispatch_action(core, &follow_up);
        core.event_hub.send(Event::CreatedAction { action: follow_up });
    }

    // Cascades upward: each ancestor is ticked once for the child that just completed; once all
    // of an ancestor's children are terminal its own status rolls up and the cascade continues
    // one level further (§4.5, §7).
    let mut current = action;
    loop {
        let Some(parent) = current.core().parent() else {
            break;
        };
        parent.tick("", false);
        if parent.core().status() >= ActionStatus::Complete {
            break;
        }
        let children = parent.core().children();
        if !children.iter().all(|c| c.core().status() >= ActionStatus::Complete) {
            break;
        }
        let child_state = children
            .iter()
            .map(|c| c.core().status())
            .max()
            .unwrap_or(ActionStatus::Complete);
        if child_state == ActionStatus::Failed {
            parent.core().set_status(ActionStatus::Failed);
            parent.tick("One or more children failed!", false);
            parent.core().mark_ended();
            parent.error_exit();
            break;
        }
        if child_state == ActionStatus::Error {
            parent.core().set_status(ActionStatus::Error);
            parent.tick("Children Complete (with errors)", false);
        } else {
            parent.core().set_status(ActionStatus::Complete);
            parent.tick("Children Complete", false);
        }
        parent.core().mark_ended();
        parent.process_children();
        if let Some(follow_up) = parent.core().follow_up() {
            dispatch_action(core, &follow_up);
            core.event_hub.send(Event::CreatedAction { action: follow_up });
        }
        current = parent;
    }
}

fn on_paused(core: &Core, id: usize) {
    {
        core.slots.lock()[id].status = ThreadStatus::Suspended;
    }
    core.event_hub.send(Event::ThreadStatusChanged { id });
    let all_suspended = core.slots.lock().iter().all(|s| s.status == ThreadStatus::Suspended);
    if all_suspended {
        *core.status.lock() = DispatcherStatus::Paused;
        core.event_hub.send(Event::AllThreadsSuspended);
    }
}

fn on_resumed(core: &Core, id: usize) {
    {
        core.slots.lock()[id].status = ThreadStatus::Idle;
    }
    core.event_hub.send(Event::ThreadStatusChanged { id });
    let all_running = core
        .slots
        .lock()
        .iter()
        .all(|s| matches!(s.status, ThreadStatus::Idle | ThreadStatus::Active));
    if all_running {
        *core.status.lock() = DispatcherStatus::Ready;
        core.event_hub.send(Event::Ready);
    }
}

/// Returns true once every slot has reached DEAD (the event loop's cue to exit).
fn on_shutdown(core: &Core, id: usize) -> bool {
    {
        core.slots.lock()[id].status = ThreadStatus::Dead;
    }
    core.event_hub.send(Event::ThreadStatusChanged { id });
    let all_dead = core.slots.lock().iter().all(|s| s.status == ThreadStatus::Dead);
    if all_dead {
        core.event_hub.send(Event::AllThreadsShutdown);
        *core.status.lock() = DispatcherStatus::Shutdown;
        core.event_hub.send(Event::Shutdown);
    }
    all_dead
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::action::ActionCore;
    use crate::event_matches;

    struct Leaf {
        core: ActionCore,
    }

    impl Leaf {
        fn new() -> ActionHandle {
            let core = ActionCore::new();
            core.set_total_ticks(1);
            Leaf { core }.into_handle()
        }
    }

    impl Action for Leaf {
        fn core(&self) -> &ActionCore {
            &self.core
        }
        fn do_work(&self) {
            self.core.set_status(ActionStatus::Complete);
        }
        fn short_description(&self) -> &str {
            "Leaf"
        }
    }

    struct FailingLeaf {
        core: ActionCore,
    }

    impl Action for FailingLeaf {
        fn core(&self) -> &ActionCore {
            &self.core
        }
        fn do_work(&self) {
            self.core.set_status(ActionStatus::Failed);
        }
        fn short_description(&self) -> &str {
            "FailingLeaf"
        }
    }

    struct Parent {
        core: ActionCore,
        children: Vec<ActionHandle>,
        error_exits: Arc<AtomicUsize>,
    }

    impl Action for Parent {
        fn core(&self) -> &ActionCore {
            &self.core
        }
        fn dispatch(&self) -> Vec<ActionHandle> {
            self.children.clone()
        }
        fn do_work(&self) {
            unreachable!("a parent with children is never executed as a leaf")
        }
        fn error_exit(&self) {
            self.error_exits.fetch_add(1, Ordering::SeqCst);
        }
        fn short_description(&self) -> &str {
            "Parent"
        }
    }

    fn recv_until<F: Fn(&Event) -> bool>(client: &Client<Event>, until: F) {
        loop {
            let event = client.recv().expect("event hub closed unexpectedly");
            if until(&event) {
                return;
            }
        }
    }

    #[test]
    fn test_leaf_action_completes_through_dispatcher() {
        let mut dispatcher = Dispatcher::new(2);
        let finished = dispatcher
            .subscribe("t", event_matches!(Event::ActionFinished { .. }))
            .unwrap();
        dispatcher.start().unwrap();
        let leaf = Leaf::new();
        let leaf_id = leaf.core().id();
        dispatcher.submit(leaf.clone());
        recv_until(&finished, |e| matches!(e, Event::ActionFinished { action } if action.core().id() == leaf_id));
        assert_eq!(leaf.core().status(), ActionStatus::Complete);
        assert_eq!(leaf.core().pct_complete(), 100);
        dispatcher.stop();
    }

    #[test]
    fn test_parent_with_two_successful_children() {
        let mut dispatcher = Dispatcher::new(2);
        let parent = Parent {
            core: ActionCore::new(),
            children: vec![Leaf::new(), Leaf::new()],
            error_exits: Arc::new(AtomicUsize::new(0)),
        }
        .into_handle();
        let parent_id = parent.core().id();
        let finished = dispatcher
            .subscribe("t", event_matches!(Event::ActionFinished { .. }))
            .unwrap();
        dispatcher.start().unwrap();
        dispatcher.submit(parent.clone());
        recv_until(&finished, |e| matches!(e, Event::ActionFinished { action } if action.core().id() == parent_id));
        assert_eq!(parent.core().total_ticks(), 3);
        assert_eq!(parent.core().status(), ActionStatus::Complete);
        assert_eq!(parent.core().tick_count(), 3);
        assert!(parent.core().datetime_end() >= parent.core().datetime_start());
        dispatcher.stop();
    }

    #[test]
    fn test_parent_with_failing_child_becomes_failed() {
        let mut dispatcher = Dispatcher::new(2);
        let error_exits = Arc::new(AtomicUsize::new(0));
        let good_leaf = Leaf::new();
        let bad_leaf: ActionHandle = FailingLeaf { core: ActionCore::new() }.into_handle();
        let parent = Parent {
            core: ActionCore::new(),
            children: vec![good_leaf.clone(), bad_leaf],
            error_exits: error_exits.clone(),
        }
        .into_handle();
        let parent_id = parent.core().id();
        let finished = dispatcher
            .subscribe("t", event_matches!(Event::ActionFinished { .. }))
            .unwrap();
        dispatcher.start().unwrap();
        dispatcher.submit(parent.clone());
        recv_until(&finished, |e| matches!(e, Event::ActionFinished { action } if action.core().id() == parent_id));
        assert_eq!(parent.core().status(), ActionStatus::Failed);
        assert_eq!(good_leaf.core().status(), ActionStatus::Complete);
        assert_eq!(error_exits.load(Ordering::SeqCst), 1);
        dispatcher.stop();
    }

    #[test]
    fn test_series_limited_action_goes_to_series_queue() {
        let mut dispatcher = Dispatcher::new(3);
        let series_changed = dispatcher
            .subscribe("t", event_matches!(Event::SeriesQueueContentsChanged))
            .unwrap();
        let finished = dispatcher
            .subscribe("f", event_matches!(Event::ActionFinished { .. }))
            .unwrap();
        dispatcher.start().unwrap();
        let action = Leaf::new();
        action.core().set_series_limited(true);
        let id = action.core().id();
        dispatcher.submit(action);
        // submitting to the series queue emits its contents-changed notification
        recv_until(&series_changed, |_| true);
        recv_until(&finished, |e| matches!(e, Event::ActionFinished { action } if action.core().id() == id));
        dispatcher.stop();
    }

    #[test]
    fn test_suspend_resume_cycle() {
        let mut dispatcher = Dispatcher::new(3);
        let suspended = dispatcher
            .subscribe("s", event_matches!(Event::AllThreadsSuspended))
            .unwrap();
        let ready = dispatcher.subscribe("r", event_matches!(Event::Ready)).unwrap();
        dispatcher.start().unwrap();
        // drain the "ready after start" event before suspending
        recv_until(&ready, |_| true);
        dispatcher.suspend();
        recv_until(&suspended, |_| true);
        assert_eq!(dispatcher.status(), DispatcherStatus::Paused);
        dispatcher.resume();
        recv_until(&ready, |_| true);
        assert_eq!(dispatcher.status(), DispatcherStatus::Ready);
        dispatcher.stop();
    }

    #[test]
    fn test_shutdown_bypasses_pending_work_and_does_not_hang() {
        let mut dispatcher = Dispatcher::new(2);
        dispatcher.start().unwrap();
        for _ in 0..1000 {
            dispatcher.submit(Leaf::new());
        }
        // stop() returning at all (rather than hanging) is itself part of the assertion: the
        // shutdown tokens sort ahead of the 1000 pending STD actions and bypass them (§5, §8
        // scenario 6).
        dispatcher.stop();
        assert!(dispatcher.queue_snapshot(QueueKind::Immediate).is_empty());
        assert!(dispatcher.queue_snapshot(QueueKind::Series).is_empty());
        assert_eq!(dispatcher.status(), DispatcherStatus::Shutdown);
    }
}
