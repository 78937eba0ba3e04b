use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use bma_ts::{Monotonic, Timestamp};

use crate::event::{ActionStatus, ErrorFlags, Event};
use crate::hub::Hub;
use crate::locking::Mutex;

/// 1 past the highest assignable action id; ids wrap back to 0 once this many have been handed
/// out (§6).
const ID_WRAP: u64 = 1_000_000_000;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_action_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed) % ID_WRAP
}

/// A reference-counted handle to a live action, shared between its parent, the queues, the
/// dispatcher and any observer. Cloning is cheap (an `Arc` bump); there is no owning handle — an
/// action lives as long as anyone (application code, a parent's `children`, a queue) still holds
/// one.
pub type ActionHandle = Arc<dyn Action>;

/// Distinguishes the three control-plane action types from ordinary user actions, so a worker can
/// special-case them without a downcast (§4.3).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ActionKind {
    /// An ordinary, application-supplied action
    User,
    /// A [`PauseAction`]
    Pause,
    /// A [`ResumeAction`]
    Resume,
    /// A [`ShutdownAction`]
    Shutdown,
}

/// The abstract unit of work dispatched, queued, executed and tracked by the dispatcher.
///
/// Implementors provide `core()` (shared bookkeeping state) and `do_work()` (the effectful body);
/// everything else has a default that mirrors the base action contract and rarely needs
/// overriding. `dispatch()` is the one other method concrete subtypes commonly provide: returning
/// a non-empty list of children tells the dispatcher "decompose me, do not execute me as a leaf".
pub trait Action: Send + Sync {
    /// Returns the shared state block backing this action
    fn core(&self) -> &ActionCore;

    /// Decomposes this action into child actions.
    ///
    /// The default (empty) makes this a leaf action, which the dispatcher enqueues for direct
    /// execution rather than recursing into children.
    fn dispatch(&self) -> Vec<ActionHandle> {
        Vec::new()
    }

    /// The subtype's effectful body. Must set the action's status to one of
    /// COMPLETE/ERROR/FAILED via [`ActionCore::set_status`] before returning; `tear_down` warns
    /// (but does not fail) if that contract was not honored.
    fn do_work(&self);

    /// Called by the dispatcher once every child of this action has reached a terminal status
    /// with no FAILED among them. The default emits the `finished` notification, matching the
    /// base action's behavior; overrides that skip calling through lose that notification by
    /// design, same as the source this was ported from.
    fn process_children(&self) {
        self.core().emit(Event::ActionFinished {
            action: self.core().handle(),
        });
    }

    /// Called by the dispatcher when any child of this action reaches FAILED. The default emits
    /// the `finished` notification.
    fn error_exit(&self) {
        self.core().emit(Event::ActionFinished {
            action: self.core().handle(),
        });
    }

    /// Identifies whether this action is a control-plane token the worker loop must special-case,
    /// or an ordinary user action. The default is [`ActionKind::User`]; the three control-plane
    /// subtypes override it.
    fn kind(&self) -> ActionKind {
        ActionKind::User
    }

    /// A short, static, human-readable label for this action's subtype
    fn short_description(&self) -> &str;

    /// A longer, static, human-readable description of this action's subtype
    fn description(&self) -> &str {
        self.short_description()
    }

    /// Stamps the start time and transitions the action to IN_PROGRESS. Called by
    /// [`Action::execute_action`] before [`Action::do_work`]; not normally overridden.
    fn setup(&self) {
        let core = self.core();
        tracing::debug!(id = core.id, description = self.description(), "starting action");
        let mut inner = core.inner.lock();
        inner.start_mt = Some(Monotonic::now());
        inner.datetime_start = Some(Timestamp::now());
        inner.status = ActionStatus::InProgress;
        inner.current_process = "Pending".to_owned();
    }

    /// Stamps the end time, forces `tick_count = total_ticks` and `pct_complete = 100`, warns if
    /// `do_work` left the status below COMPLETE, and emits the `finished` notification. Called by
    /// [`Action::execute_action`] after [`Action::do_work`]; not normally overridden.
    fn tear_down(&self) {
        let core = self.core();
        let status = {
            let mut inner = core.inner.lock();
            inner.end_mt = Some(Monotonic::now());
            inner.datetime_end = Some(Timestamp::now());
            inner.tick_count = inner.total_ticks;
            inner.pct_complete = 100;
            if inner.status < ActionStatus::Complete {
                tracing::warn!(id = core.id, "action status was not properly updated at tear down");
            }
            inner.current_process = match inner.status {
                ActionStatus::Complete => "Complete!".to_owned(),
                ActionStatus::Error => "Complete (Error exists)".to_owned(),
                _ => "Failed!".to_owned(),
            };
            inner.status
        };
        tracing::debug!(id = core.id, ?status, "action tore down");
        core.emit(Event::ActionFinished { action: core.handle() });
    }

    /// Runs `setup → do_work → tear_down`. Invoked by a worker for a dequeued leaf action.
    fn execute_action(&self) {
        self.setup();
        self.do_work();
        self.tear_down();
    }

    /// Advances progress.
    ///
    /// If `current_process` is non-empty it replaces the action's current-process string
    /// regardless of `msg_only`. Unless `msg_only` is set, `tick_count` increments and
    /// `pct_complete` is recomputed as `min(100, 100 * tick_count / total_ticks)`. Always emits
    /// the `tick` notification.
    fn tick(&self, current_process: &str, msg_only: bool) {
        let core = self.core();
        {
            let mut inner = core.inner.lock();
            if !current_process.is_empty() {
                inner.current_process = current_process.to_owned();
            }
            if !msg_only {
                inner.tick_count += 1;
                if inner.total_ticks > 0 {
                    let pct = inner.tick_count.saturating_mul(100) / inner.total_ticks;
                    inner.pct_complete = pct.min(100) as u8;
                }
            }
        }
        core.emit(Event::ActionTick { action: core.handle() });
    }
}

/// Shared, lock-guarded state common to every [`Action`] implementor.
pub struct ActionCore {
    id: u64,
    self_handle: OnceLock<Weak<dyn Action>>,
    hub: OnceLock<Hub<Event>>,
    inner: Mutex<ActionInner>,
}

struct ActionInner {
    status: ActionStatus,
    error_flags: ErrorFlags,
    parent: Option<Weak<dyn Action>>,
    children: Vec<ActionHandle>,
    follow_up: Option<ActionHandle>,
    series_limited: bool,
    tick_count: u64,
    total_ticks: u64,
    pct_complete: u8,
    datetime_start: Option<Timestamp>,
    datetime_end: Option<Timestamp>,
    start_mt: Option<Monotonic>,
    end_mt: Option<Monotonic>,
    current_process: String,
}

impl Default for ActionInner {
    fn default() -> Self {
        Self {
            status: ActionStatus::Idle,
            error_flags: ErrorFlags::NO_ERROR,
            parent: None,
            children: Vec::new(),
            follow_up: None,
            series_limited: false,
            tick_count: 0,
            total_ticks: 0,
            pct_complete: 0,
            datetime_start: None,
            datetime_end: None,
            start_mt: None,
            end_mt: None,
            current_process: "Idle...".to_owned(),
        }
    }
}

impl ActionCore {
    /// Creates a new, unattached action core with a freshly assigned id
    pub fn new() -> Self {
        Self {
            id: next_action_id(),
            self_handle: OnceLock::new(),
            hub: OnceLock::new(),
            inner: Mutex::new(ActionInner::default()),
        }
    }
    /// This action's process-monotonic id
    pub fn id(&self) -> u64 {
        self.id
    }
    /// Returns a cheap, reference-counted handle to the owning action.
    ///
    /// # Panics
    ///
    /// Panics if called before the action has been turned into a handle via
    /// [`IntoActionHandle::into_handle`]; every action reachable from the dispatcher was
    /// constructed that way.
    pub fn handle(&self) -> ActionHandle {
        self.self_handle
            .get()
            .and_then(Weak::upgrade)
            .expect("action used before being turned into an ActionHandle")
    }
    pub(crate) fn set_hub(&self, hub: Hub<Event>) {
        let _ = self.hub.set(hub);
    }
    fn emit(&self, event: Event) {
        if let Some(hub) = self.hub.get() {
            hub.send(event);
        }
    }
    /// Current status
    pub fn status(&self) -> ActionStatus {
        self.inner.lock().status
    }
    /// Sets the status. `do_work` implementations call this to report COMPLETE/ERROR/FAILED.
    pub fn set_status(&self, status: ActionStatus) {
        self.inner.lock().status = status;
    }
    /// Current error flags
    pub fn error_flags(&self) -> ErrorFlags {
        self.inner.lock().error_flags
    }
    /// Sets error flags
    pub fn set_error_flags(&self, flags: ErrorFlags) {
        self.inner.lock().error_flags = flags;
    }
    /// Returns the parent action, if any and if it is still alive
    pub fn parent(&self) -> Option<ActionHandle> {
        self.inner.lock().parent.as_ref().and_then(Weak::upgrade)
    }
    pub(crate) fn set_parent(&self, parent: Weak<dyn Action>) {
        self.inner.lock().parent = Some(parent);
    }
    /// Returns a snapshot of this action's children
    pub fn children(&self) -> Vec<ActionHandle> {
        self.inner.lock().children.clone()
    }
    pub(crate) fn set_children(&self, children: Vec<ActionHandle>) {
        self.inner.lock().children = children;
    }
    /// Returns true if `series_limited` is set, routing this action to the serial worker
    pub fn is_series_limited(&self) -> bool {
        self.inner.lock().series_limited
    }
    /// Sets whether this action is routed to the serial worker rather than the parallel pool
    pub fn set_series_limited(&self, series_limited: bool) {
        self.inner.lock().series_limited = series_limited;
    }
    /// Returns the follow-up action, if any
    pub fn follow_up(&self) -> Option<ActionHandle> {
        self.inner.lock().follow_up.clone()
    }
    /// Sets the action dispatched automatically after this action's subtree completes
    pub fn set_follow_up(&self, follow_up: ActionHandle) {
        self.inner.lock().follow_up = Some(follow_up);
    }
    /// Current tick count
    pub fn tick_count(&self) -> u64 {
        self.inner.lock().tick_count
    }
    /// Total ticks expected before completion
    pub fn total_ticks(&self) -> u64 {
        self.inner.lock().total_ticks
    }
    /// Sets the total ticks expected before completion. The dispatcher sets this to
    /// `children.len() + 1` for a non-leaf action when it is first dispatched.
    pub fn set_total_ticks(&self, total_ticks: u64) {
        self.inner.lock().total_ticks = total_ticks;
    }
    /// Current completion percentage, in `[0, 100]`
    pub fn pct_complete(&self) -> u8 {
        self.inner.lock().pct_complete
    }
    /// Current human-readable phase string
    pub fn current_process(&self) -> String {
        self.inner.lock().current_process.clone()
    }
    /// Wall-clock start timestamp, once `setup` has run
    pub fn datetime_start(&self) -> Option<Timestamp> {
        self.inner.lock().datetime_start
    }
    /// Wall-clock end timestamp, once `tear_down` has run
    pub fn datetime_end(&self) -> Option<Timestamp> {
        self.inner.lock().datetime_end
    }
    /// The wall-clock duration between `setup` and `tear_down`, if both have run
    pub fn duration(&self) -> Option<std::time::Duration> {
        let inner = self.inner.lock();
        match (inner.start_mt, inner.end_mt) {
            (Some(start), Some(end)) => Some(end.as_duration() - start.as_duration()),
            _ => None,
        }
    }
    /// If `status < IN_PROGRESS`, transitions to IN_PROGRESS and stamps the start time, returning
    /// `true`. Otherwise leaves the action untouched and returns `false`.
    ///
    /// Used by the dispatcher's ancestor walk on `starting_action` (§4.5): a parent never runs
    /// `setup()` itself (only leaves are executed by a worker), so this is how it picks up
    /// IN_PROGRESS and a start stamp the first time any descendant starts running.
    pub(crate) fn mark_in_progress_if_needed(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.status < ActionStatus::InProgress {
            inner.status = ActionStatus::InProgress;
            inner.start_mt.get_or_insert_with(Monotonic::now);
            inner.datetime_start.get_or_insert_with(Timestamp::now);
            true
        } else {
            false
        }
    }
    /// Stamps the end time. Used by the dispatcher's `done_with_action` walk once a parent's
    /// children have all reached a terminal status; parents never run `tear_down()` themselves.
    pub(crate) fn mark_ended(&self) {
        let mut inner = self.inner.lock();
        inner.end_mt.get_or_insert_with(Monotonic::now);
        inner.datetime_end.get_or_insert_with(Timestamp::now);
    }
}

impl Default for ActionCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a freshly built action into a shared, reference-counted [`ActionHandle`].
///
/// This is the only supported way to obtain a handle: it registers the action's self-reference
/// so that `ActionCore::handle()` (used by `tick`/`tear_down`/hook default methods to attach
/// `self` to an emitted [`Event`]) has something to upgrade.
pub trait IntoActionHandle: Action + Sized + 'static {
    /// Wraps `self` in an `Arc` and completes its self-reference
    fn into_handle(self) -> ActionHandle {
        let arc: Arc<Self> = Arc::new(self);
        let weak: Weak<dyn Action> = Arc::downgrade(&arc);
        let _ = arc.core().self_handle.set(weak);
        arc
    }
}

impl<A: Action + Sized + 'static> IntoActionHandle for A {}

/// A control-plane action whose identity as a *type* drives worker state transitions (§4.3), not
/// any domain effect: its `do_work` merely marks itself COMPLETE.
macro_rules! control_plane_action {
    ($name: ident, $kind: expr, $short: literal, $doc: literal) => {
        #[doc = $doc]
        pub struct $name {
            core: ActionCore,
        }

        impl $name {
            /// Creates a new instance of this control-plane action
            pub fn new() -> Self {
                let core = ActionCore::new();
                core.set_total_ticks(1);
                Self { core }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Action for $name {
            fn core(&self) -> &ActionCore {
                &self.core
            }
            fn do_work(&self) {
                self.core.set_status(ActionStatus::Complete);
            }
            fn kind(&self) -> ActionKind {
                $kind
            }
            fn short_description(&self) -> &str {
                $short
            }
        }
    };
}

control_plane_action!(
    PauseAction,
    ActionKind::Pause,
    "Pause",
    "Suspends the worker that executes it until a matching [`ResumeAction`] is dequeued."
);
control_plane_action!(
    ResumeAction,
    ActionKind::Resume,
    "Resume",
    "Un-suspends the worker that executes it."
);
control_plane_action!(
    ShutdownAction,
    ActionKind::Shutdown,
    "Shutdown",
    "Tells the worker that executes it to exit its run loop."
);

#[cfg(test)]
mod test {
    use super::*;

    struct Leaf {
        core: ActionCore,
    }

    impl Leaf {
        fn new() -> Self {
            let core = ActionCore::new();
            core.set_total_ticks(1);
            Self { core }
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

    #[test]
    fn test_leaf_execute_action_reaches_complete() {
        let leaf = Leaf::new().into_handle();
        leaf.execute_action();
        assert_eq!(leaf.core().status(), ActionStatus::Complete);
        assert_eq!(leaf.core().pct_complete(), 100);
        assert_eq!(leaf.core().tick_count(), leaf.core().total_ticks());
        assert!(leaf.core().datetime_end() >= leaf.core().datetime_start());
    }

    #[test]
    fn test_tear_down_warns_but_does_not_fail_on_missing_status() {
        struct Forgetful {
            core: ActionCore,
        }
        impl Action for Forgetful {
            fn core(&self) -> &ActionCore {
                &self.core
            }
            fn do_work(&self) {}
            fn short_description(&self) -> &str {
                "Forgetful"
            }
        }
        let action = Forgetful { core: ActionCore::new() }.into_handle();
        action.execute_action();
        assert_eq!(action.core().status(), ActionStatus::Idle);
        assert_eq!(action.core().pct_complete(), 100);
    }

    #[test]
    fn test_tick_increments_and_caps_pct_complete() {
        let leaf = Leaf::new().into_handle();
        leaf.core().set_total_ticks(2);
        leaf.tick("working", false);
        assert_eq!(leaf.core().pct_complete(), 50);
        leaf.tick("almost", false);
        assert_eq!(leaf.core().pct_complete(), 100);
        leaf.tick("still there", false);
        assert_eq!(leaf.core().pct_complete(), 100);
        assert_eq!(leaf.core().current_process(), "still there");
    }

    #[test]
    fn test_id_assignment_is_monotonic() {
        let a = Leaf::new().into_handle();
        let b = Leaf::new().into_handle();
        assert!(b.core().id() > a.core().id());
    }

    #[test]
    fn test_control_plane_actions_complete_with_one_tick() {
        for action in [
            PauseAction::new().into_handle(),
            ResumeAction::new().into_handle(),
            ShutdownAction::new().into_handle(),
        ] {
            action.execute_action();
            assert_eq!(action.core().status(), ActionStatus::Complete);
            assert_eq!(action.core().total_ticks(), 1);
            assert_eq!(action.core().tick_count(), 1);
        }
    }
}
