use std::time::Duration;

use rtsc::data_policy::DataDeliveryPolicy;
use serde::Serialize;

use crate::action::ActionHandle;

/// Priority bands used by [`crate::queue::PriorityActionQueue`].
///
/// Values are part of the external contract (§6): observers may introspect a queued action's
/// band, so these must not be renumbered.
pub mod band {
    /// Priority of a [`crate::action::ShutdownAction`]; sorts ahead of everything else so
    /// shutdown always bypasses pending standard work.
    pub const QUEUE_SHUTDOWN: i32 = -5;
    /// Priority of a [`crate::action::PauseAction`]
    pub const WORKER_PAUSE: i32 = 0;
    /// Priority of a [`crate::action::ResumeAction`]
    pub const WORKER_RESUME: i32 = 1;
    /// Priority of any ordinary user action
    pub const STD_ACTION: i32 = 2;
}

/// Default idle-poll interval for a worker whose queue is empty or filtered
pub const WORKER_WAIT_TIME: Duration = Duration::from_millis(500);

/// Default number of parallel workers pulling from `immediate_q`
pub const NUM_PARALLEL_THREADS: usize = 10;

/// Action lifecycle status.
///
/// Ordinals are part of the cross-language contract (§6) and must not change.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Serialize)]
#[repr(i32)]
pub enum ActionStatus {
    /// Constructed but not yet dispatched
    Uninit = -999,
    /// Dispatched, awaiting execution
    Idle = 0,
    /// Queued, waiting for a worker
    Pending = 1,
    /// Currently being ticked/executed, or has in-progress children
    InProgress = 2,
    /// Finished successfully
    Complete = 3,
    /// Finished with a non-fatal error
    Error = 4,
    /// Finished fatally; parent chain is marked FAILED up to the nearest ancestor
    Failed = 5,
}

impl Default for ActionStatus {
    fn default() -> Self {
        Self::Uninit
    }
}

bitflags::bitflags! {
    /// Bitset of action error causes.
    ///
    /// The original implementation only ever defines the zero flag and a single generic
    /// "unspecified" flag; this is not a placeholder, it is the full contract (SPEC_FULL §3).
    #[derive(Default, Debug, Copy, Clone, Eq, PartialEq, Serialize)]
    pub struct ErrorFlags: u32 {
        /// No error recorded
        const NO_ERROR = 0;
        /// An error occurred but no specific cause was recorded
        const UNSPECIFIED = 1;
    }
}

/// Worker slot status, as tracked by the dispatcher.
///
/// Ordinals are part of the cross-language contract (§6).
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Serialize)]
#[repr(i32)]
pub enum ThreadStatus {
    /// Slot has never been launched
    Uninit = -999,
    /// Thread spawned, has not yet emitted `started`
    Starting = -1,
    /// Waiting for work
    Idle = 0,
    /// Executing an action
    Active = 1,
    /// Suspended by a PauseAction, waiting for a ResumeAction
    Suspended = 2,
    /// Thread has exited after a ShutdownAction
    Dead = 3,
}

impl Default for ThreadStatus {
    fn default() -> Self {
        Self::Uninit
    }
}

/// Dispatcher lifecycle status (§4.5)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub enum DispatcherStatus {
    /// Never started
    Uninit,
    /// All worker slots dead or uninitialized, no threads running
    Idle,
    /// `start_dispatcher` in progress, threads launching
    Starting,
    /// All worker threads running
    Ready,
    /// All worker threads suspended
    Paused,
    /// `stop_dispatcher` in progress
    Stopping,
    /// All worker threads dead after a stop
    Shutdown,
}

impl Default for DispatcherStatus {
    fn default() -> Self {
        Self::Uninit
    }
}

/// Dispatcher- and action-level notifications (§6).
///
/// Delivered through a [`crate::hub::Hub<Event>`]; observers subscribe with a condition function,
/// typically built with [`crate::event_matches`].
#[derive(Debug, Clone)]
pub enum Event {
    /// Dispatcher has reached READY for the first time after a start
    Ready,
    /// Dispatcher has reached SHUTDOWN
    Shutdown,
    /// Dispatcher has been logged out (reserved for host-application session teardown)
    LoggedOut,
    /// Every worker slot is IDLE or ACTIVE
    AllThreadsRunning,
    /// Every worker slot is SUSPENDED
    AllThreadsSuspended,
    /// Every worker slot is DEAD
    AllThreadsShutdown,
    /// A worker slot's [`ThreadStatus`] changed
    ThreadStatusChanged {
        /// worker id
        id: usize,
    },
    /// A worker slot's current action changed
    ThreadActionChanged {
        /// worker id
        id: usize,
    },
    /// A new action was created (either a dispatched child, or a dispatched follow-up)
    CreatedAction {
        /// the created action
        action: ActionHandle,
    },
    /// `immediate_q` contents changed
    ImmediateQueueContentsChanged,
    /// `demand_q` contents changed
    DemandQueueContentsChanged,
    /// `series_q` contents changed
    SeriesQueueContentsChanged,
    /// An action transitioned from a status below IN_PROGRESS to IN_PROGRESS
    ActionStarted {
        /// the action
        action: ActionHandle,
    },
    /// An action's progress was ticked
    ActionTick {
        /// the action
        action: ActionHandle,
    },
    /// An action reached a terminal status (COMPLETE, ERROR or FAILED)
    ActionFinished {
        /// the action
        action: ActionHandle,
    },
}

impl DataDeliveryPolicy for Event {}

/// Typed notifications emitted by a worker and consumed by the dispatcher (§4.4).
///
/// Delivery is single-producer (a worker), single-consumer (the dispatcher's event-loop thread),
/// FIFO per worker; there is no cross-worker ordering guarantee.
#[derive(Debug, Clone)]
pub enum WorkerSignal {
    /// The worker's run loop has started
    Started {
        /// worker id
        id: usize,
    },
    /// The worker executed a ShutdownAction and is exiting its loop
    Shutdown {
        /// worker id
        id: usize,
    },
    /// The worker executed a PauseAction and is now suspended
    Paused {
        /// worker id
        id: usize,
    },
    /// The worker executed a ResumeAction and is no longer suspended
    Resumed {
        /// worker id
        id: usize,
    },
    /// The worker dequeued `action` and is about to call `execute_action` on it
    StartingAction {
        /// worker id
        id: usize,
        /// the action about to execute
        action: ActionHandle,
    },
    /// The worker finished executing `action`
    DoneWithAction {
        /// worker id
        id: usize,
        /// the action that finished
        action: ActionHandle,
    },
}

impl DataDeliveryPolicy for WorkerSignal {}
