use std::sync::Arc;
use std::thread;

use crate::action::{Action, ActionHandle, ActionKind};
use crate::event::{WorkerSignal, WORKER_WAIT_TIME};
use crate::pchannel::Sender;
use crate::queue::PriorityActionQueue;

/// A long-lived execution loop bound to one queue and one worker id (§4.3).
///
/// A `Worker` only ever sends [`WorkerSignal`]s; it never mutates dispatcher state directly. All
/// reactions to a worker's signals (slot table updates, ancestor tree walks, notifications) run
/// on the dispatcher's event-loop thread, which is the sole consumer of the signal channel this
/// worker's `signal_tx` feeds.
pub struct Worker {
    id: usize,
    queue: Arc<PriorityActionQueue<ActionHandle>>,
    signal_tx: Sender<WorkerSignal>,
}

impl Worker {
    /// Creates a new worker bound to `queue`, identified by `id`, reporting to `signal_tx`
    pub fn new(id: usize, queue: Arc<PriorityActionQueue<ActionHandle>>, signal_tx: Sender<WorkerSignal>) -> Self {
        Self { id, queue, signal_tx }
    }
    /// Returns this worker's id
    pub fn id(&self) -> usize {
        self.id
    }
    /// Runs the worker loop until a [`crate::action::ShutdownAction`] is dequeued and executed.
    ///
    /// Intended to be the body of a dedicated thread (see `Dispatcher::launch_threads`).
    pub fn run(self) {
        let Worker { id, queue, signal_tx } = self;
        let _ = signal_tx.send(WorkerSignal::Started { id });
        tracing::debug!(worker = id, "worker started");
        let mut suspended = false;
        // Retained so a late observer holding only a `WorkerSignal::DoneWithAction` reference
        // never sees the action dropped while the signal is still in flight.
        let mut last_completed: Option<ActionHandle> = None;
        loop {
            let Some(action) = queue.pop_front_if(|action| may_take(action, suspended)) else {
                thread::sleep(WORKER_WAIT_TIME);
                continue;
            };
            let _ = signal_tx.send(WorkerSignal::StartingAction {
                id,
                action: action.clone(),
            });
            match action.kind() {
                ActionKind::Shutdown => {
                    action.execute_action();
                    let _ = signal_tx.send(WorkerSignal::Shutdown { id });
                    tracing::debug!(worker = id, "worker shutdown");
                    last_completed = Some(action);
                    break;
                }
                ActionKind::Pause => {
                    suspended = true;
                    action.execute_action();
                    let _ = signal_tx.send(WorkerSignal::Paused { id });
                    tracing::debug!(worker = id, "worker paused");
                }
                ActionKind::Resume => {
                    suspended = false;
                    action.execute_action();
                    let _ = signal_tx.send(WorkerSignal::Resumed { id });
                    tracing::debug!(worker = id, "worker resumed");
                }
                ActionKind::User => {
                    action.execute_action();
                    let _ = signal_tx.send(WorkerSignal::DoneWithAction {
                        id,
                        action: action.clone(),
                    });
                }
            }
            last_completed = Some(action);
        }
        drop(last_completed);
    }
}

/// The peek-then-filter rule (§4.3): a suspended worker must not take anything but a
/// [`crate::action::ResumeAction`]; a running worker must not take a stray
/// [`crate::action::ResumeAction`] meant to wake someone else up.
fn may_take(action: &ActionHandle, suspended: bool) -> bool {
    let is_resume = action.kind() == ActionKind::Resume;
    !(suspended && !is_resume) && !(!suspended && is_resume)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::action::{ActionCore, IntoActionHandle, PauseAction, ResumeAction, ShutdownAction};
    use crate::event::ActionStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLeaf {
        core: ActionCore,
        runs: Arc<AtomicUsize>,
    }

    impl Action for CountingLeaf {
        fn core(&self) -> &ActionCore {
            &self.core
        }
        fn do_work(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.core.set_status(ActionStatus::Complete);
        }
        fn short_description(&self) -> &str {
            "CountingLeaf"
        }
    }

    #[test]
    fn test_may_take_gates_on_suspension_and_resume() {
        let user: ActionHandle = CountingLeaf {
            core: ActionCore::new(),
            runs: Arc::new(AtomicUsize::new(0)),
        }
        .into_handle();
        let resume: ActionHandle = ResumeAction::new().into_handle();
        assert!(may_take(&user, false));
        assert!(!may_take(&user, true));
        assert!(!may_take(&resume, false));
        assert!(may_take(&resume, true));
    }

    #[test]
    fn test_shutdown_band_bypasses_pending_std_work() {
        // QUEUE_SHUTDOWN (-5) always sorts ahead of STD_ACTION (2), regardless of enqueue order:
        // shutdown bypasses pending work rather than waiting behind it (spec scenario 6).
        let queue = Arc::new(PriorityActionQueue::new());
        let runs = Arc::new(AtomicUsize::new(0));
        queue.push(2, 0, CountingLeaf { core: ActionCore::new(), runs: runs.clone() }.into_handle());
        queue.push(2, 1, CountingLeaf { core: ActionCore::new(), runs: runs.clone() }.into_handle());
        queue.push(-5, 2, ShutdownAction::new().into_handle());
        let (tx, rx) = crate::pchannel::bounded(32);
        let worker = Worker::new(0, queue.clone(), tx);
        worker.run();
        assert!(matches!(rx.try_recv().unwrap(), WorkerSignal::Started { id: 0 }));
        assert!(matches!(rx.try_recv().unwrap(), WorkerSignal::StartingAction { id: 0, .. }));
        assert!(matches!(rx.try_recv().unwrap(), WorkerSignal::Shutdown { id: 0 }));
        assert!(rx.try_recv().is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len(), 2, "the two bypassed std actions are left unexecuted in the queue");
    }

    #[test]
    fn test_worker_honors_pause_before_resume() {
        let queue = Arc::new(PriorityActionQueue::new());
        let (tx, rx) = crate::pchannel::bounded(32);
        queue.push(0, 0, PauseAction::new().into_handle());
        let worker = Worker::new(1, queue.clone(), tx);
        let join = thread::spawn(move || worker.run());

        assert!(matches!(rx.recv().unwrap(), WorkerSignal::Started { id: 1 }));
        assert!(matches!(rx.recv().unwrap(), WorkerSignal::StartingAction { id: 1, .. }));
        assert!(matches!(rx.recv().unwrap(), WorkerSignal::Paused { id: 1 }));

        // while suspended, a standard action behind it must not be taken
        let runs = Arc::new(AtomicUsize::new(0));
        queue.push(2, 1, CountingLeaf { core: ActionCore::new(), runs: runs.clone() }.into_handle());
        queue.push(1, 2, ResumeAction::new().into_handle());

        assert!(matches!(rx.recv().unwrap(), WorkerSignal::StartingAction { id: 1, .. }));
        assert!(matches!(rx.recv().unwrap(), WorkerSignal::Resumed { id: 1 }));
        assert!(matches!(rx.recv().unwrap(), WorkerSignal::StartingAction { id: 1, .. }));
        assert!(matches!(rx.recv().unwrap(), WorkerSignal::DoneWithAction { id: 1, .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        queue.push(-5, 3, ShutdownAction::new().into_handle());
        assert!(matches!(rx.recv().unwrap(), WorkerSignal::StartingAction { id: 1, .. }));
        assert!(matches!(rx.recv().unwrap(), WorkerSignal::Shutdown { id: 1 }));
        join.join().unwrap();
    }
}
