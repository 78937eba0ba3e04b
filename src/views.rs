use std::collections::HashMap;
use std::time::Duration;

use crate::action::ActionHandle;
use crate::dispatcher::ThreadRow;
use crate::event::{ActionStatus, Event};
use crate::hub::Client;

/// One row of the action tree view: the five columns named in spec §4.6.
#[derive(Debug, Clone)]
pub struct ActionTreeRow {
    /// static short label for the action's subtype
    pub short_description: String,
    /// current human-readable phase string
    pub current_process: String,
    /// current lifecycle status
    pub status: ActionStatus,
    /// current completion percentage, in `[0, 100]`
    pub pct_complete: u8,
    /// wall-clock duration, once both `setup` and `tear_down` have run
    pub duration: Option<Duration>,
}

impl ActionTreeRow {
    fn from_action(action: &ActionHandle) -> Self {
        Self {
            short_description: action.short_description().to_owned(),
            current_process: action.core().current_process(),
            status: action.core().status(),
            pct_complete: action.core().pct_complete(),
            duration: action.core().duration(),
        }
    }
}

struct ActionTreeNode {
    row: ActionTreeRow,
    children: Vec<usize>,
}

/// A tree-shaped read model over dispatched actions (§4.6).
///
/// A caller appends a root with [`Self::append_root`] and, once the dispatcher's `created`
/// notification names a parent index already known to this view, its children with
/// [`Self::append_child`] — mirroring the "append a root action" / "append a child under a known
/// parent index" model-level operations the spec asks an action tree view to expose. Once rows
/// exist, [`Self::refresh`] drains pending `started`/`tick`/`finished` notifications and updates
/// the matching row's columns.
pub struct ActionTreeView {
    nodes: Vec<ActionTreeNode>,
    roots: Vec<usize>,
    index: HashMap<u64, usize>,
    events: Client<Event>,
}

impl ActionTreeView {
    /// Wraps an event client already subscribed to `started`/`tick`/`finished`/`created` (see
    /// [`crate::event_matches`]) in a fresh, empty tree view.
    pub fn new(events: Client<Event>) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            index: HashMap::new(),
            events,
        }
    }

    /// Appends a root action, returning its row index.
    pub fn append_root(&mut self, action: &ActionHandle) -> usize {
        let idx = self.insert_node(action);
        self.roots.push(idx);
        idx
    }

    /// Appends `action` as a child of the action at `parent_idx` (a row index previously returned
    /// by [`Self::append_root`] or [`Self::append_child`]), returning its own row index.
    pub fn append_child(&mut self, parent_idx: usize, action: &ActionHandle) -> usize {
        let idx = self.insert_node(action);
        self.nodes[parent_idx].children.push(idx);
        idx
    }

    fn insert_node(&mut self, action: &ActionHandle) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(ActionTreeNode {
            row: ActionTreeRow::from_action(action),
            children: Vec::new(),
        });
        self.index.insert(action.core().id(), idx);
        idx
    }

    /// The row index a previously-appended action was given, if any.
    pub fn index_of(&self, action: &ActionHandle) -> Option<usize> {
        self.index.get(&action.core().id()).copied()
    }

    /// The current column values for the row at `idx`.
    pub fn row(&self, idx: usize) -> Option<&ActionTreeRow> {
        self.nodes.get(idx).map(|n| &n.row)
    }

    /// Root row indices, in append order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Child row indices of `idx`, in append order.
    pub fn children(&self, idx: usize) -> &[usize] {
        self.nodes.get(idx).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Drains pending notifications, refreshing the column values of any row already known to
    /// this view. A `started`/`tick`/`finished` for an action not yet appended is ignored — the
    /// caller is expected to append it (typically in reaction to its own `created` notification)
    /// before this view can track it.
    pub fn refresh(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            let action = match event {
                Event::ActionStarted { action } | Event::ActionTick { action } | Event::ActionFinished { action } => action,
                _ => continue,
            };
            if let Some(&idx) = self.index.get(&action.core().id()) {
                self.nodes[idx].row = ActionTreeRow::from_action(&action);
            }
        }
    }
}

/// A flat list view over one queue's current contents (§4.6), refreshed by re-reading a snapshot
/// whenever that queue's `contents-changed` notification fires.
pub struct QueueListView {
    snapshot: Box<dyn Fn() -> Vec<ActionHandle> + Send + Sync>,
    rows: Vec<ActionHandle>,
    events: Client<Event>,
}

impl QueueListView {
    /// Wraps an event client already subscribed to one queue's `contents-changed` notification in
    /// a view backed by `snapshot` (typically `Dispatcher::queue_snapshot` for that same queue).
    pub fn new(events: Client<Event>, snapshot: impl Fn() -> Vec<ActionHandle> + Send + Sync + 'static) -> Self {
        let rows = snapshot();
        Self {
            snapshot: Box::new(snapshot),
            rows,
            events,
        }
    }

    /// The view's current rows, in queue order.
    pub fn rows(&self) -> &[ActionHandle] {
        &self.rows
    }

    /// Drains pending `contents-changed` notifications and, if any arrived, re-reads the
    /// snapshot.
    pub fn refresh(&mut self) {
        let mut changed = false;
        while self.events.try_recv().is_ok() {
            changed = true;
        }
        if changed {
            self.rows = (self.snapshot)();
        }
    }
}

/// The three-column thread view (§4.6): `(id, status, current_action.short_description)`,
/// refreshed on `thread_status_changed`/`thread_action_changed`.
pub struct ThreadView {
    snapshot: Box<dyn Fn() -> Vec<ThreadRow> + Send + Sync>,
    rows: Vec<ThreadRow>,
    events: Client<Event>,
}

impl ThreadView {
    /// Wraps an event client already subscribed to `thread_status_changed`/`thread_action_changed`
    /// in a view backed by `snapshot` (typically `Dispatcher::thread_table_snapshot`).
    pub fn new(events: Client<Event>, snapshot: impl Fn() -> Vec<ThreadRow> + Send + Sync + 'static) -> Self {
        let rows = snapshot();
        Self {
            snapshot: Box::new(snapshot),
            rows,
            events,
        }
    }

    /// The view's current rows, ordered by worker id.
    pub fn rows(&self) -> &[ThreadRow] {
        &self.rows
    }

    /// Drains pending notifications and, if any arrived, re-reads the snapshot.
    pub fn refresh(&mut self) {
        let mut changed = false;
        while self.events.try_recv().is_ok() {
            changed = true;
        }
        if changed {
            self.rows = (self.snapshot)();
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::action::{ActionCore, IntoActionHandle};
    use crate::event::{ActionStatus as Status, ThreadStatus};
    use crate::event_matches;
    use crate::hub::Hub;

    struct Dummy {
        core: ActionCore,
    }

    impl crate::action::Action for Dummy {
        fn core(&self) -> &ActionCore {
            &self.core
        }
        fn do_work(&self) {
            self.core.set_status(Status::Complete);
        }
        fn short_description(&self) -> &str {
            "Dummy"
        }
    }

    fn dummy() -> ActionHandle {
        Dummy { core: ActionCore::new() }.into_handle()
    }

    #[test]
    fn test_action_tree_view_append_and_refresh() {
        let hub = Hub::<Event>::new();
        let client = hub
            .register("view", event_matches!(Event::ActionStarted { .. } | Event::ActionTick { .. } | Event::ActionFinished { .. }))
            .unwrap();
        let mut view = ActionTreeView::new(client);
        let root = dummy();
        root.core().set_hub(hub.clone());
        let root_idx = view.append_root(&root);
        let child = dummy();
        child.core().set_hub(hub.clone());
        let child_idx = view.append_child(root_idx, &child);
        assert_eq!(view.roots(), &[root_idx]);
        assert_eq!(view.children(root_idx), &[child_idx]);

        child.execute_action();
        view.refresh();
        let row = view.row(child_idx).unwrap();
        assert_eq!(row.status, Status::Complete);
        assert_eq!(row.pct_complete, 100);
    }

    #[test]
    fn test_queue_list_view_refreshes_only_on_notification() {
        let hub = Hub::<Event>::new();
        let client = hub.register("q", event_matches!(Event::ImmediateQueueContentsChanged)).unwrap();
        let counter = Arc::new(AtomicU64::new(0));
        let counter_for_closure = counter.clone();
        let mut view = QueueListView::new(client, move || {
            counter_for_closure.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        });
        assert_eq!(counter.load(Ordering::SeqCst), 1, "constructing reads the initial snapshot once");
        view.refresh();
        assert_eq!(counter.load(Ordering::SeqCst), 1, "no notification arrived, no re-read");
        hub.send(Event::ImmediateQueueContentsChanged);
        view.refresh();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(view.rows().is_empty());
    }

    #[test]
    fn test_thread_view_refreshes_on_status_or_action_change() {
        let hub = Hub::<Event>::new();
        let client = hub
            .register("th", event_matches!(Event::ThreadStatusChanged { .. } | Event::ThreadActionChanged { .. }))
            .unwrap();
        let rows = Arc::new(std::sync::Mutex::new(vec![ThreadRow {
            id: 0,
            status: ThreadStatus::Idle,
            current_action: None,
        }]));
        let rows_for_closure = rows.clone();
        let mut view = ThreadView::new(client, move || rows_for_closure.lock().unwrap().clone());
        assert_eq!(view.rows().len(), 1);
        rows.lock().unwrap()[0].status = ThreadStatus::Active;
        hub.send(Event::ThreadStatusChanged { id: 0 });
        view.refresh();
        assert_eq!(view.rows()[0].status, ThreadStatus::Active);
    }
}
