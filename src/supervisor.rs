use std::collections::{btree_map, BTreeMap};
use std::{mem, thread};

use serde::Serialize;

use crate::task::{Builder, Task};
use crate::{Error, Result};

/// Supervisor prelude
pub mod prelude {
    pub use super::Supervisor;
    pub use crate::task::Builder;
}

/// A supervisor object used to manage named threads spawned with [`Builder`].
///
/// The [`crate::dispatcher::Dispatcher`] uses one supervisor to own every worker thread plus its
/// own event-loop thread, so that `stop_dispatcher`/`kill_threads` has a single place to join
/// everything.
#[derive(Serialize)]
pub struct Supervisor<T> {
    tasks: BTreeMap<String, Task<T>>,
}

impl<T> Default for Supervisor<T> {
    fn default() -> Self {
        Self {
            tasks: <_>::default(),
        }
    }
}

impl<T> Supervisor<T> {
    /// Creates a new, empty supervisor
    pub fn new() -> Self {
        Self::default()
    }
    /// Spawns a new task using a [`Builder`] object and registers it. The task name MUST be unique.
    pub fn spawn<F, B>(&mut self, builder: B, f: F) -> Result<&Task<T>>
    where
        B: Into<Builder>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let builder = builder.into();
        let Some(name) = builder.name.clone() else {
            return Err(Error::SupervisorNameNotSpecified);
        };
        let btree_map::Entry::Vacant(entry) = self.tasks.entry(name.clone()) else {
            return Err(Error::SupervisorDuplicateTask(name));
        };
        let task = builder.spawn(f)?;
        Ok(entry.insert(task))
    }
    /// Gets a task by its name
    pub fn get_task(&self, name: &str) -> Option<&Task<T>> {
        self.tasks.get(name)
    }
    /// Takes a task by its name and removes it from the internal registry
    pub fn take_task(&mut self, name: &str) -> Option<Task<T>> {
        self.tasks.remove(name)
    }
    /// Removes a task from the internal registry
    pub fn forget_task(&mut self, name: &str) -> Result<()> {
        if self.tasks.remove(name).is_some() {
            Ok(())
        } else {
            Err(Error::SupervisorTaskNotFound)
        }
    }
    /// Removes all finished tasks from the internal registry
    pub fn purge(&mut self) {
        self.tasks.retain(|_, task| !task.is_finished());
    }
    /// Joins all non-blocking tasks in the internal registry and returns a map with their
    /// results. After the operation the registry is cleared.
    pub fn join_all(&mut self) -> BTreeMap<String, thread::Result<T>> {
        let mut result = BTreeMap::new();
        for (name, task) in mem::take(&mut self.tasks) {
            if !task.is_blocking() {
                result.insert(name, task.join());
            }
        }
        result
    }
}
