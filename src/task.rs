use std::{
    fmt,
    thread::{self, JoinHandle},
};

use serde::{Serialize, Serializer};

use crate::{Error, Result};

/// A thread builder object, similar to [`thread::Builder`] but integrated with
/// [`crate::supervisor::Supervisor`]
#[derive(Default, Clone)]
pub struct Builder {
    pub(crate) name: Option<String>,
    stack_size: Option<usize>,
    blocking: bool,
}

macro_rules! impl_builder_from {
    ($t: ty) => {
        impl From<$t> for Builder {
            fn from(s: $t) -> Self {
                Builder::new().name(s)
            }
        }
    };
}

impl_builder_from!(&str);
impl_builder_from!(String);

impl Builder {
    /// Creates a new thread builder
    pub fn new() -> Self {
        Self::default()
    }
    /// The task name SHOULD be 15 characters or less to set a proper thread name
    pub fn name<N: fmt::Display>(mut self, name: N) -> Self {
        self.name = Some(name.to_string());
        self
    }
    /// Overrides the default stack size
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
    /// A hint for task supervisors that the task blocks the thread (e.g. waits on a channel
    /// forever) and should not be expected to return a useful result
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }
    fn try_into_thread_builder(self) -> Result<(thread::Builder, String, bool)> {
        let mut builder = thread::Builder::new();
        if let Some(ref name) = self.name {
            builder = builder.name(name.clone());
        }
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        Ok((builder, self.name.unwrap_or_default(), self.blocking))
    }
    /// Spawns a task
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying OS thread could not be created
    pub fn spawn<F, T>(self, f: F) -> Result<Task<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (builder, name, blocking) = self.try_into_thread_builder()?;
        let handle = builder.spawn(f).map_err(Error::IO)?;
        Ok(Task {
            name,
            handle,
            blocking,
        })
    }
}

/// An extended task object, returned by [`Builder::spawn()`]
///
/// Can be converted into a standard [`JoinHandle`].
#[derive(Serialize)]
pub struct Task<T> {
    name: String,
    #[serde(rename(serialize = "active"), serialize_with = "serialize_join_handle_active")]
    handle: JoinHandle<T>,
    blocking: bool,
}

fn serialize_join_handle_active<T, S>(handle: &JoinHandle<T>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_bool(!handle.is_finished())
}

impl<T> Task<T> {
    /// Returns the task name
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Returns the task handle
    pub fn handle(&self) -> &JoinHandle<T> {
        &self.handle
    }
    /// Returns true if the task is finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
    /// Joins the task
    pub fn join(self) -> thread::Result<T> {
        self.handle.join()
    }
    /// Converts the task into a standard [`JoinHandle`]
    pub fn into_join_handle(self) -> JoinHandle<T> {
        self.into()
    }
    /// Returns true if the task is blocking
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }
}

impl<T> From<Task<T>> for JoinHandle<T> {
    fn from(task: Task<T>) -> Self {
        task.handle
    }
}
