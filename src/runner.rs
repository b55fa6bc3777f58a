use std::thread;

use log::trace;

use crate::{Error, Result};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs background work for a connection
pub trait TaskRunner: Send + Sync {
    /// Start `task` without waiting for it
    fn spawn(&self, name: &str, task: Task) -> Result<()>;

    /// Run `task` on the calling thread when `blocking`, in the background otherwise
    fn run_task(&self, name: &str, task: Task, blocking: bool) -> Result<()> {
        if blocking {
            task();
            Ok(())
        } else {
            self.spawn(name, task)
        }
    }
}

/// A [TaskRunner] that gives every task its own named thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRunner;

impl TaskRunner for ThreadRunner {
    fn spawn(&self, name: &str, task: Task) -> Result<()> {
        trace!("spawn: starting {}", name);
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(task)
            .map(|_| ())
            .map_err(|e| Error::Task(format!("{}: {}", name, e)))
    }
}
