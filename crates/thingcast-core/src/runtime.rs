//! Dedicated execution context for the mutator.
//!
//! The mutator must keep publishing while the request-serving runtime is
//! saturated, so [`MutatorRuntime`] gives it an OS thread and a tokio
//! scheduler of its own. It shares nothing with the server except the
//! [`ServiceContext`](crate::ServiceContext) backends.

use std::thread::JoinHandle;

use tokio::sync::watch;
use tracing::{error, info};

use crate::error::MutatorError;
use crate::mutator::{Mutator, Shutdown};

const THREAD_NAME: &str = "thingcast-mutator";

/// A mutator running on its own thread and runtime.
#[derive(Debug)]
pub struct MutatorRuntime {
    trigger: watch::Sender<bool>,
    thread: Option<JoinHandle<Result<(), MutatorError>>>,
}

impl MutatorRuntime {
    /// Start `mutator` on a new thread with a fresh current-thread runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError::Runtime`] if the runtime or thread cannot be
    /// created.
    pub fn start(mutator: Mutator) -> Result<Self, MutatorError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(MutatorError::Runtime)?;
        let (trigger, shutdown) = Shutdown::channel();

        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || {
                let result = runtime.block_on(mutator.run(shutdown));
                if let Err(e) = &result {
                    error!(error = %e, "Mutator exited with error");
                }
                result
            })
            .map_err(MutatorError::Runtime)?;

        info!(thread = THREAD_NAME, "Mutator runtime started");
        Ok(Self {
            trigger,
            thread: Some(thread),
        })
    }

    /// Whether the mutator thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal shutdown and wait for the thread to finish.
    ///
    /// Blocks the calling thread; from async code call it through
    /// `tokio::task::spawn_blocking`.
    ///
    /// # Errors
    ///
    /// Returns the mutator's own error, or [`MutatorError::ThreadPanicked`]
    /// if the thread panicked.
    pub fn stop(mut self) -> Result<(), MutatorError> {
        self.trigger.send_replace(true);
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let result = thread.join().unwrap_or(Err(MutatorError::ThreadPanicked));
        info!("Mutator runtime stopped");
        result
    }
}

impl Drop for MutatorRuntime {
    fn drop(&mut self) {
        // Not joined here: dropping must not block.
        self.trigger.send_replace(true);
    }
}
