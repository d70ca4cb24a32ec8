//! Capabilities borrowed from the embedding application.
//!
//! Background refreshes never touch the front end directly. They hand
//! completion callbacks to [`Host::run_on_main`] and surface non-fatal
//! notices through [`Host::notify`].

/// Work to run on the host's interactive thread.
pub type MainTask = Box<dyn FnOnce() + Send + 'static>;

/// Front-end bridge injected into the refresh layer.
pub trait Host: Send + Sync {
    /// Queue `task` on the main thread. Must tolerate being called after the
    /// front end has gone away.
    fn run_on_main(&self, task: MainTask);

    /// Show a transient, non-blocking message.
    fn notify(&self, message: &str);
}

/// Host for headless use: runs tasks on the calling thread and logs notices.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineHost;

impl Host for InlineHost {
    fn run_on_main(&self, task: MainTask) {
        task();
    }

    fn notify(&self, message: &str) {
        tracing::info!(notice = message, "host notice");
    }
}
