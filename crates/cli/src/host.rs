//! Main-thread bridge for the command-line front end.
//!
//! Background refreshes queue their completion callbacks on a channel; the
//! command loop drains it between steps. Notices go straight to stderr.

use tagcache_core::{Host, MainTask};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// [`Host`] handed to the refresher.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: UnboundedSender<MainTask>,
}

/// Receiving end, owned by the command loop.
#[derive(Debug)]
pub struct MainQueue {
    rx: UnboundedReceiver<MainTask>,
}

pub fn channel() -> (ChannelHost, MainQueue) {
    let (tx, rx) = unbounded_channel();
    (ChannelHost { tx }, MainQueue { rx })
}

impl Host for ChannelHost {
    fn run_on_main(&self, task: MainTask) {
        if self.tx.send(task).is_err() {
            tracing::debug!("main queue closed; dropping task");
        }
    }

    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

impl MainQueue {
    /// Run every task queued so far. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }
}
