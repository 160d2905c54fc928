//! A [`Ticker`] that only fires when the test says so.

use helpdesk_core::environment::Ticker;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// Ticker fed by a [`TickHandle`].
///
/// Once every handle is dropped the ticker never fires again, which leaves the
/// owning loop parked until it is shut down.
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Sends ticks to a [`ManualTicker`].
#[derive(Debug, Clone)]
pub struct TickHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    /// Creates a ticker and the handle that drives it.
    #[must_use]
    pub fn new() -> (Self, TickHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, TickHandle { tx })
    }
}

impl TickHandle {
    /// Queues one tick. Returns false if the ticker is gone.
    pub fn tick(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl Ticker for ManualTicker {
    fn tick(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if self.rx.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        })
    }
}
