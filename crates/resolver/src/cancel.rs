use crate::error::{ResolveError, Result};
use std::future::Future;
use tokio::sync::watch;

/// Caller-side switch that cancels every operation holding its [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observed at every remote-call boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Drives `fut` to completion unless the signal fires first, in which
    /// case the future is dropped and [`ResolveError::Cancelled`] returned.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        let Some(rx) = &self.rx else {
            return Ok(fut.await);
        };
        if *rx.borrow() {
            return Err(ResolveError::Cancelled);
        }

        let mut rx = rx.clone();
        tokio::select! {
            out = fut => Ok(out),
            () = wait_cancelled(&mut rx) => Err(ResolveError::Cancelled),
        }
    }
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Handle dropped without cancelling: never fires.
            std::future::pending::<()>().await;
        }
    }
}
