//! Phase A: OS signal subscription.
//!
//! Subscribes to the configured signal set for the full lifetime of the
//! run and delivers the first occurrence to a single-slot channel, mirroring
//! the host application's `runtime::shutdown::wait_for_shutdown` waiter but
//! generalized to a caller-chosen signal set instead of a hardcoded pair.

use tokio::sync::mpsc;

/// One OS signal the engine should treat as a shutdown trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

/// The set of signals that trigger reverse-cascade shutdown.
#[derive(Debug, Clone)]
pub struct SignalSet(Vec<Signal>);

impl SignalSet {
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> Self {
        Self(signals.into_iter().collect())
    }

    pub fn default_set() -> Self {
        Self(vec![Signal::Interrupt, Signal::Terminate])
    }

    pub fn signals(&self) -> &[Signal] {
        &self.0
    }
}

impl Default for SignalSet {
    fn default() -> Self {
        Self::default_set()
    }
}

/// Spawns the signal-subscription task and returns a receiver that yields
/// once, the moment any configured signal arrives. The returned
/// `JoinHandle` should be aborted once `run` is done with it so the
/// listener task doesn't outlive the engine.
pub(crate) fn subscribe(set: SignalSet) -> (mpsc::Receiver<()>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1);
    let handle = tokio::spawn(async move {
        if wait_for_any(&set).await.is_ok() {
            let _ = tx.send(()).await;
        }
    });
    (rx, handle)
}

#[cfg(unix)]
async fn wait_for_any(set: &SignalSet) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut listeners = Vec::new();
    for sig in set.signals() {
        let kind = match sig {
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Terminate => SignalKind::terminate(),
        };
        listeners.push(signal(kind)?);
    }
    if listeners.is_empty() {
        // No configured signals: never fires, matching an empty set meaning
        // "shutdown is driven purely by internal failure".
        std::future::pending::<()>().await;
        return Ok(());
    }
    let waiters = listeners.iter_mut().map(|l| Box::pin(l.recv()));
    futures::future::select_all(waiters).await;
    Ok(())
}

#[cfg(windows)]
async fn wait_for_any(set: &SignalSet) -> std::io::Result<()> {
    if set.signals().is_empty() {
        std::future::pending::<()>().await;
        return Ok(());
    }
    // Windows console signals don't distinguish interrupt/terminate as
    // finely as unix; any configured signal maps onto Ctrl-C.
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_is_interrupt_and_terminate() {
        let set = SignalSet::default();
        assert_eq!(set.signals(), &[Signal::Interrupt, Signal::Terminate]);
    }

    #[tokio::test]
    async fn empty_set_never_fires() {
        let (mut rx, handle) = subscribe(SignalSet::new(Vec::new()));
        let res = tokio::time::timeout(std::time::Duration::from_millis(20), rx.recv()).await;
        assert!(res.is_err(), "empty signal set must not deliver a shutdown trigger");
        handle.abort();
    }
}
