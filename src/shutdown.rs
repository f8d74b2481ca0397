use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pub fn shutdown_signal() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = oneshot::channel();

    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

/// Dropping the handle fires the signal, as does calling `shutdown()`.
pub struct ShutdownHandle {
    tx: oneshot::Sender<()>,
}

impl ShutdownHandle {
    pub fn shutdown(self) {
        let _ = self.tx.send(());
    }
}

/// Resolves once its handle is used or dropped. Poll it to completion at most once.
pub struct ShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl Future for ShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = Pin::new(&mut self.rx);

        match rx.poll(cx) {
            Poll::Pending => Poll::Pending,
            // Sent or dropped, either way we stop.
            Poll::Ready(_) => Poll::Ready(()),
        }
    }
}
