//! Blocking jobs run off the UI thread and are polled from the event loop.

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

#[derive(Debug)]
pub enum Outcome<T> {
    Done(T),
    Cancelled,
    Failed(String),
}

/// Handle to a job started with [`spawn_blocking`]. Dropping it cancels the
/// job's delivery.
#[derive(Debug)]
pub struct Pending<T> {
    result: oneshot::Receiver<Outcome<T>>,
    cancel: Option<oneshot::Sender<()>>,
}

pub fn spawn_blocking<T, F>(handle: &Handle, job: F) -> Pending<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (result_tx, result_rx) = oneshot::channel();
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    let blocking = handle.spawn_blocking(job);
    handle.spawn(async move {
        let outcome = tokio::select! {
            joined = blocking => match joined {
                Ok(value) => Outcome::Done(value),
                Err(e) => Outcome::Failed(e.to_string()),
            },
            _ = cancel_rx => Outcome::Cancelled,
        };
        // Receiver may already be gone.
        let _ = result_tx.send(outcome);
    });

    Pending {
        result: result_rx,
        cancel: Some(cancel_tx),
    }
}

impl<T> Pending<T> {
    /// Returns the outcome once, when it is ready.
    pub fn try_take(&mut self) -> Option<Outcome<T>> {
        match self.result.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Outcome::Failed("background task vanished".to_string())),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tokio::runtime::Runtime;

    fn wait<T>(pending: &mut Pending<T>) -> Outcome<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = pending.try_take() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "job did not finish in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn delivers_job_result() {
        let runtime = Runtime::new().unwrap();
        let mut pending = spawn_blocking(runtime.handle(), || 40 + 2);
        assert!(matches!(wait(&mut pending), Outcome::Done(42)));
    }

    #[test]
    fn cancelled_job_reports_cancellation() {
        let runtime = Runtime::new().unwrap();
        let mut pending = spawn_blocking(runtime.handle(), || {
            std::thread::sleep(Duration::from_millis(500));
            1
        });
        pending.cancel();
        assert!(matches!(wait(&mut pending), Outcome::Cancelled));
    }

    #[test]
    fn panicking_job_is_reported_as_failure() {
        let runtime = Runtime::new().unwrap();
        let mut pending = spawn_blocking(runtime.handle(), || -> u8 { panic!("probe exploded") });
        assert!(matches!(wait(&mut pending), Outcome::Failed(_)));
    }
}
