use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, TryRecvError};

use crate::api::ApiError;
use crate::session::{FetchFailure, SessionError};

/// One backend call running on a worker thread.
///
/// The UI thread calls [`PendingFetch::poll`] on every tick; the first
/// `Some` it returns is final.
#[derive(Debug)]
pub struct PendingFetch<T> {
    label: &'static str,
    rx: Receiver<Result<T, ApiError>>,
    started: Instant,
    deadline: Duration,
}

impl<T: Send + 'static> PendingFetch<T> {
    pub fn spawn<F>(label: &'static str, deadline: Duration, job: F) -> Result<Self, SessionError>
    where
        F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        thread::Builder::new()
            .name(format!("fetch-{}", label.trim_start_matches('/').replace('/', "-")))
            .spawn(move || {
                let result = job();
                if tx.send(result).is_err() {
                    tracing::debug!(label, "fetch result arrived after the caller gave up");
                }
            })
            .map_err(SessionError::Spawn)?;
        tracing::info!(label, deadline_ms = deadline.as_millis() as u64, "fetch started");
        Ok(Self {
            label,
            rx,
            started: Instant::now(),
            deadline,
        })
    }
}

impl<T> PendingFetch<T> {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn poll(&self) -> Option<Result<T, FetchFailure>> {
        match self.rx.try_recv() {
            Ok(Ok(value)) => {
                tracing::info!(label = self.label, elapsed_ms = self.elapsed().as_millis() as u64, "fetch finished");
                Some(Ok(value))
            }
            Ok(Err(err)) => {
                tracing::warn!(label = self.label, %err, "fetch failed");
                Some(Err(FetchFailure::Api(err)))
            }
            Err(TryRecvError::Empty) if self.elapsed() >= self.deadline => {
                tracing::warn!(label = self.label, "fetch exceeded its deadline");
                Some(Err(FetchFailure::Timeout {
                    after: self.deadline,
                }))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                tracing::error!(label = self.label, "fetch worker exited without a result");
                Some(Err(FetchFailure::WorkerLost))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;

    pub(crate) fn wait<T>(fetch: &PendingFetch<T>) -> Result<T, FetchFailure> {
        let give_up = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = fetch.poll() {
                return result;
            }
            assert!(Instant::now() < give_up, "fetch never settled");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn delivers_worker_result() -> anyhow::Result<()> {
        let fetch = PendingFetch::spawn("/plan", Duration::from_secs(5), || Ok(7))?;
        assert_eq!(wait(&fetch).ok(), Some(7));
        Ok(())
    }

    #[test]
    fn api_errors_are_reported() -> anyhow::Result<()> {
        let fetch: PendingFetch<()> = PendingFetch::spawn("/plan", Duration::from_secs(5), || {
            Err(ApiError::Timeout { endpoint: "/plan" })
        })?;
        assert_matches!(wait(&fetch), Err(FetchFailure::Api(ApiError::Timeout { .. })));
        Ok(())
    }

    #[test]
    fn slow_worker_hits_the_deadline() -> anyhow::Result<()> {
        let fetch = PendingFetch::spawn("/preview", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        })?;
        assert_matches!(wait(&fetch), Err(FetchFailure::Timeout { .. }));
        Ok(())
    }

    #[test]
    fn panicking_worker_is_reported_as_lost() -> anyhow::Result<()> {
        let fetch: PendingFetch<()> =
            PendingFetch::spawn("/recommend", Duration::from_secs(5), || panic!("boom"))?;
        assert_matches!(wait(&fetch), Err(FetchFailure::WorkerLost));
        Ok(())
    }
}
