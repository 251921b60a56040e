//! Soft deadline around one unit of processing work.
//!
//! When the deadline passes a warning is logged and the work keeps running:
//! it is never cancelled, and its result is returned unchanged once it
//! completes. The work always runs on its own task, so a panic comes back as
//! an error whether or not a deadline is set.

use std::future::Future;
use std::time::Duration;

use anyhow::anyhow;
use tokio::task::JoinError;
use tracing::{debug, warn, Instrument};

#[derive(Debug, Clone, Default)]
pub struct ProcessingSupervisor {
    timeout: Option<Duration>,
}

impl ProcessingSupervisor {
    /// A zero `timeout` disables supervision.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: (!timeout.is_zero()).then_some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `work` to completion, warning if it outlives the deadline.
    pub async fn run<F, T>(&self, work: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut worker = tokio::spawn(work.in_current_span());

        let Some(timeout) = self.timeout else {
            return worker.await.map_err(join_error)?;
        };

        let joined = tokio::select! {
            joined = &mut worker => joined,
            _ = tokio::time::sleep(timeout) => {
                warn!(
                    timeout_secs = timeout.as_secs_f64(),
                    "could not process message in the given time frame"
                );
                worker.await
            }
        };

        debug!("supervised processing finished");
        joined.map_err(join_error)?
    }
}

fn join_error(e: JoinError) -> anyhow::Error {
    anyhow!("processing task failed: {e}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const WARNING: &str = "could not process message in the given time frame";

    fn warnings(lines: &[&str]) -> usize {
        lines.iter().filter(|line| line.contains(WARNING)).count()
    }

    async fn slow(delay: Duration) -> anyhow::Result<&'static str> {
        tokio::time::sleep(delay).await;
        Ok("done")
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_disabled_never_warns() {
        let supervisor = ProcessingSupervisor::new(Duration::ZERO);
        assert_eq!(supervisor.timeout(), None);

        let result = supervisor.run(slow(Duration::from_secs(3600))).await.unwrap();

        assert_eq!(result, "done");
        logs_assert(|lines| match warnings(lines) {
            0 => Ok(()),
            n => Err(format!("expected no timeout warning, got {n}")),
        });
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_slow_work_warns_once_and_completes() {
        let supervisor = ProcessingSupervisor::new(Duration::from_secs(2));

        let result = supervisor.run(slow(Duration::from_secs(10))).await.unwrap();

        assert_eq!(result, "done");
        logs_assert(|lines| match warnings(lines) {
            1 => Ok(()),
            n => Err(format!("expected exactly one timeout warning, got {n}")),
        });
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_fast_work_does_not_warn() {
        let supervisor = ProcessingSupervisor::new(Duration::from_secs(2));

        let result = supervisor.run(slow(Duration::from_secs(1))).await.unwrap();

        assert_eq!(result, "done");
        assert!(!logs_contain(WARNING));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_propagates_after_deadline() {
        let supervisor = ProcessingSupervisor::new(Duration::from_secs(1));

        let err = supervisor
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Err::<(), _>(anyhow!("engine exploded"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "engine exploded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_work_becomes_error() {
        for timeout in [Duration::from_secs(1), Duration::ZERO] {
            let supervisor = ProcessingSupervisor::new(timeout);

            let err = supervisor
                .run(async {
                    if true {
                        panic!("boom");
                    }
                    Ok(())
                })
                .await
                .unwrap_err();

            assert!(
                err.to_string().starts_with("processing task failed"),
                "{timeout:?}: {err}"
            );
        }
    }
}
