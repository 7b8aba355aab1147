//! Checker contract and dispatch.

use crate::context::CheckContext;
use crate::error::{CheckError, Result};
use async_trait::async_trait;
use datagate_core::{CheckResult, StageCategory};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

/// A checker that awaits I/O (external lookups, caches).
#[async_trait]
pub trait AsyncCheck: Send + Sync {
    /// Registry and stage name.
    fn name(&self) -> &str;

    /// Stage category, used for reviewer routing.
    fn category(&self) -> StageCategory {
        StageCategory::Biological
    }

    /// Inspect the dataset.
    async fn check(&self, ctx: &CheckContext) -> Result<CheckResult>;
}

/// A synchronous, CPU-bound checker.
///
/// Runs on the blocking pool so it never stalls the runtime. Long loops
/// should poll [`CheckContext::ensure_active`].
pub trait BlockingCheck: Send + Sync {
    /// Registry and stage name.
    fn name(&self) -> &str;

    /// Stage category, used for reviewer routing.
    fn category(&self) -> StageCategory {
        StageCategory::Biological
    }

    /// Inspect the dataset.
    fn check(&self, ctx: &CheckContext) -> Result<CheckResult>;
}

/// A registered checker, tagged by how it must be executed.
#[derive(Clone)]
pub enum CheckerKind {
    /// Runs as a task on the async runtime
    Async(Arc<dyn AsyncCheck>),
    /// Runs on the blocking thread pool
    Blocking(Arc<dyn BlockingCheck>),
}

impl std::fmt::Debug for CheckerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckerKind::Async(c) => write!(f, "Async({})", c.name()),
            CheckerKind::Blocking(c) => write!(f, "Blocking({})", c.name()),
        }
    }
}

impl CheckerKind {
    /// Wrap an async checker.
    pub fn asynchronous(checker: impl AsyncCheck + 'static) -> Self {
        CheckerKind::Async(Arc::new(checker))
    }

    /// Wrap a blocking checker.
    pub fn blocking(checker: impl BlockingCheck + 'static) -> Self {
        CheckerKind::Blocking(Arc::new(checker))
    }

    /// Checker name.
    pub fn name(&self) -> &str {
        match self {
            CheckerKind::Async(c) => c.name(),
            CheckerKind::Blocking(c) => c.name(),
        }
    }

    /// Stage category.
    pub fn category(&self) -> StageCategory {
        match self {
            CheckerKind::Async(c) => c.category(),
            CheckerKind::Blocking(c) => c.category(),
        }
    }

    /// Run the checker in the execution context its kind requires.
    ///
    /// Panics are caught and returned as [`CheckError::Panicked`]. The call
    /// returns [`CheckError::Cancelled`] as soon as the context's token fires;
    /// an in-flight async check is dropped at that point, a blocking one is
    /// left to observe the token on its own.
    pub async fn run(&self, ctx: CheckContext) -> Result<CheckResult> {
        debug!("Running checker {}", self.name());
        let cancel = ctx.cancel.clone();

        match self {
            CheckerKind::Async(checker) => {
                let checker = checker.clone();
                let fut = AssertUnwindSafe(async move { checker.check(&ctx).await }).catch_unwind();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(CheckError::Cancelled),
                    outcome = fut => outcome.unwrap_or_else(|panic| Err(CheckError::Panicked(panic_message(panic)))),
                }
            }
            CheckerKind::Blocking(checker) => {
                let checker = checker.clone();
                let handle = tokio::task::spawn_blocking(move || checker.check(&ctx));
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(CheckError::Cancelled),
                    joined = handle => match joined {
                        Ok(outcome) => outcome,
                        Err(e) if e.is_panic() => Err(CheckError::Panicked(panic_message(e.into_panic()))),
                        Err(e) => Err(CheckError::Panicked(e.to_string())),
                    },
                }
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::context;
    use std::time::Duration;

    struct Sleepy;

    #[async_trait]
    impl AsyncCheck for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        async fn check(&self, ctx: &CheckContext) -> Result<CheckResult> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CheckResult::from_issues(self.name(), self.category(), vec![], ctx.dataset.len(), Duration::ZERO))
        }
    }

    struct Exploding;

    impl BlockingCheck for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn check(&self, _ctx: &CheckContext) -> Result<CheckResult> {
            panic!("row parser blew up");
        }
    }

    struct AsyncExploding;

    #[async_trait]
    impl AsyncCheck for AsyncExploding {
        fn name(&self) -> &str {
            "async_exploding"
        }

        async fn check(&self, _ctx: &CheckContext) -> Result<CheckResult> {
            panic!("lookup blew up");
        }
    }

    struct Counting;

    impl BlockingCheck for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn category(&self) -> StageCategory {
            StageCategory::Rule
        }

        fn check(&self, ctx: &CheckContext) -> Result<CheckResult> {
            Ok(CheckResult::from_issues(self.name(), self.category(), vec![], ctx.dataset.len(), Duration::ZERO))
        }
    }

    fn ctx() -> CheckContext {
        context("crispr_guides", &["a"], vec![vec![serde_json::json!(1)], vec![serde_json::json!(2)]])
    }

    #[tokio::test]
    async fn test_blocking_checker_runs() {
        let kind = CheckerKind::blocking(Counting);
        assert_eq!(kind.name(), "counting");
        assert_eq!(kind.category(), StageCategory::Rule);

        let result = kind.run(ctx()).await.unwrap();
        assert_eq!(result.records_processed, 2);
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_blocking_panic_is_caught() {
        let err = CheckerKind::blocking(Exploding).run(ctx()).await.unwrap_err();
        assert!(matches!(err, CheckError::Panicked(msg) if msg.contains("blew up")));
    }

    #[tokio::test]
    async fn test_async_panic_is_caught() {
        let err = CheckerKind::asynchronous(AsyncExploding).run(ctx()).await.unwrap_err();
        assert!(matches!(err, CheckError::Panicked(msg) if msg.contains("lookup blew up")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_async_checker() {
        let ctx = ctx();
        let cancel = ctx.cancel.clone();
        let run = tokio::spawn(async move { CheckerKind::asynchronous(Sleepy).run(ctx).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, CheckError::Cancelled));
    }
}
