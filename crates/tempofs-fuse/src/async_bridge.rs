//! Task-per-operation dispatch from FUSE callbacks onto the tokio runtime.
//!
//! FUSE callbacks run on the session thread and must not block on network
//! I/O, or every other pending operation would wait behind a slow server.
//! Each operation is therefore spawned as an independent task that owns its
//! reply object and answers the kernel when the future resolves. The only
//! state shared between tasks is the read-only registry and the handle
//! table.

use crate::error::FsResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tracing::trace;

/// Statistics for dispatched operations (for observability).
#[derive(Debug, Default)]
pub struct BridgeStats {
    pub operations_started: AtomicU64,
    pub operations_completed: AtomicU64,
    pub operations_failed: AtomicU64,
}

impl BridgeStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_start(&self) {
        self.operations_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_complete(&self) {
        self.operations_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.operations_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Operations started but not yet answered.
    pub fn in_flight(&self) -> u64 {
        let started = self.operations_started.load(Ordering::Relaxed);
        let finished = self.operations_completed.load(Ordering::Relaxed)
            + self.operations_failed.load(Ordering::Relaxed);
        started.saturating_sub(finished)
    }
}

/// A FUSE reply that can carry an error code.
pub trait ErrorReply: Send + 'static {
    fn reply_error(self, errno: i32);
}

macro_rules! impl_error_reply {
    ($($reply:ty),* $(,)?) => {
        $(
            impl ErrorReply for $reply {
                fn reply_error(self, errno: i32) {
                    self.error(errno);
                }
            }
        )*
    };
}

impl_error_reply!(
    fuser::ReplyAttr,
    fuser::ReplyData,
    fuser::ReplyDirectory,
    fuser::ReplyEmpty,
    fuser::ReplyEntry,
    fuser::ReplyOpen,
);

/// Spawns `future` and answers `reply` with its outcome.
///
/// On success `respond` receives the reply and the value; on failure the
/// reply gets the error's errno. A reply dropped without an answer (for
/// example if the task panics) is answered with `EIO` by fuser itself.
pub fn dispatch<R, T, F, S>(
    handle: &Handle,
    stats: &Arc<BridgeStats>,
    op: &'static str,
    reply: R,
    future: F,
    respond: S,
) where
    R: ErrorReply,
    T: Send + 'static,
    F: Future<Output = FsResult<T>> + Send + 'static,
    S: FnOnce(R, T) + Send + 'static,
{
    stats.record_start();
    let stats = Arc::clone(stats);
    handle.spawn(async move {
        match future.await {
            Ok(value) => {
                stats.record_complete();
                respond(reply, value);
            }
            Err(e) => {
                stats.record_failure();
                trace!(op, error = %e, "operation failed");
                reply.reply_error(e.to_errno());
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsError;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempofs_core::ResolveError;

    /// Records what the kernel would have been told.
    struct TestReply(mpsc::Sender<Result<u64, i32>>);

    impl ErrorReply for TestReply {
        fn reply_error(self, errno: i32) {
            let _ = self.0.send(Err(errno));
        }
    }

    fn run<F>(stats: &Arc<BridgeStats>, future: F) -> Result<u64, i32>
    where
        F: Future<Output = FsResult<u64>> + Send + 'static,
    {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = mpsc::channel();
        dispatch(
            rt.handle(),
            stats,
            "test",
            TestReply(tx),
            future,
            |reply, value| {
                let _ = reply.0.send(Ok(value));
            },
        );
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_dispatch_success() {
        let stats = BridgeStats::new();
        assert_eq!(run(&stats, async { Ok(42) }), Ok(42));
        assert_eq!(stats.operations_started.load(Ordering::Relaxed), 1);
        assert_eq!(stats.operations_completed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.operations_failed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_dispatch_failure_replies_errno() {
        let stats = BridgeStats::new();
        let result = run(&stats, async {
            Err(FsError::from(ResolveError::UnknownInode(9)))
        });
        assert_eq!(result, Err(libc::ENOENT));
        assert_eq!(stats.operations_failed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.operations_completed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_operations_run_concurrently() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let stats = BridgeStats::new();
        let (tx, rx) = mpsc::channel();
        let (slow_tx, slow_rx) = tokio::sync::oneshot::channel::<()>();

        // The first operation waits for the second one to finish.
        dispatch(
            rt.handle(),
            &stats,
            "slow",
            TestReply(tx.clone()),
            async move {
                let _ = slow_rx.await;
                Ok(1)
            },
            |reply, value| {
                let _ = reply.0.send(Ok(value));
            },
        );
        dispatch(
            rt.handle(),
            &stats,
            "fast",
            TestReply(tx),
            async move {
                let _ = slow_tx.send(());
                Ok(2)
            },
            |reply, value| {
                let _ = reply.0.send(Ok(value));
            },
        );

        let mut answers = [
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ];
        answers.sort_unstable();
        assert_eq!(answers, [Ok(1), Ok(2)]);
        assert_eq!(stats.in_flight(), 0);
    }
}
