//! Transfer worker: one chunk in, one terminal outcome out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::{ByteProgress, Transport};
use crate::types::{Chunk, ChunkOutcome};

/// Sends single chunks through a [`Transport`] and classifies the result.
///
/// `send` never fails: every transport error, including a timeout, is
/// folded into the returned [`ChunkOutcome`].
pub struct TransferWorker {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl TransferWorker {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Transfers `chunk`, forwarding byte progress to `on_progress`.
    pub async fn send(&self, chunk: &Chunk, on_progress: ByteProgress<'_>) -> ChunkOutcome {
        let index = chunk.index;
        let sent = AtomicU64::new(0);
        let total = AtomicU64::new(0);
        let reported = AtomicBool::new(false);

        let report = |transferred: u64, of: u64| {
            sent.store(transferred, Ordering::Relaxed);
            total.store(of, Ordering::Relaxed);
            reported.store(true, Ordering::Relaxed);
            on_progress(transferred, of);
        };

        debug!(
            batch_id = %chunk.batch_id,
            chunk = index,
            records = chunk.len(),
            "sending chunk"
        );

        let result = tokio::time::timeout(self.timeout, self.transport.transmit(chunk, &report))
            .await
            .unwrap_or_else(|_| {
                Err(TransportError::timeout(format!(
                    "no response within {} ms",
                    self.timeout.as_millis()
                )))
            });

        match result {
            Ok(delivery) => {
                debug!(chunk = index, bytes = delivery.bytes_sent, "chunk delivered");
                ChunkOutcome::success(index).with_bytes(delivery.bytes_sent, delivery.bytes_sent)
            }
            Err(e) => {
                warn!(chunk = index, kind = %e.kind, error = %e.message, "chunk failed");
                let outcome = ChunkOutcome::failed(index, e);
                if reported.load(Ordering::Relaxed) {
                    outcome.with_bytes(sent.load(Ordering::Relaxed), total.load(Ordering::Relaxed))
                } else {
                    outcome
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::transport::Delivery;
    use crate::types::ChunkStatus;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    enum Behavior {
        Ack(u64),
        Fail(TransportError),
        PartialThenFail(u64, u64),
        Hang,
    }

    struct MockTransport {
        behavior: Behavior,
    }

    impl Transport for MockTransport {
        fn transmit<'a>(
            &'a self,
            _chunk: &'a Chunk,
            progress: ByteProgress<'a>,
        ) -> Pin<Box<dyn Future<Output = Result<Delivery, TransportError>> + Send + 'a>> {
            Box::pin(async move {
                match &self.behavior {
                    Behavior::Ack(n) => {
                        progress(0, *n);
                        progress(*n, *n);
                        Ok(Delivery {
                            bytes_sent: *n,
                            message: "ok".into(),
                        })
                    }
                    Behavior::Fail(e) => Err(e.clone()),
                    Behavior::PartialThenFail(done, of) => {
                        progress(*done, *of);
                        Err(TransportError::network("connection reset"))
                    }
                    Behavior::Hang => {
                        std::future::pending::<()>().await;
                        unreachable!()
                    }
                }
            })
        }
    }

    fn chunk() -> Chunk {
        Chunk {
            batch_id: "b".into(),
            index: 3,
            total_chunks: 5,
            records: Vec::new(),
        }
    }

    fn worker(behavior: Behavior, timeout: Duration) -> TransferWorker {
        TransferWorker::new(Arc::new(MockTransport { behavior }), timeout)
    }

    #[tokio::test]
    async fn success_carries_bytes_and_progress() {
        let seen = Mutex::new(Vec::new());
        let on_progress = |a: u64, b: u64| seen.lock().unwrap().push((a, b));

        let outcome = worker(Behavior::Ack(64), Duration::from_secs(1))
            .send(&chunk(), &on_progress)
            .await;

        assert_eq!(outcome.chunk_index, 3);
        assert!(outcome.is_success());
        assert_eq!(outcome.bytes_transferred, Some(64));
        assert_eq!(*seen.lock().unwrap(), vec![(0, 64), (64, 64)]);
    }

    #[tokio::test]
    async fn failure_is_returned_as_value() {
        let outcome = worker(
            Behavior::Fail(TransportError::server("500 Internal Error")),
            Duration::from_secs(1),
        )
        .send(&chunk(), &|_, _| {})
        .await;

        match outcome.status {
            ChunkStatus::Failed(e) => {
                assert_eq!(e.kind, FailureKind::Server);
                assert_eq!(e.message, "500 Internal Error");
            }
            ChunkStatus::Success => panic!("expected failure"),
        }
        assert_eq!(outcome.bytes_total, None);
    }

    #[tokio::test]
    async fn failure_keeps_last_progress() {
        let outcome = worker(Behavior::PartialThenFail(10, 40), Duration::from_secs(1))
            .send(&chunk(), &|_, _| {})
            .await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.bytes_transferred, Some(10));
        assert_eq!(outcome.bytes_total, Some(40));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_transport_times_out() {
        let outcome = worker(Behavior::Hang, Duration::from_millis(250))
            .send(&chunk(), &|_, _| {})
            .await;
        match outcome.status {
            ChunkStatus::Failed(e) => assert_eq!(e.kind, FailureKind::Timeout),
            ChunkStatus::Success => panic!("expected timeout"),
        }
    }
}
