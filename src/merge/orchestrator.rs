//! Submission workflow against the merge service
//!
//! At most one submission is in flight. Each submission records the queue
//! revision it was built from; when the response arrives it is applied only
//! if the queue is still at that revision and the submission was not
//! cancelled. Anything else is discarded and the status resolves to `Idle`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::transport::{MergeRequest, MergeTransport};
use crate::error::{CollaboratorError, PreconditionError};
use crate::queue::{QueueObserver, QueueSnapshot, QueueStore};
use crate::resource::{ResourceHost, ResourceLifecycleManager};

/// Minimum number of documents in a merge
pub const MIN_FILES: usize = 2;

/// Where the merge workflow currently stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrchestrationStatus {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed(String),
}

impl OrchestrationStatus {
    pub fn is_submitting(&self) -> bool {
        matches!(self, OrchestrationStatus::Submitting)
    }
}

struct InFlight {
    id: u64,
    revision: u64,
    cancel: oneshot::Sender<()>,
}

#[derive(Default)]
struct BoardState {
    status: OrchestrationStatus,
    in_flight: Option<InFlight>,
    next_submission: u64,
}

/// Status shared between the orchestrator and the queue's mutation hooks
#[derive(Default)]
pub struct StatusBoard {
    state: Mutex<BoardState>,
}

impl StatusBoard {
    pub fn status(&self) -> OrchestrationStatus {
        self.state.lock().status.clone()
    }

    fn abandon(&self, id: u64) {
        let mut state = self.state.lock();
        if state.in_flight.as_ref().is_some_and(|f| f.id == id) {
            state.in_flight = None;
            state.status = OrchestrationStatus::Idle;
            debug!(submission = id, "Merge request dropped before completion");
        }
    }
}

impl QueueObserver for StatusBoard {
    fn queue_changed(&self) {
        let mut state = self.state.lock();
        match state.status {
            OrchestrationStatus::Succeeded | OrchestrationStatus::Failed(_) => {
                state.status = OrchestrationStatus::Idle;
            }
            // An in-flight submission is checked against the queue revision
            // when it completes.
            OrchestrationStatus::Submitting | OrchestrationStatus::Idle => {}
        }
    }
}

struct Submission {
    id: u64,
    request: MergeRequest,
    cancelled: oneshot::Receiver<()>,
}

/// Resets the board if `submit` is dropped while waiting on the network
struct AbandonGuard<'a> {
    board: &'a StatusBoard,
    id: u64,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        self.board.abandon(self.id);
    }
}

/// Drives merge requests and publishes their results
pub struct MergeOrchestrator<T> {
    transport: T,
    board: Arc<StatusBoard>,
}

impl<T: MergeTransport> MergeOrchestrator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            board: Arc::new(StatusBoard::default()),
        }
    }

    /// Hook to register with the queue so results reset on mutation
    pub fn observer(&self) -> Arc<dyn QueueObserver> {
        Arc::clone(&self.board) as Arc<dyn QueueObserver>
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn status(&self) -> OrchestrationStatus {
        self.board.status()
    }

    /// Merge the queue's current contents
    ///
    /// Precondition failures are returned as errors without touching the
    /// status or sending anything. Otherwise the returned status is the one
    /// the submission resolved to: `Succeeded` (result published), `Failed`
    /// with the service's message, or `Idle` when the response was discarded
    /// because the queue changed or the submission was cancelled.
    pub async fn submit<H: ResourceHost>(
        &self,
        queue: &Mutex<QueueStore>,
        results: &ResourceLifecycleManager<H>,
    ) -> Result<OrchestrationStatus, PreconditionError> {
        let submission = {
            let queue = queue.lock();
            self.begin(&queue.snapshot())?
        };
        let _guard = AbandonGuard {
            board: &self.board,
            id: submission.id,
        };
        info!(
            submission = submission.id,
            files = submission.request.parts().len(),
            "Submitting merge request"
        );

        let outcome = tokio::select! {
            outcome = self.transport.merge(submission.request) => Some(outcome),
            _ = submission.cancelled => None,
        };

        let queue = queue.lock();
        Ok(self.finish(submission.id, outcome, queue.revision(), results))
    }

    /// Abandon the in-flight submission, if any
    ///
    /// The pending `submit` resolves to `Idle` and its request is dropped.
    pub fn cancel(&self) -> bool {
        let mut state = self.board.state.lock();
        match state.in_flight.take() {
            Some(in_flight) => {
                let _ = in_flight.cancel.send(());
                state.status = OrchestrationStatus::Idle;
                info!(submission = in_flight.id, "Cancelled merge request");
                true
            }
            None => false,
        }
    }

    fn begin(&self, snapshot: &QueueSnapshot) -> Result<Submission, PreconditionError> {
        let mut state = self.board.state.lock();
        if state.in_flight.is_some() {
            return Err(PreconditionError::AlreadyInProgress);
        }
        if snapshot.len() < MIN_FILES {
            return Err(PreconditionError::InsufficientFiles);
        }

        state.next_submission += 1;
        let id = state.next_submission;
        let (cancel, cancelled) = oneshot::channel();
        state.in_flight = Some(InFlight {
            id,
            revision: snapshot.revision(),
            cancel,
        });
        state.status = OrchestrationStatus::Submitting;

        Ok(Submission {
            id,
            request: MergeRequest::from_snapshot(snapshot),
            cancelled,
        })
    }

    fn finish<H: ResourceHost>(
        &self,
        id: u64,
        outcome: Option<Result<Vec<u8>, CollaboratorError>>,
        current_revision: u64,
        results: &ResourceLifecycleManager<H>,
    ) -> OrchestrationStatus {
        let mut state = self.board.state.lock();
        let in_flight = match state.in_flight.take() {
            Some(in_flight) if in_flight.id == id => in_flight,
            other => {
                state.in_flight = other;
                debug!(submission = id, "Discarding response for cancelled submission");
                return OrchestrationStatus::Idle;
            }
        };

        let status = match outcome {
            None => OrchestrationStatus::Idle,
            Some(_) if in_flight.revision != current_revision => {
                warn!(
                    submission = id,
                    "Queue changed while merging; discarding response"
                );
                OrchestrationStatus::Idle
            }
            Some(Err(e)) => {
                warn!(submission = id, error = %e, "Merge failed");
                OrchestrationStatus::Failed(e.to_string())
            }
            Some(Ok(merged)) => match results.publish(merged) {
                Ok(preview) => {
                    info!(submission = id, bytes = preview.len(), "Merge succeeded");
                    OrchestrationStatus::Succeeded
                }
                Err(e) => {
                    warn!(submission = id, error = %e, "Could not publish merged result");
                    OrchestrationStatus::Failed(e.to_string())
                }
            },
        };

        state.status = status.clone();
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::validate::{CandidateFile, Validator};

    struct Fixed(std::result::Result<Vec<u8>, CollaboratorError>);

    impl MergeTransport for Fixed {
        async fn merge(&self, _request: MergeRequest) -> std::result::Result<Vec<u8>, CollaboratorError> {
            self.0.clone()
        }
    }

    struct NullHost;

    impl ResourceHost for NullHost {
        type Handle = ();

        fn create(&self, _buffer: &[u8]) -> Result<()> {
            Ok(())
        }

        fn release(&self, _handle: ()) {}
    }

    fn queue_with(orchestrator: &MergeOrchestrator<Fixed>, n: usize) -> Mutex<QueueStore> {
        let mut store = QueueStore::new(Validator::default(), vec![orchestrator.observer()]);
        store.append(
            (0..n)
                .map(|i| CandidateFile::new(format!("{i}.pdf"), None, vec![i as u8]))
                .collect(),
        );
        Mutex::new(store)
    }

    #[tokio::test]
    async fn test_submit_publishes_on_success() {
        let orchestrator = MergeOrchestrator::new(Fixed(Ok(b"merged".to_vec())));
        let queue = queue_with(&orchestrator, 2);
        let results = ResourceLifecycleManager::new(NullHost);

        let status = orchestrator.submit(&queue, &results).await.unwrap();
        assert_eq!(status, OrchestrationStatus::Succeeded);
        assert_eq!(orchestrator.status(), OrchestrationStatus::Succeeded);
        assert_eq!(results.current().unwrap().bytes(), b"merged");
    }

    #[tokio::test]
    async fn test_submit_failure_leaves_results_alone() {
        let orchestrator =
            MergeOrchestrator::new(Fixed(Err(CollaboratorError::rejected(500, "boom"))));
        let queue = queue_with(&orchestrator, 3);
        let results = ResourceLifecycleManager::new(NullHost);

        let status = orchestrator.submit(&queue, &results).await.unwrap();
        assert_eq!(status, OrchestrationStatus::Failed("boom".to_string()));
        assert!(results.current().is_none());
    }

    #[tokio::test]
    async fn test_insufficient_files_keeps_status() {
        let orchestrator = MergeOrchestrator::new(Fixed(Ok(Vec::new())));
        let queue = queue_with(&orchestrator, 1);
        let results = ResourceLifecycleManager::new(NullHost);

        let result = orchestrator.submit(&queue, &results).await;
        assert_eq!(result, Err(PreconditionError::InsufficientFiles));
        assert_eq!(orchestrator.status(), OrchestrationStatus::Idle);
    }

    #[tokio::test]
    async fn test_queue_change_resets_finished_status() {
        let orchestrator = MergeOrchestrator::new(Fixed(Err(CollaboratorError::rejected(400, ""))));
        let queue = queue_with(&orchestrator, 2);
        let results = ResourceLifecycleManager::new(NullHost);

        let status = orchestrator.submit(&queue, &results).await.unwrap();
        assert_eq!(status, OrchestrationStatus::Failed("Merge failed with status 400".to_string()));

        queue.lock().clear();
        assert_eq!(orchestrator.status(), OrchestrationStatus::Idle);
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let orchestrator = MergeOrchestrator::new(Fixed(Ok(Vec::new())));
        let queue = queue_with(&orchestrator, 2);
        let results = ResourceLifecycleManager::new(NullHost);

        let submission = orchestrator.begin(&queue.lock().snapshot()).unwrap();
        assert!(orchestrator.status().is_submitting());
        assert_eq!(
            orchestrator.begin(&queue.lock().snapshot()).err(),
            Some(PreconditionError::AlreadyInProgress)
        );

        queue.lock().clear();
        assert!(orchestrator.status().is_submitting());

        let revision = queue.lock().revision();
        let status = orchestrator.finish(submission.id, Some(Ok(b"late".to_vec())), revision, &results);
        assert_eq!(status, OrchestrationStatus::Idle);
        assert!(results.current().is_none());
    }

    #[test]
    fn test_cancel_and_abandon() {
        let orchestrator = MergeOrchestrator::new(Fixed(Ok(Vec::new())));
        let queue = queue_with(&orchestrator, 2);

        assert!(!orchestrator.cancel());
        let submission = orchestrator.begin(&queue.lock().snapshot()).unwrap();
        assert!(orchestrator.cancel());
        assert_eq!(orchestrator.status(), OrchestrationStatus::Idle);

        let second = orchestrator.begin(&queue.lock().snapshot()).unwrap();
        assert_ne!(second.id, submission.id);
        orchestrator.board.abandon(submission.id);
        assert!(orchestrator.status().is_submitting());
        orchestrator.board.abandon(second.id);
        assert_eq!(orchestrator.status(), OrchestrationStatus::Idle);
    }
}
