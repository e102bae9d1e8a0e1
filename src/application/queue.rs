//! Single-flight request queue
//!
//! Producers append jobs from any task; one worker task drains them in FIFO
//! order, running each through the [`RetryOrchestrator`] to completion before
//! starting the next. The worker is spawned on the first enqueue into an idle
//! queue and exits as soon as the queue is empty.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::domain::config::DEFAULT_PACING_MS;
use crate::domain::retry::TerminalError;
use crate::domain::transcription::{AudioData, Job, JobId};

use super::orchestrator::RetryOrchestrator;
use super::ports::Transcriber;

/// Why a job handle resolved without text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error(transparent)]
    Failed(#[from] TerminalError),

    #[error("Transcription failed: the worker aborted while processing this job")]
    Aborted,

    #[error("Transcription failed: the queue stopped before this job completed")]
    Dropped,
}

type JobResult = Result<String, JobError>;

/// Awaitable completion of one enqueued job.
///
/// Dropping the handle does not cancel the job; its result is discarded.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    rx: oneshot::Receiver<JobResult>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }
}

impl Future for JobHandle {
    type Output = JobResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(JobError::Dropped)))
    }
}

struct QueuedJob {
    job: Job,
    reply: oneshot::Sender<JobResult>,
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<QueuedJob>,
    worker_active: bool,
}

struct Shared<T: Transcriber> {
    state: Mutex<QueueState>,
    orchestrator: RetryOrchestrator<T>,
    pacing: Duration,
}

impl<T: Transcriber> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Lock is held only for push/pop, never across an await
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// FIFO queue that serializes all upstream calls through one worker
pub struct RequestQueue<T: Transcriber + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Transcriber + 'static> Clone for RequestQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transcriber + 'static> RequestQueue<T> {
    /// Create a queue with the default pacing interval
    pub fn new(orchestrator: RetryOrchestrator<T>) -> Self {
        Self::with_pacing(orchestrator, Duration::from_millis(DEFAULT_PACING_MS))
    }

    /// Create a queue that waits `pacing` between consecutive jobs
    pub fn with_pacing(orchestrator: RetryOrchestrator<T>, pacing: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                orchestrator,
                pacing,
            }),
        }
    }

    /// Append a job and return a handle that resolves when it completes.
    ///
    /// Never blocks. Must be called from within a Tokio runtime, since the
    /// first enqueue into an idle queue spawns the worker task.
    pub fn enqueue(&self, payload: impl Into<AudioData>) -> JobHandle {
        let job = Job::new(payload);
        let id = job.id();
        let (reply, rx) = oneshot::channel();

        let (spawn_worker, depth) = {
            let mut state = self.shared.lock();
            state.jobs.push_back(QueuedJob { job, reply });
            let spawn_worker = !state.worker_active;
            state.worker_active = true;
            (spawn_worker, state.jobs.len())
        };

        debug!(job_id = %id, depth, "Job enqueued");

        if spawn_worker {
            info!("Queue worker started");
            tokio::spawn(run_worker(Arc::clone(&self.shared)));
        }

        JobHandle { id, rx }
    }

    /// Jobs waiting to start (excludes the one in flight)
    pub fn len(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a worker task is currently draining the queue
    pub fn is_worker_active(&self) -> bool {
        self.shared.lock().worker_active
    }

    pub fn pacing(&self) -> Duration {
        self.shared.pacing
    }
}

async fn run_worker<T: Transcriber + 'static>(shared: Arc<Shared<T>>) {
    loop {
        let next = {
            let mut state = shared.lock();
            match state.jobs.pop_front() {
                Some(next) => next,
                None => {
                    state.worker_active = false;
                    debug!("Queue drained, worker idle");
                    return;
                }
            }
        };

        let QueuedJob { job, reply } = next;
        let id = job.id();
        let created_at = job.created_at();
        let waited = job.age();

        let result = process(Arc::clone(&shared), job).await;

        info!(
            job_id = %id,
            ok = result.is_ok(),
            waited_ms = waited.as_millis() as u64,
            total_ms = created_at.elapsed().as_millis() as u64,
            "Job completed"
        );

        if reply.send(result).is_err() {
            debug!(job_id = %id, "Job handle dropped, result discarded");
        }

        let more = !shared.lock().jobs.is_empty();
        if more {
            tokio::time::sleep(shared.pacing).await;
        }
    }
}

/// Run one job on its own task so a panic fails only that job
async fn process<T: Transcriber + 'static>(shared: Arc<Shared<T>>, job: Job) -> JobResult {
    let id = job.id();
    let task = tokio::spawn(async move { shared.orchestrator.run(&job).await });

    match task.await {
        Ok(outcome) => outcome.map_err(JobError::from),
        Err(join_error) => {
            error!(job_id = %id, error = %join_error, "Job processing aborted");
            Err(JobError::Aborted)
        }
    }
}
