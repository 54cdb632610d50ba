use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{self, AbortHandle, JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Bounded worker pool owned by a run.
///
/// At most `size` jobs execute at once across every [`TaskGroup`] created
/// from the same pool (or its clones). The pool is handed explicitly to each
/// phase; there is no process-wide executor state.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
    phase_timeout: Option<Duration>,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl WorkerPool {
    /// A pool running up to `size` jobs concurrently; 0 is treated as 1.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
            phase_timeout: None,
        }
    }

    /// Upper bound on how long [`TaskGroup::join`] waits before aborting stragglers.
    pub fn with_phase_timeout(mut self, phase_timeout: Option<Duration>) -> Self {
        self.phase_timeout = phase_timeout;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn phase_timeout(&self) -> Option<Duration> {
        self.phase_timeout
    }

    /// Start a new group of tasks scheduled on this pool.
    pub fn group<T: Send + 'static>(&self) -> TaskGroup<T> {
        TaskGroup {
            pool: self.clone(),
            tasks: JoinSet::new(),
            labels: Vec::new(),
            indices: HashMap::new(),
            abortable: Vec::new(),
            cancel: CancelFlag::default(),
        }
    }
}

/// Raised on a [`TaskGroup`] when its phase timeout expires.
///
/// Blocking jobs cannot be aborted from the outside, so long-running ones
/// should poll [`CancelFlag::is_cancelled`] and return early once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// How a single task ended
#[derive(Debug)]
pub enum TaskResult<T> {
    Completed(T),
    Panicked(String),
    /// Not finished when the phase timeout expired
    TimedOut,
}

/// Result of one task, tagged with the label it was spawned under
#[derive(Debug)]
pub struct TaskReport<T> {
    pub label: String,
    pub result: TaskResult<T>,
}

enum Slot<T> {
    Done(T),
    Failed(String),
    /// Never started because the group was cancelled while it waited for a permit
    Skipped,
}

/// A batch of tasks on a [`WorkerPool`]; [`TaskGroup::join`] is the barrier.
pub struct TaskGroup<T> {
    pool: WorkerPool,
    tasks: JoinSet<Slot<T>>,
    labels: Vec<String>,
    indices: HashMap<task::Id, usize>,
    /// Async tasks, which can be dropped mid-flight on timeout
    abortable: Vec<AbortHandle>,
    cancel: CancelFlag,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Flag set when this group's phase timeout expires.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run a blocking job on the blocking thread pool once a permit is free.
    ///
    /// The permit travels into the job, so it stays taken for as long as the
    /// job really runs, even past a phase timeout.
    pub fn spawn_blocking<F>(&mut self, label: impl Into<String>, job: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let permits = Arc::clone(&self.pool.permits);
        let cancel = self.cancel.clone();
        let handle = self.tasks.spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                return Slot::Failed("worker pool closed".to_string());
            };
            if cancel.is_cancelled() {
                return Slot::Skipped;
            }
            let running = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job()
            });
            match running.await {
                Ok(value) => Slot::Done(value),
                Err(e) => Slot::Failed(e.to_string()),
            }
        });
        self.track(label, handle.id());
    }

    /// Run an async job once a permit is free. On timeout the job is dropped.
    pub fn spawn<Fut>(&mut self, label: impl Into<String>, job: Fut)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.pool.permits);
        let handle = self.tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return Slot::Failed("worker pool closed".to_string());
            };
            Slot::Done(job.await)
        });
        self.track(label, handle.id());
        self.abortable.push(handle);
    }

    /// Wait for every task in the group.
    ///
    /// Reports come back in spawn order. If the pool has a phase timeout and
    /// it expires, the cancel flag is raised, async tasks are aborted, and
    /// the join keeps waiting until every blocking job has returned; anything
    /// that finishes after the deadline is reported as [`TaskResult::TimedOut`].
    /// Once this returns no job of the group is still running.
    pub async fn join(mut self) -> Vec<TaskReport<T>> {
        let mut results: Vec<Option<TaskResult<T>>> = self.labels.iter().map(|_| None).collect();
        let deadline = self.pool.phase_timeout.map(|timeout| Instant::now() + timeout);
        let mut timed_out = false;

        loop {
            let next = match deadline {
                Some(deadline) if !timed_out => {
                    match tokio::time::timeout_at(deadline, self.tasks.join_next_with_id()).await {
                        Ok(next) => next,
                        Err(_) => {
                            warn!(
                                "Phase timeout expired with {} tasks outstanding, cancelling them",
                                self.tasks.len()
                            );
                            timed_out = true;
                            self.cancel.cancel();
                            for handle in &self.abortable {
                                handle.abort();
                            }
                            continue;
                        }
                    }
                }
                _ => self.tasks.join_next_with_id().await,
            };
            match next {
                Some(joined) => self.store(&mut results, joined, timed_out),
                None => break,
            }
        }

        debug!("Task group of {} joined", self.labels.len());
        self.labels
            .into_iter()
            .zip(results)
            .map(|(label, result)| {
                let result = result.unwrap_or_else(|| {
                    if timed_out {
                        TaskResult::TimedOut
                    } else {
                        TaskResult::Panicked("task ended without reporting".to_string())
                    }
                });
                TaskReport { label, result }
            })
            .collect()
    }

    fn track(&mut self, label: impl Into<String>, id: task::Id) {
        self.labels.push(label.into());
        self.indices.insert(id, self.labels.len() - 1);
    }

    fn store(
        &self,
        results: &mut [Option<TaskResult<T>>],
        joined: Result<(task::Id, Slot<T>), JoinError>,
        late: bool,
    ) {
        let (id, result) = match joined {
            Ok((id, Slot::Done(_))) if late => (id, TaskResult::TimedOut),
            Ok((id, Slot::Done(value))) => (id, TaskResult::Completed(value)),
            Ok((id, Slot::Failed(reason))) => (id, TaskResult::Panicked(reason)),
            Ok((id, Slot::Skipped)) => (id, TaskResult::TimedOut),
            Err(e) if e.is_cancelled() => (e.id(), TaskResult::TimedOut),
            Err(e) => (e.id(), TaskResult::Panicked(e.to_string())),
        };
        match self.indices.get(&id) {
            Some(&index) => results[index] = Some(result),
            None => warn!("Joined a task this group did not spawn"),
        }
    }
}
