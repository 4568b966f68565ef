use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, trace};
use rayon::prelude::*;
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crate::error::{ClusterError, Result};

////////////
// Consts //
////////////

/// Minimum number of items before `parallel_for` / `parallel_map` fan out
pub const DEFAULT_PARALLEL_TRIGGER: usize = 256;

/// Id of a job submitted to the [`ThreadPool`]
pub type TaskId = usize;

type Job = Box<dyn FnOnce() + Send + 'static>;
type Outcome = (TaskId, std::result::Result<(), String>);

/////////////
// Helpers //
/////////////

/// Run a job, turning a panic into its message
fn run_job(job: Job) -> std::result::Result<(), String> {
    panic::catch_unwind(AssertUnwindSafe(job)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Worker loop: run jobs until the job channel is closed and drained
fn run_worker(jobs: Receiver<(TaskId, Job)>, done: Sender<Outcome>) {
    while let Ok((id, job)) = jobs.recv() {
        trace!("Worker {:?} running task {}", thread::current().id(), id);
        if done.send((id, run_job(job))).is_err() {
            break;
        }
    }
}

/////////////////
// Thread pool //
/////////////////

/// Fixed-size pool of worker threads
///
/// Jobs are independent no-argument closures. Completed job ids are handed
/// back in completion order, which may differ from submission order. A pool
/// of size 0 runs every job inline on the submitting thread.
///
/// Results are expected to be written by each job into its own slot (one
/// output slot per job), so the pool itself never locks result buffers.
/// `pop_completed` is meant to be driven by a single consumer.
///
/// ### Fields
///
/// * `workers` - Handles of the worker threads
/// * `job_sender` - Pending-job queue, `None` for the inline pool
/// * `done_sender` - Completion queue (sender side, used for inline jobs)
/// * `done_receiver` - Completion queue
/// * `next_id` - Next task id to hand out
/// * `in_flight` - Submitted jobs that have not been popped yet
#[derive(Debug)]
pub struct ThreadPool {
    workers: Vec<JoinHandle<()>>,
    job_sender: Option<Sender<(TaskId, Job)>>,
    done_sender: Sender<Outcome>,
    done_receiver: Receiver<Outcome>,
    next_id: AtomicUsize,
    in_flight: AtomicUsize,
}

impl Default for ThreadPool {
    /// Pool with `available_parallelism - 1` workers (0 on single-core
    /// machines, meaning inline execution)
    fn default() -> Self {
        let cores = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(cores.saturating_sub(1))
    }
}

impl ThreadPool {
    /// Generate a new pool
    ///
    /// ### Params
    ///
    /// * `size` - Number of worker threads; 0 runs jobs inline
    ///
    /// ### Returns
    ///
    /// The pool, with all workers started
    pub fn new(size: usize) -> Self {
        let (done_sender, done_receiver) = unbounded();

        let (job_sender, workers) = if size == 0 {
            (None, Vec::new())
        } else {
            let (job_sender, job_receiver) = unbounded::<(TaskId, Job)>();
            let workers = (0..size)
                .map(|_| {
                    let jobs = job_receiver.clone();
                    let done = done_sender.clone();
                    thread::spawn(move || run_worker(jobs, done))
                })
                .collect();
            (Some(job_sender), workers)
        };

        debug!("Started thread pool with {} workers", size);

        Self {
            workers,
            job_sender,
            done_sender,
            done_receiver,
            next_id: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Submit a job
    ///
    /// An idle worker picks the job up immediately, otherwise it waits in the
    /// pending queue. With zero workers the job runs before this returns.
    ///
    /// ### Params
    ///
    /// * `job` - The closure to run
    ///
    /// ### Returns
    ///
    /// Unique id of the job
    pub fn submit<F>(&self, job: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let job: Job = Box::new(job);
        let job = match &self.job_sender {
            Some(sender) => match sender.send((id, job)) {
                Ok(()) => return id,
                Err(err) => err.into_inner().1,
            },
            None => job,
        };

        // the receiver lives in `self`, so this send cannot fail
        let _ = self.done_sender.send((id, run_job(job)));
        id
    }

    /// Retrieve the next completed job
    ///
    /// Blocks while jobs are pending or running.
    ///
    /// ### Returns
    ///
    /// * `Ok(Some(id))` - a job finished
    /// * `Ok(None)` - nothing is pending or running
    /// * `Err(TaskPanicked)` - the retrieved job panicked
    pub fn pop_completed(&self) -> Result<Option<TaskId>> {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            return Ok(None);
        }

        let Ok((id, outcome)) = self.done_receiver.recv() else {
            return Ok(None);
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok(()) => Ok(Some(id)),
            Err(message) => Err(ClusterError::TaskPanicked { id, message }),
        }
    }

    /// Fork-join barrier: pop until no job is pending or running
    ///
    /// ### Returns
    ///
    /// Ids in completion order. The first failing job aborts the wait with
    /// its error; jobs still running stay retrievable.
    pub fn wait_all(&self) -> Result<Vec<TaskId>> {
        let mut completed = Vec::new();
        while let Some(id) = self.pop_completed()? {
            completed.push(id);
        }
        Ok(completed)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // closing the job queue lets workers drain it and exit
        self.job_sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

//////////////////
// Parallel for //
//////////////////

/// Run `f` for every index of `range`
///
/// Fans out over the rayon pool when the range holds at least `trigger`
/// items, otherwise runs sequentially on the calling thread.
///
/// ### Params
///
/// * `range` - Index range
/// * `trigger` - Minimum range length for parallel execution
/// * `f` - Work per index; must only touch state owned by that index
pub fn parallel_for<F>(range: Range<usize>, trigger: usize, f: F)
where
    F: Fn(usize) + Send + Sync,
{
    if range.len() < trigger.max(1) || rayon::current_num_threads() <= 1 {
        range.for_each(f);
    } else {
        range.into_par_iter().for_each(f);
    }
}

/// Map every index of `range` to a value
///
/// Same scheduling as [`parallel_for`]; the output keeps index order.
///
/// ### Returns
///
/// One result per index
pub fn parallel_map<R, F>(range: Range<usize>, trigger: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> R + Send + Sync,
{
    if range.len() < trigger.max(1) || rayon::current_num_threads() <= 1 {
        range.map(f).collect()
    } else {
        range.into_par_iter().map(f).collect()
    }
}

///////////
// Tests //
///////////
