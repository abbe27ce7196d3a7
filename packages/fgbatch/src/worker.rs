//! Worker pool for parallel outer-batch loading.
//!
//! A dispatcher (the `PoolRun` iterator, on the caller's thread) hands outer
//! batches to stateless worker threads over a crossbeam channel. Each job
//! carries the reply channel of its run, so results from an abandoned run
//! never leak into the next one. Results are buffered and yielded in
//! dispatch order.
//!
//! With zero workers every outer batch is loaded inline on the caller's
//! thread.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::vec;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::assemble::AssembledBatch;
use crate::error::{LoaderError, Result};
use crate::loader::BatchLoader;

type Reply = (usize, Result<Vec<AssembledBatch>>);

struct Job {
    seq: usize,
    indices: Vec<usize>,
    reply: Sender<Reply>,
}

pub struct WorkerPool {
    loader: Arc<BatchLoader>,
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(loader: Arc<BatchLoader>, worker_count: usize) -> Result<Self> {
        let (jobs_tx, jobs_rx) = unbounded::<Job>();

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let jobs_rx = jobs_rx.clone();
            let loader = Arc::clone(&loader);
            let handle = thread::Builder::new()
                .name(format!("fgbatch-worker-{id}"))
                .spawn(move || worker_loop(id, &loader, jobs_rx))?;
            workers.push(handle);
        }

        Ok(Self {
            loader,
            jobs: (worker_count > 0).then_some(jobs_tx),
            workers,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn loader(&self) -> &Arc<BatchLoader> {
        &self.loader
    }

    /// Load `outer_batches` and yield one result per outer batch, in order.
    /// At most `2 * worker_count` outer batches are in flight at a time.
    /// Dropping the iterator stops dispatch.
    pub fn run(&self, outer_batches: Vec<Vec<usize>>) -> PoolRun<'_> {
        let (reply_tx, reply_rx) = unbounded();
        PoolRun {
            pool: self,
            pending: outer_batches.into_iter().enumerate(),
            reply_tx: Some(reply_tx),
            reply_rx,
            ready: BTreeMap::new(),
            next_seq: 0,
            in_flight: 0,
            max_in_flight: (self.workers.len() * 2).max(1),
            failed: false,
        }
    }

    /// Load every outer batch of `epoch` as produced by the loader's sampler.
    pub fn run_epoch(&self, epoch: u64) -> PoolRun<'_> {
        self.run(self.loader.epoch(epoch))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the job channel ends every worker loop.
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("worker thread exited abnormally");
            }
        }
    }
}

fn worker_loop(id: usize, loader: &BatchLoader, jobs: Receiver<Job>) {
    tracing::debug!(worker = id, "worker started");
    for job in jobs.iter() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| loader.load(&job.indices)))
            .unwrap_or_else(|_| {
                tracing::warn!(worker = id, seq = job.seq, "worker panicked while loading outer batch");
                Err(LoaderError::WorkerPanicked(job.seq))
            });
        // A dropped run no longer wants its results.
        let _ = job.reply.send((job.seq, result));
    }
    tracing::debug!(worker = id, "worker stopped");
}

/// In-order iterator over the results of one `WorkerPool::run`.
pub struct PoolRun<'a> {
    pool: &'a WorkerPool,
    pending: std::iter::Enumerate<vec::IntoIter<Vec<usize>>>,
    /// Dropped once every job is dispatched, so the reply channel
    /// disconnects if the workers holding the remaining jobs go away.
    reply_tx: Option<Sender<Reply>>,
    reply_rx: Receiver<Reply>,
    ready: BTreeMap<usize, Result<Vec<AssembledBatch>>>,
    next_seq: usize,
    in_flight: usize,
    max_in_flight: usize,
    failed: bool,
}

impl PoolRun<'_> {
    /// Fill the pipeline up to `max_in_flight` jobs.
    fn dispatch(&mut self, jobs: &Sender<Job>) -> Result<()> {
        while self.in_flight < self.max_in_flight {
            let Some(reply) = self.reply_tx.as_ref() else {
                break;
            };
            let Some((seq, indices)) = self.pending.next() else {
                self.reply_tx = None;
                break;
            };
            let job = Job {
                seq,
                indices,
                reply: reply.clone(),
            };
            jobs.send(job).map_err(|_| LoaderError::WorkerDisconnected)?;
            self.in_flight += 1;
        }
        Ok(())
    }
}

impl Iterator for PoolRun<'_> {
    type Item = Result<Vec<AssembledBatch>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let Some(jobs) = self.pool.jobs.clone() else {
            let (_, indices) = self.pending.next()?;
            self.next_seq += 1;
            return Some(self.pool.loader.load(&indices));
        };

        loop {
            if let Some(result) = self.ready.remove(&self.next_seq) {
                self.next_seq += 1;
                return Some(result);
            }

            if let Err(e) = self.dispatch(&jobs) {
                self.failed = true;
                return Some(Err(e));
            }
            if self.in_flight == 0 {
                return None;
            }

            match self.reply_rx.recv() {
                Ok((seq, result)) => {
                    self.in_flight -= 1;
                    self.ready.insert(seq, result);
                }
                Err(_) => {
                    self.failed = true;
                    return Some(Err(LoaderError::WorkerDisconnected));
                }
            }
        }
    }
}
