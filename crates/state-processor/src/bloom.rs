//! Asynchronous receipt bloom computation.
//!
//! Bloom filters are a pure function of a receipt's logs, so they can be computed while the next
//! transaction executes. The [`AsyncReceiptBloomGenerator`] hands every receipt to a small
//! worker pool and writes the results back at a single barrier,
//! [`AsyncReceiptBloomGenerator::close`].
//! Dropping the generator performs the same shutdown, so the pool is drained on every exit path
//! of a processing run.

use std::{
    num::NonZeroUsize,
    thread::{self, JoinHandle},
};

use alloy_primitives::{logs_bloom, Bloom, Log};
use crossbeam::channel::{self, Receiver, Sender};
use tracing::trace;

use crate::{
    constants::{LOG_TARGET, MAX_BLOOM_WORKERS, RECEIPTS_PER_BLOOM_WORKER},
    Receipt,
};

/// A post-processing step run on every receipt right after it is assembled.
pub trait ReceiptProcessor {
    /// Processes a freshly assembled receipt.
    fn apply(&mut self, receipt: &Receipt);
}

impl<F: FnMut(&Receipt)> ReceiptProcessor for F {
    fn apply(&mut self, receipt: &Receipt) {
        self(receipt)
    }
}

/// A receipt queued for bloom computation.
#[derive(Debug)]
struct BloomJob {
    /// Position of the receipt in the order it was handed to the generator.
    seq: usize,
    logs: Vec<Log>,
}

impl BloomJob {
    fn compute(&self) -> (usize, Bloom) {
        (self.seq, logs_bloom(&self.logs))
    }
}

/// Blooms computed by an [`AsyncReceiptBloomGenerator`], keyed by the position of their receipt
/// in submission order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReceiptBlooms(Vec<(usize, Bloom)>);

impl ReceiptBlooms {
    /// Number of computed blooms.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no bloom was computed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Writes every bloom into the receipt at its submission position.
    ///
    /// `receipts` must be the receipts in the order they were handed to the generator.
    pub fn apply_to(self, receipts: &mut [Receipt]) {
        for (seq, bloom) in self.0 {
            if let Some(receipt) = receipts.get_mut(seq) {
                receipt.logs_bloom = bloom;
            }
        }
    }
}

/// Computes receipt bloom filters on a background worker pool.
///
/// [`ReceiptProcessor::apply`] never blocks: the job queue is sized to the number of
/// transactions in the block. Receipts whose bloom is already set, or which carry no logs, are
/// skipped.
pub struct AsyncReceiptBloomGenerator {
    jobs: Option<Sender<BloomJob>>,
    results: Receiver<(usize, Bloom)>,
    /// Blooms computed on the calling thread when no worker is available.
    inline: Vec<(usize, Bloom)>,
    workers: Vec<JoinHandle<()>>,
    submitted: usize,
}

impl core::fmt::Debug for AsyncReceiptBloomGenerator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsyncReceiptBloomGenerator")
            .field("workers", &self.workers.len())
            .field("submitted", &self.submitted)
            .field("closed", &self.jobs.is_none())
            .finish_non_exhaustive()
    }
}

impl AsyncReceiptBloomGenerator {
    /// Creates a generator for a block with `tx_count` transactions.
    pub fn new(tx_count: usize) -> Self {
        let (jobs_tx, jobs_rx) = channel::bounded::<BloomJob>(tx_count.max(1));
        let (results_tx, results_rx) = channel::unbounded();

        let workers = (0..Self::worker_count(tx_count))
            .filter_map(|id| {
                let jobs = jobs_rx.clone();
                let results = results_tx.clone();
                thread::Builder::new()
                    .name(format!("receipt-bloom-{id}"))
                    .spawn(move || {
                        for job in jobs.iter() {
                            if results.send(job.compute()).is_err() {
                                break;
                            }
                        }
                    })
                    .ok()
            })
            .collect::<Vec<_>>();

        trace!(target: LOG_TARGET, tx_count, workers = workers.len(), "Started bloom workers");

        Self {
            jobs: (!workers.is_empty()).then_some(jobs_tx),
            results: results_rx,
            inline: Vec::new(),
            workers,
            submitted: 0,
        }
    }

    /// Number of workers spawned for a block with `tx_count` transactions.
    pub fn worker_count(tx_count: usize) -> usize {
        if tx_count == 0 {
            return 0;
        }
        let parallelism = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        tx_count.div_ceil(RECEIPTS_PER_BLOOM_WORKER).min(MAX_BLOOM_WORKERS).min(parallelism)
    }

    /// Number of receipts handed to the generator so far.
    pub const fn submitted(&self) -> usize {
        self.submitted
    }

    /// Blocks until every queued bloom has been computed, stops the workers, and returns the
    /// computed blooms.
    ///
    /// Calling `close` again returns an empty set.
    pub fn close(&mut self) -> ReceiptBlooms {
        self.jobs = None;
        for worker in self.workers.drain(..) {
            if let Err(panic) = worker.join() {
                std::panic::resume_unwind(panic);
            }
        }

        let mut blooms = core::mem::take(&mut self.inline);
        blooms.extend(self.results.try_iter());
        blooms.sort_unstable_by_key(|(seq, _)| *seq);
        ReceiptBlooms(blooms)
    }
}

impl ReceiptProcessor for AsyncReceiptBloomGenerator {
    fn apply(&mut self, receipt: &Receipt) {
        let seq = self.submitted;
        self.submitted += 1;
        if receipt.logs.is_empty() || receipt.logs_bloom != Bloom::ZERO {
            return;
        }

        let job = BloomJob { seq, logs: receipt.logs.clone() };
        let job = match &self.jobs {
            Some(jobs) => match jobs.try_send(job) {
                Ok(()) => return,
                Err(err) => err.into_inner(),
            },
            None => job,
        };
        self.inline.push(job.compute());
    }
}

impl Drop for AsyncReceiptBloomGenerator {
    fn drop(&mut self) {
        self.jobs = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
