// Lane pipeline: work distribution, parallel scoring, ordered reassembly.
//
// Three stages connected by bounded channels, one pair per lane:
//
//   reader -> [work queue] -> lane worker -> [score queue] -> writer
//
// The reader deals query i to lane i % L. Each lane scores its queries
// against the whole panel (its replica) in panel order. The writer drains
// the score queues in the same round-robin order the reader used, so the
// output matrix is in submission order no matter which lane finishes first.
// Bounded queues give backpressure in both directions: a lane that outruns
// the writer blocks on its score queue instead of dropping results.

use crate::alignment::{local_score, Score};
use crate::codec::PackedSequence;
use crate::panel::ReferenceCache;
use crate::session::{BatchCompletion, BatchRequest, ComputeBackend};
use crossbeam_channel::{bounded, Receiver};
use std::thread;

/// Lane and queue configuration.
///
/// The defaults are sized for the expected workload shape: the input queue
/// only has to absorb scheduling jitter, while the output queue has to
/// absorb a full panel's worth of scores per query between writer visits.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of parallel scoring lanes
    pub lanes: usize,
    /// Per-lane work queue depth
    pub input_queue_depth: usize,
    /// Per-lane score queue depth
    pub output_queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lanes: 20,
            input_queue_depth: 512,
            output_queue_depth: 4000,
        }
    }
}

impl PipelineConfig {
    /// Misconfiguration is a programmer error, caught before any thread
    /// starts.
    fn validate(&self) {
        assert!(self.lanes >= 1, "pipeline needs at least one lane");
        assert!(
            self.input_queue_depth >= 1 && self.output_queue_depth >= 1,
            "pipeline queues need a nonzero depth"
        );
    }
}

/// Score every query against every panel entry, in query-major panel-order
/// layout. Correct for any lane count >= 1 and any query count, including
/// uneven splits.
pub fn score_batch(
    queries: &[PackedSequence],
    cache: &ReferenceCache,
    config: &PipelineConfig,
) -> Vec<Score> {
    config.validate();

    let lanes = config.lanes;
    let panel_len = cache.panel_len();
    let mut scores = vec![0 as Score; queries.len() * panel_len];

    thread::scope(|scope| {
        let mut work_txs = Vec::with_capacity(lanes);
        let mut work_rxs = Vec::with_capacity(lanes);
        let mut score_txs = Vec::with_capacity(lanes);
        let mut score_rxs = Vec::with_capacity(lanes);
        for _ in 0..lanes {
            let (tx, rx) = bounded::<PackedSequence>(config.input_queue_depth);
            work_txs.push(tx);
            work_rxs.push(rx);
            let (tx, rx) = bounded::<Score>(config.output_queue_depth);
            score_txs.push(tx);
            score_rxs.push(rx);
        }

        // Reader: deal queries round-robin. Dropping the senders at the end
        // is what tells every lane its stream is done.
        scope.spawn(move || {
            for (i, query) in queries.iter().enumerate() {
                if work_txs[i % lanes].send(*query).is_err() {
                    log::error!("[reader] lane {} hung up, aborting distribution", i % lanes);
                    break;
                }
            }
        });

        // Lane workers: sequential wavefront kernel per lane, one replica
        // shared by each adjacent lane pair.
        for (lane, (work_rx, score_tx)) in
            work_rxs.into_iter().zip(score_txs.into_iter()).enumerate()
        {
            let replica = cache.replica_for_lane(lane);
            scope.spawn(move || {
                for query in work_rx.iter() {
                    for reference in replica.iter() {
                        if score_tx.send(local_score(&query, reference)).is_err() {
                            log::error!("[lane {lane}] writer hung up, dropping remaining work");
                            return;
                        }
                    }
                }
            });
        }

        // Writer: same round-robin order as the reader, a full panel row at
        // a time. This pairing is the ordering contract of the pipeline.
        let mut out = 0usize;
        'drain: for i in 0..queries.len() {
            let score_rx = &score_rxs[i % lanes];
            for _ in 0..panel_len {
                match score_rx.recv() {
                    Ok(score) => {
                        scores[out] = score;
                        out += 1;
                    }
                    Err(_) => {
                        log::error!("[writer] lane {} closed before its row finished", i % lanes);
                        break 'drain;
                    }
                }
            }
        }
    });

    scores
}

/// The in-process compute backend: the lane pipeline behind the accelerator
/// session boundary. One submission maps to one batch; the reference cache
/// is rebuilt per batch from the submitted panel, mirroring a device that
/// reloads its specimen cache on every run.
pub struct PipelineBackend {
    config: PipelineConfig,
}

impl PipelineBackend {
    pub fn new(config: PipelineConfig) -> Self {
        config.validate();
        Self { config }
    }
}

impl ComputeBackend for PipelineBackend {
    fn submit(&mut self, request: BatchRequest) -> Receiver<BatchCompletion> {
        let (done_tx, done_rx) = bounded::<BatchCompletion>(1);
        let config = self.config.clone();

        // The batch runs on its own thread; completion is signalled over
        // the channel, which is what the session blocks on.
        thread::spawn(move || {
            let cache = match ReferenceCache::load(&request.panel, config.lanes) {
                Ok(cache) => cache,
                Err(e) => {
                    // The session validates the panel before submitting, so
                    // this path means a broken caller; dropping done_tx
                    // surfaces it as a dead backend.
                    log::error!("[backend] rejected panel: {e}");
                    return;
                }
            };
            let scores = score_batch(&request.queries, &cache, &config);
            let comparisons = (request.queries.len() * cache.panel_len()) as u32;
            if done_tx
                .send(BatchCompletion {
                    comparisons,
                    scores,
                })
                .is_err()
            {
                log::warn!("[backend] completion receiver dropped (session timed out?)");
            }
        });

        done_rx
    }
}
