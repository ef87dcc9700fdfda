// Accelerator session: the host-side protocol for one batch-compute
// backend.
//
// The session owns the transfer buffers a batch moves through, keyed by
// opaque handles, and drives a batch as: program a descriptor (handles +
// counts), submit to the backend, block on the completion channel, copy
// scores back. Transfer memory comes from a process-wide budgeted pool;
// every buffer a caller forgets to release is forcibly released at
// close/drop and reported, never silently dropped, because pool memory
// outlives any one session.

use crate::codec::{decode_transfer, PackedSequence};
use crate::error::{Error, Result};
use crate::panel::MAX_PANEL_SIZE;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default completion-wait bound for a batch
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default transfer pool budget
pub const DEFAULT_POOL_CAPACITY: usize = 64 << 20;

/// Opaque handle to a transfer buffer allocated through a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process-wide transfer memory budget, shared by every session that
/// allocates against it.
pub struct TransferPool {
    capacity: usize,
    used: AtomicUsize,
}

impl TransferPool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            used: AtomicUsize::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bytes_in_use(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    fn reserve(&self, bytes: usize) -> Result<()> {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let available = self.capacity - current;
            if bytes > available {
                return Err(Error::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
            match self.used.compare_exchange_weak(
                current,
                current + bytes,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(seen) => current = seen,
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

struct TransferBuffer {
    bytes: Vec<u8>,
}

/// One batch of typed work, as handed to a backend
pub struct BatchRequest {
    pub queries: Vec<PackedSequence>,
    pub panel: Vec<PackedSequence>,
}

/// What a backend sends back when a batch finishes
pub struct BatchCompletion {
    pub comparisons: u32,
    pub scores: Vec<i8>,
}

/// The compute boundary: submit a workload, then block on the returned
/// channel. The completion send is the backend's "interrupt".
pub trait ComputeBackend: Send {
    /// Whether the backend can be acquired right now
    fn is_available(&self) -> bool {
        true
    }

    /// Start a batch; the receiver yields exactly one completion
    fn submit(&mut self, request: BatchRequest) -> Receiver<BatchCompletion>;
}

/// The register file of one batch: five buffer handles plus the two counts.
#[derive(Debug, Clone, Copy)]
pub struct BatchDescriptor {
    pub query_seqs: BufferHandle,
    pub query_lengths: BufferHandle,
    pub query_count: u32,
    pub panel_seqs: BufferHandle,
    pub panel_lengths: BufferHandle,
    pub panel_count: u32,
    pub scores: BufferHandle,
}

pub struct AcceleratorSession {
    backend: Option<Box<dyn ComputeBackend>>,
    pool: Arc<TransferPool>,
    buffers: HashMap<BufferHandle, TransferBuffer>,
    next_handle: u64,
    in_flight: bool,
    timeout: Duration,
}

impl AcceleratorSession {
    /// A new session starts closed; `open` attaches the backend.
    pub fn new(pool: Arc<TransferPool>, timeout: Duration) -> Self {
        Self {
            backend: None,
            pool,
            buffers: HashMap::new(),
            next_handle: 1,
            in_flight: false,
            timeout,
        }
    }

    /// Attach a compute backend, taking exclusive use of it for this
    /// session's lifetime.
    pub fn open(&mut self, backend: Box<dyn ComputeBackend>) -> Result<()> {
        if self.backend.is_some() {
            return Err(Error::AlreadyOpen);
        }
        if !backend.is_available() {
            return Err(Error::BackendUnavailable);
        }
        log::debug!("[session] backend attached");
        self.backend = Some(backend);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// Idle means no batch is between submit and completion
    pub fn is_idle(&self) -> bool {
        !self.in_flight
    }

    /// Allocate a transfer buffer against the pool budget.
    pub fn allocate_buffer(&mut self, size: usize) -> Result<BufferHandle> {
        self.pool.reserve(size)?;
        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;
        let buffer = TransferBuffer {
            bytes: vec![0u8; size],
        };
        log::debug!(
            "[session] allocated buffer {handle}: {size} bytes at {:#x}",
            buffer.bytes.as_ptr() as usize
        );
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    /// Release a buffer. Idempotent: releasing a handle this session does
    /// not hold is a no-op, flagged as a caller error in diagnostic builds.
    pub fn release_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        match self.buffers.remove(&handle) {
            Some(buffer) => {
                log::debug!(
                    "[session] released buffer {handle} ({} bytes)",
                    buffer.bytes.len()
                );
                self.pool.release(buffer.bytes.len());
            }
            None => {
                if cfg!(debug_assertions) {
                    log::warn!("[session] release of untracked buffer {handle} (double release?)");
                }
            }
        }
        Ok(())
    }

    /// Read access to a buffer's contents
    pub fn buffer(&self, handle: BufferHandle) -> Result<&[u8]> {
        self.buffers
            .get(&handle)
            .map(|b| b.bytes.as_slice())
            .ok_or(Error::UnknownBuffer { handle })
    }

    /// Write access to a buffer's contents
    pub fn buffer_mut(&mut self, handle: BufferHandle) -> Result<&mut [u8]> {
        self.buffers
            .get_mut(&handle)
            .map(|b| b.bytes.as_mut_slice())
            .ok_or(Error::UnknownBuffer { handle })
    }

    fn checked_slice(&self, handle: BufferHandle, needed: usize) -> Result<&[u8]> {
        let bytes = self.buffer(handle)?;
        if bytes.len() < needed {
            return Err(Error::BufferTooSmall {
                handle,
                needed,
                actual: bytes.len(),
            });
        }
        Ok(&bytes[..needed])
    }

    /// Run one batch to completion.
    ///
    /// Validates the descriptor against this session's buffers, hands the
    /// decoded workload to the backend, blocks until the completion signal
    /// (bounded by the session timeout), then copies the scores into the
    /// score buffer. Returns the number of comparisons performed, which
    /// equals `query_count * panel_count`.
    ///
    /// On `BackendTimeout` the session is back in the idle state before the
    /// error returns, so it can be reused.
    pub fn run_batch(&mut self, desc: &BatchDescriptor) -> Result<u32> {
        if self.backend.is_none() {
            return Err(Error::DeviceNotOpen);
        }

        let query_count = desc.query_count as usize;
        let panel_count = desc.panel_count as usize;
        if panel_count > MAX_PANEL_SIZE {
            return Err(Error::PanelTooLarge { count: panel_count });
        }

        // Resolve and decode the input buffers. Wire lengths over capacity
        // fail here, before anything reaches the engine.
        let queries = decode_transfer(
            self.checked_slice(desc.query_seqs, query_count * 8)?,
            self.checked_slice(desc.query_lengths, query_count)?,
            query_count,
        )?;
        let panel = decode_transfer(
            self.checked_slice(desc.panel_seqs, panel_count * 8)?,
            self.checked_slice(desc.panel_lengths, panel_count)?,
            panel_count,
        )?;

        let needed = query_count * panel_count;
        self.checked_slice(desc.scores, needed)?;

        let backend = self.backend.as_mut().ok_or(Error::DeviceNotOpen)?;
        log::debug!(
            "[session] submitting batch: {query_count} queries x {panel_count} panel entries"
        );
        self.in_flight = true;
        let done = backend.submit(BatchRequest { queries, panel });

        let completion = match done.recv_timeout(self.timeout) {
            Ok(completion) => completion,
            Err(RecvTimeoutError::Timeout) => {
                self.in_flight = false;
                log::warn!(
                    "[session] batch did not complete within {:?}; session returned to idle",
                    self.timeout
                );
                return Err(Error::BackendTimeout {
                    waited: self.timeout,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.in_flight = false;
                log::error!("[session] backend terminated without completing the batch");
                return Err(Error::BackendUnavailable);
            }
        };
        self.in_flight = false;

        let expected = (query_count * panel_count) as u32;
        if completion.comparisons != expected || completion.scores.len() != needed {
            log::error!(
                "[session] malformed completion: {} comparisons, {} scores (expected {})",
                completion.comparisons,
                completion.scores.len(),
                expected
            );
            return Err(Error::BackendUnavailable);
        }

        let score_buffer = self.buffer_mut(desc.scores)?;
        for (dst, &src) in score_buffer.iter_mut().zip(completion.scores.iter()) {
            *dst = src as u8;
        }

        Ok(completion.comparisons)
    }

    /// Close the session, forcibly releasing any buffer the caller leaked.
    /// Returns how many buffers had to be remediated. Leaked transfer
    /// memory degrades the pool for every later session, so each one is
    /// reported, never silently reclaimed.
    pub fn close(&mut self) -> usize {
        let leaked = self.buffers.len();
        if leaked > 0 {
            log::warn!(
                "[session] resource leak detected: {leaked} transfer buffer(s) still allocated at close; auto-remediating"
            );
        }
        for (handle, buffer) in self.buffers.drain() {
            log::warn!(
                "[session] force-releasing leaked buffer {handle} ({} bytes)",
                buffer.bytes.len()
            );
            self.pool.release(buffer.bytes.len());
        }
        if self.backend.take().is_some() {
            log::debug!("[session] backend detached");
        }
        self.in_flight = false;
        leaked
    }
}

impl Drop for AcceleratorSession {
    fn drop(&mut self) {
        self.close();
    }
}
