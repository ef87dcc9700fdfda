pub mod alignment; // Wavefront local-alignment scoring kernel
pub mod codec; // 2-bit packed sequences and transfer marshalling
pub mod error;
pub mod panel; // Reference panel cache with per-lane replicas
pub mod pipeline; // Lane pipeline: distribution, scoring, reassembly
pub mod score_output;
pub mod seq_reader; // Sequence-line files (plain or gzipped)
pub mod session; // Accelerator session: buffers, descriptors, completion wait

pub use error::{Error, Result};
