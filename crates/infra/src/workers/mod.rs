//! Background workers.

pub mod index_sweep;

pub use index_sweep::{IndexSweepWorker, WorkerHandle};
