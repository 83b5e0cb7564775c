//! Infrastructure layer: session store backends and background workers.

pub mod session_store;
pub mod workers;
