//! `timetable-core` — identity and time primitives shared by every layer.
//!
//! This crate contains **no infrastructure concerns** (no storage, no HTTP).

pub mod clock;
pub mod error;
pub mod id;
pub mod role;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CoreError;
pub use id::PrincipalId;
pub use role::{Role, RoleSet};
