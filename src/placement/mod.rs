//! Placement engine: where new items land and how drops resolve.

mod core;

pub use self::core::{DropOutcome, NoOpReason, auto_place, find_free_slot, resolve_drop};
