//! Core value types shared by the containers.
//!
//! ## Types
//!
//! - [`Order`]: the fixed-layout record (id, timestamp, signed volume, flag)
//! - [`Cursor`]: `(block key, offset)` position, or the end position
//! - [`Location`]: identifier-index entry pointing at a live slot
//!
//! ## State Roots
//!
//! [`state_root`] hashes a record sequence with SHA-256 so that two
//! containers can be compared by content regardless of their block layout.

mod cursor;
mod order;

pub use cursor::{Cursor, Location};
pub use order::{state_root, Order};
