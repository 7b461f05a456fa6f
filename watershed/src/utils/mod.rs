//! Utility functions for natural ordering, name sanitizing and timestamps.

pub mod natural;
pub mod timestamps;

pub use natural::{natural_cmp, natural_sort, sanitize_code};
pub use timestamps::{now_utc, Timestamp};
