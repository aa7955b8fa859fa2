//! Row color and filter resolution.
//!
//! Everything here is a pure function of caller-owned state: the record
//! set, the [`ColorAssignment`], and the [`FilterSet`]. Callers mutate those
//! in response to user actions and rerun a pass.

pub mod color;
pub mod filter;

pub use color::{assign_color, reset_colors, resolve_color, ColorAssignment, ColorResolver};
pub use filter::{apply_filters, matches_filters, CompiledFilter, FilterSet, Filtered};
