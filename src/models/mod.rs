//! Domain models for wildprompt.
//!
//! # Core Concepts
//!
//! - [`Fragment`]: A named, optionally foldered list of text lines used as a
//!   wildcard source. Metadata is stored apart from the lines themselves,
//!   which are addressed by the fragment's `content_id`.
//! - [`SequentialCounter`]: The cursor that `<*path>` references advance,
//!   one per reference path. Cursors persist until explicitly reset.

mod counter;
mod fragment;

pub use counter::*;
pub use fragment::*;
