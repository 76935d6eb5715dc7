//! Wildcard and fragment expansion for image-generation prompts.
//!
//! The [`expand`] module rewrites prompts containing choice points:
//!
//! - `<name>` / `<folder/name>`: a random line from a stored fragment file
//! - `<*name>`: the next line of a fragment file, in order
//! - `<red|blue|green>`: one of the inline options
//! - `(white hair, blue eyes/red hair)`: one of the grouped options
//! - `tag, red/blue, tag`: one of the bare slash options within a tag
//!
//! Fragment files and sequential cursors live in a [`db::Database`], which the
//! engine reaches only through the [`store::FragmentStore`] trait.

pub mod api;
pub mod config;
pub mod db;
pub mod expand;
pub mod models;
pub mod store;
