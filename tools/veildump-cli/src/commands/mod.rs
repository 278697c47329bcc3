//! Command implementations.

pub mod delete;
pub mod dump;
pub mod list_dumps;
pub mod restore;
pub mod transformers;
pub mod validate;
