//! External transformers: out-of-process executables speaking a JSON-lines
//! protocol over stdio.

mod process;
pub mod protocol;

pub use process::{bootstrap_custom_transformers, CustomTransformerSpec};
