//! Core data models and traits

mod backend;
mod cancel;
mod host;

pub use backend::*;
pub use cancel::*;
pub use host::*;
