//! contains utils used in parsing reference folders and parameters

pub mod files;
pub mod parameters;

pub use files::*;
pub use parameters::*;
