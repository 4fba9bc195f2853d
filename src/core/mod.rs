//! Core types and errors shared by the parser, scorer and learner

pub mod error;
pub mod types;

pub use self::error::*;
pub use self::types::*;
