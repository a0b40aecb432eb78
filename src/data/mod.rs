//! Data loading
//!
//! Implementations of the [`Dataset`](crate::core::Dataset) trait for
//! on-disk formats.

pub mod libsvm;

pub use self::libsvm::*;
