//! Core trait abstractions.
//!
//! These traits are the narrow contracts the pipeline consumes. Applications
//! implement them over real services; `crate::testing` provides scripted
//! doubles.

pub mod capability;
pub mod store;
