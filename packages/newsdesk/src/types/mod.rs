//! Data types flowing through one pipeline run.

pub mod answer;
pub mod article;
pub mod candidate;
pub mod claim;
pub mod config;
pub mod query;
