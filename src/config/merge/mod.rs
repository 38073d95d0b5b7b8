//! Merge of configuration sources.

pub mod policy;
pub mod service;
