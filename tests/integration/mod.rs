//! Integration tests for bundle-repack

mod cache_validity;
mod cli_contracts;
mod repack_flow;
mod support;
