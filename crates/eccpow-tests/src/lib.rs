//! # eccpow-tests
//!
//! Integration tests for the ECCPoW workspace.
//!
//! This crate provides:
//! - Consensus tests across graph construction, decoding and verification
//! - Property-based tests for the code and level selection
//! - Mining tests for the solver, worker pool and miner

pub mod harness;




pub use harness::*;
