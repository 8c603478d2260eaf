//! Tollgate Core
//!
//! Core types for the Tollgate build admission engine.
//!
//! This crate contains:
//! - Domain types: matching snapshots of runners and builds, admission outcomes
//! - DTOs: runner and build records as handed over by the persistence layer
//! - Errors raised while building snapshots or evaluating quota

pub mod domain;
pub mod dto;
pub mod error;
