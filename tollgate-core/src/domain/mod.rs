//! Core domain types
//!
//! Immutable snapshots of the attributes that decide whether a runner can
//! pick up a build. Snapshots are created once per admission pass and are
//! never mutated afterwards, so every decision within a pass sees the same
//! fleet.

pub mod admission;
pub mod build;
pub mod runner;
