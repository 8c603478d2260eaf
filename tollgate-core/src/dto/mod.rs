//! Data Transfer Objects
//!
//! Records handed to the admission engine by its collaborators. Records
//! mirror what storage holds, which may be incomplete; domain snapshots are
//! derived from them and validated on the way.

pub mod build;
pub mod runner;
