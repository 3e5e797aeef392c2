//! Shared types and collaborator ports
//!
//! This module contains the value types exchanged between the round engine
//! and its collaborators, and the traits those collaborators implement.

pub mod types;
pub mod traits;
