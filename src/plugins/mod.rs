//! Subsystems. Each exposes a clap CLI, a `run_*_cli` entry point and a
//! `schema()` describing its commands and storage.

pub mod collaborators;
pub mod constraints;
pub mod diagnostics;
pub mod doctor;
pub mod memory;
pub mod override_gate;
pub mod proposal;
pub mod suggest;
pub mod transition;
pub mod validation;
