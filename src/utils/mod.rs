//! # Utility Functions (`utils`)
//!
//! Parallel adaptation over a meta-batch and snapshot serialization of
//! inner-loop parameter history.

pub mod parallel;
pub mod serialization;

pub use parallel::{par_inner_loops, TaskAdaptation};
pub use serialization::{
    load_snapshots, save_snapshots, GenerationSnapshot, SerializationError,
};
