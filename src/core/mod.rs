//! Core domain models
//!
//! This module defines the fundamental data structures that represent
//! pipelines, steps, their configuration, and the values they transform.

pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod state;
pub mod step;

pub use data::*;
pub use error::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
