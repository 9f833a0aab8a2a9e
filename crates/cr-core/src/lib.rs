//! chip-ranking/crates/cr-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the chip ranking.

pub mod call;
pub mod client;
pub mod comment;
pub mod error;
pub mod models;
pub mod service;
pub mod session;
pub mod strength;
pub mod traits;
pub mod upload;
pub mod vote;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
