//! # Domain Module
//!
//! Core types for gateway provisioning.

pub mod entities;
pub mod errors;
pub mod messages;

pub use entities::*;
pub use errors::*;
pub use messages::*;
