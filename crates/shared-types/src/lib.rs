//! # Shared Types Crate
//!
//! Value types exchanged between the consensus-facing bridge and the
//! execution-facing gateway.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: heights, hashes and results are defined once.
//! - **Opaque Transactions**: the bridge never interprets transaction bytes.
//! - **Hex at the Boundary**: app hashes cross the gateway boundary as hex and
//!   are decoded exactly once, here.

pub mod entities;
pub mod errors;
pub mod params;

pub use entities::*;
pub use errors::*;
pub use params::*;
