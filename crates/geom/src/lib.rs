//! Shared planar geometry types for quadmap.
//!
//! This crate contains:
//! - The axis-aligned `Envelope` bounding box
//! - Shared coordinate types

mod envelope;

pub use envelope::Envelope;

/// Represents a 2D coordinate using glam's DVec2.
pub type Coord = glam::DVec2;
