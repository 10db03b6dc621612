//! Object database capabilities
//!
//! This module contains the seam between the pack reader and whatever else
//! stores objects (other packs, loose storage).

pub mod object_locator;
