//! Celestial bodies: the body value type, orbital-element conversion and the
//! registry that turns ingested records into the initial simulation state.

pub mod body;
pub mod elements;
pub mod registry;
