//! Newtonian gravity: the acceleration field and the integrator that
//! advances the simulation state.

pub mod common;
pub mod integrator;
