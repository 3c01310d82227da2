//!
//! Orrery - gravitational simulation of the Solar System
//!
//! Loads body data from an ingested data store, integrates the bodies'
//! motion under mutual Newtonian gravity at a fixed physics rate, and hands a
//! snapshot per rendered frame to the output.

#[macro_use]
mod macros;
#[macro_use]
extern crate impl_ops;

pub mod bodies;
pub mod cli;
pub mod clock;
pub mod error;
pub mod gravity;
pub mod input;
pub mod output;
pub mod sim;
pub mod snapshot;
pub mod state;
pub mod types;
