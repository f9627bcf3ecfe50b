//! Circular restricted three-body physics in the rotating frame

pub mod equations;
pub mod integrators;
pub mod lagrange;
pub mod math;
pub mod state;
pub mod trajectory;
