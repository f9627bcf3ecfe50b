//! Synodic library
//!
//! Trajectories of a massless body in the circular restricted three-body
//! problem, integrated in the rotating frame, and the five Lagrange points of
//! the two-body system. The core is three pure call contracts:
//!
//! - [`physics::equations::derivative`]
//! - [`physics::lagrange::locate_lagrange_points`]
//! - [`physics::trajectory::integrate`]

pub mod cli;
pub mod config;
pub mod error;
pub mod physics;
pub mod prelude;
pub mod sweep;

// Test utilities are public for integration tests
pub mod test_utils;
