//! Core robot types.
//!
//! - [`commands`]: body pose and command types queued for the control loop.
//! - [`health`]: error status word and module switches.
//! - [`joint`]: joint enumeration and travel protection.
//! - [`leg`]: leg enumeration, leg state and indexing helpers.
//! - [`sensor`]: orientation sensor and telemetry interfaces.
//! - [`servo`]: logic angle to pulse width conversion and servo power.
//! - [`state`]: motion state and the published status snapshot.
pub mod commands;
pub mod health;
pub mod joint;
pub mod leg;
pub mod sensor;
pub mod servo;
pub mod state;
