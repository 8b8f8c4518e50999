//! `critter-middleware` – The Simulator Link
//!
//! Moves JSON frames between the simulator and the control loop without
//! caring what the agent does with them.
//!
//! # Modules
//!
//! - [`protocol`] – decodes inbound simulator frames into [`Inbound`] values
//!   and encodes outbound [`Command`][critter_types::Command]s.
//! - [`link`] – [`SimLink`]: a websocket client that runs a reader task and a
//!   writer task so the control loop never blocks on the network.

pub mod link;
pub mod protocol;

pub use link::SimLink;
pub use protocol::{Inbound, decode, encode};
