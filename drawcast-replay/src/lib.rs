//! # drawcast-replay
//!
//! Drives the drawcast order encoder end to end outside of a real RDP
//! server: loads a TOML drawing script, feeds it through a session
//! worker and logs every update PDU that comes out.
//!
//! - **config**: `ReplayConfig`, loaded from TOML with defaults
//! - **script**: `Script` and its `[[ops]]` entries
//! - **runner**: `Replay`, which runs a script and returns a `ReplayReport`

pub mod config;
pub mod runner;
pub mod script;
