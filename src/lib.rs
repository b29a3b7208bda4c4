//! Progress integrity and certification engine for gated video courses:
//! folds untrusted playback telemetry into an authoritative monotonic
//! progress record, gates lesson access on verified completion, and issues
//! course certificates exactly once.

pub mod certificate;
pub mod db;
pub mod error;
pub mod gating;
pub mod models;
pub mod player;
pub mod progress;
pub mod quiz;
pub mod renderer;
pub mod routes;
pub mod session;
pub mod store;
