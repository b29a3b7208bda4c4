//! Client-side playback components: the guard that keeps the video surface
//! inside its policy envelope, and the reporter that samples playback state
//! while playing. Both are UX-level deterrence; the binding guarantees live
//! in the ingestion service.

pub mod guard;
pub mod reporter;
