//! Console helpers shared by the binary

pub mod display;

pub use display::{GenerationProgress, Tone, WorldFormatter};
