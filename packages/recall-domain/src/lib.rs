pub mod gate;
pub mod grounding;
pub mod metadata;
pub mod scoring;
