//! Generation capability: the boundary to the external LLM and its Gemini
//! implementation.

pub mod capability;
#[cfg(test)]
pub(crate) mod fake;
pub mod gemini;

pub use capability::{
    AudioInput, Capability, CapabilityError, Effort, GenerationRequest, Generator,
};
pub use gemini::{GeminiClient, GeminiConfig};
