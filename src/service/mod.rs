//! Service layer: the moderation gate and the augmentation service.
//!
//! Both are stateless and cheap to clone; they share one generation
//! [`crate::llm::Capability`].

pub mod augmentation;
pub mod moderation;

pub use augmentation::{AugmentationRequest, AugmentationResult, Augmenter};
pub use moderation::{FailurePolicy, ModerationGate, ModerationResult};
