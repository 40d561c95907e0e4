//! AI-assisted message composition.
//!
//! Generation runs outside the delivery engine. Any failure, including a
//! timeout, produces [`FALLBACK_MESSAGE`] instead of an error.

pub mod composer;
pub mod gemini;
pub mod generator;

pub use composer::{marketing_prompt, MessageComposer, FALLBACK_MESSAGE};
pub use gemini::GeminiGenerator;
pub use generator::{StaticGenerator, TextGenerator, UnavailableGenerator};
