//! Interview records and the canned-question generator.

pub mod generator;
pub mod model;

pub use generator::{generate_questions, parse_count, InterviewType};
pub use model::{Interview, InterviewResult};
