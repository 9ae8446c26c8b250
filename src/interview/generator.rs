//! Canned question pools and interview construction.

use chrono::Utc;
use uuid::Uuid;

use crate::intake::IntakeFields;

use super::model::Interview;

const DEFAULT_COUNT: usize = 5;
const TECHNOLOGY_SLOT: &str = "{technology}";

const TECHNICAL_POOL: [&str; 8] = [
    "Explain the core concepts of {technology}",
    "What are the best practices when working with {technology}?",
    "How do you handle errors in {technology}?",
    "Describe the performance optimization techniques in {technology}",
    "What are the common security concerns with {technology}?",
    "How do you test applications built with {technology}?",
    "Explain the difference between synchronous and asynchronous operations in {technology}",
    "What design patterns do you commonly use with {technology}?",
];

const BEHAVIORAL_POOL: [&str; 8] = [
    "Tell me about a time when you faced a challenging problem at work",
    "Describe a situation where you had to work with a difficult team member",
    "How do you handle tight deadlines and pressure?",
    "Tell me about a time when you made a mistake and how you handled it",
    "Describe your approach to learning new technologies",
    "How do you prioritize tasks when you have multiple deadlines?",
    "Tell me about a successful project you led or contributed to significantly",
    "Describe a time when you had to give constructive feedback to a colleague",
];

const SYSTEM_DESIGN_POOL: [&str; 8] = [
    "Design a scalable chat application",
    "How would you design a URL shortening service like bit.ly?",
    "Design a social media feed system",
    "How would you design a search autocomplete system?",
    "Design a distributed cache system",
    "How would you design a notification system?",
    "Design a ride-sharing service like Uber",
    "How would you design a video streaming platform?",
];

/// Interview category, resolved once from free-form type text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterviewType {
    Technical,
    Behavioral,
    SystemDesign,
    Unknown,
}

impl InterviewType {
    pub fn resolve(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("technical") {
            InterviewType::Technical
        } else if text.contains("behavioral") {
            InterviewType::Behavioral
        } else if text.contains("system") {
            InterviewType::SystemDesign
        } else {
            InterviewType::Unknown
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InterviewType::Technical => "Technical",
            InterviewType::Behavioral => "Behavioral",
            InterviewType::SystemDesign => "System Design",
            InterviewType::Unknown => "Unknown",
        }
    }

    /// Question templates for this type.  Unknown types get the technical pool.
    pub fn pool(self) -> &'static [&'static str] {
        match self {
            InterviewType::Technical | InterviewType::Unknown => &TECHNICAL_POOL,
            InterviewType::Behavioral => &BEHAVIORAL_POOL,
            InterviewType::SystemDesign => &SYSTEM_DESIGN_POOL,
        }
    }
}

/// First `min(count, pool size)` questions of the pool, in pool order.
pub fn generate_questions(kind: InterviewType, technology: &str, count: usize) -> Vec<String> {
    kind.pool()
        .iter()
        .take(count)
        .map(|template| template.replace(TECHNOLOGY_SLOT, technology))
        .collect()
}

/// Parse the requested question count; anything unusable means 5.
pub fn parse_count(text: &str) -> usize {
    match text.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => DEFAULT_COUNT,
    }
}

impl Interview {
    /// Build a fresh interview from a completed field set.
    pub fn generate(fields: &IntakeFields) -> Self {
        let kind = InterviewType::resolve(&fields.interview_type);
        let requested = parse_count(&fields.question_count);
        let questions = generate_questions(kind, &fields.technology, requested);
        log::debug!(
            "generator: {} questions ({} requested) from the {} pool",
            questions.len(),
            requested,
            kind.label()
        );

        Self {
            id: format!("interview_{}", Uuid::new_v4()),
            role: fields.role.clone(),
            interview_type: fields.interview_type.clone(),
            experience: fields.experience.clone(),
            technology: fields.technology.clone(),
            question_count: questions.len(),
            questions,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(kind: &str, tech: &str, count: &str) -> IntakeFields {
        IntakeFields::manual("Backend developer", kind, "Senior", tech, count).unwrap()
    }

    #[test]
    fn technical_python_three() {
        let interview = Interview::generate(&fields("technical", "Python", "3"));
        assert_eq!(
            interview.questions,
            vec![
                "Explain the core concepts of Python",
                "What are the best practices when working with Python?",
                "How do you handle errors in Python?",
            ]
        );
        assert_eq!(interview.question_count, 3);
        assert_eq!(interview.interview_type, "Technical");
        assert!(interview.id.starts_with("interview_"));
    }

    #[test]
    fn output_is_a_prefix_of_the_pool() {
        for kind in [
            InterviewType::Technical,
            InterviewType::Behavioral,
            InterviewType::SystemDesign,
            InterviewType::Unknown,
        ] {
            for count in 0..12 {
                let qs = generate_questions(kind, "Rust", count);
                assert_eq!(qs.len(), count.min(kind.pool().len()));
                for (q, template) in qs.iter().zip(kind.pool()) {
                    assert_eq!(q, &template.replace(TECHNOLOGY_SLOT, "Rust"));
                }
            }
        }
    }

    #[test]
    fn oversized_request_is_capped() {
        let interview = Interview::generate(&fields("behavioral", "n/a", "10"));
        assert_eq!(interview.questions.len(), 8);
        assert_eq!(interview.question_count, 8);
    }

    #[test]
    fn unknown_type_uses_technical_pool() {
        assert_eq!(InterviewType::resolve("pairing"), InterviewType::Unknown);
        let qs = generate_questions(InterviewType::Unknown, "Elixir", 1);
        assert_eq!(qs, vec!["Explain the core concepts of Elixir"]);
    }

    #[test]
    fn resolve_uses_substring_rules() {
        assert_eq!(InterviewType::resolve("System Design"), InterviewType::SystemDesign);
        assert_eq!(InterviewType::resolve("Behavioral"), InterviewType::Behavioral);
        assert_eq!(InterviewType::resolve("TECHNICAL"), InterviewType::Technical);
    }

    #[test]
    fn count_parsing_defaults_to_five() {
        assert_eq!(parse_count("7"), 7);
        assert_eq!(parse_count("0"), 5);
        assert_eq!(parse_count("lots"), 5);
        assert_eq!(parse_count(""), 5);
    }

    #[test]
    fn ids_are_unique() {
        let f = fields("technical", "Go", "2");
        assert_ne!(Interview::generate(&f).id, Interview::generate(&f).id);
    }
}
