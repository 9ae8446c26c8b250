//! The fixed intake field sequence and answer normalization.

use std::fmt;

/// One slot of interview-setup metadata.  Declaration order is prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    Role,
    InterviewType,
    Experience,
    Technology,
    QuestionCount,
}

impl FieldKey {
    /// Storage key, as used in the persisted interview layout.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::Role => "role",
            FieldKey::InterviewType => "type",
            FieldKey::Experience => "experience",
            FieldKey::Technology => "technology",
            FieldKey::QuestionCount => "questionCount",
        }
    }

    pub fn spec(self) -> &'static FieldSpec {
        &FIELDS[self.index()]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: FieldKey,
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const FIELDS: [FieldSpec; 5] = [
    FieldSpec {
        key: FieldKey::Role,
        label: "Job Role",
        prompt: "What role are you interviewing for?",
    },
    FieldSpec {
        key: FieldKey::InterviewType,
        label: "Interview Type",
        prompt: "What type of interview is this? Say technical, behavioral, or system design.",
    },
    FieldSpec {
        key: FieldKey::Experience,
        label: "Experience Level",
        prompt: "What is your experience level? Say junior, mid, or senior.",
    },
    FieldSpec {
        key: FieldKey::Technology,
        label: "Technology",
        prompt: "What technology or programming language should we focus on?",
    },
    FieldSpec {
        key: FieldKey::QuestionCount,
        label: "Number of Questions",
        prompt: "How many questions would you like? Say a number between 3 and 10.",
    },
];

pub const DEFAULT_QUESTION_COUNT: &str = "5";

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a spoken answer for `key`.
pub fn normalize(key: FieldKey, transcript: &str) -> String {
    let text = transcript.trim().to_lowercase();
    match key {
        FieldKey::InterviewType => normalize_type(&text),
        FieldKey::Experience => normalize_experience(&text),
        FieldKey::QuestionCount => normalize_count(&text),
        FieldKey::Role | FieldKey::Technology => capitalize_first(&text),
    }
}

/// Normalize a typed answer: free-text fields are kept as entered.
pub fn normalize_typed(key: FieldKey, input: &str) -> String {
    match key {
        FieldKey::Role | FieldKey::Technology => input.trim().to_string(),
        _ => normalize(key, input),
    }
}

fn normalize_type(text: &str) -> String {
    if text.contains("technical") {
        "Technical".into()
    } else if text.contains("behavioral") {
        "Behavioral".into()
    } else if text.contains("system") {
        "System Design".into()
    } else {
        text.to_string()
    }
}

fn normalize_experience(text: &str) -> String {
    if text.contains("junior") {
        "Junior".into()
    } else if text.contains("mid") {
        "Mid-level".into()
    } else if text.contains("senior") {
        "Senior".into()
    } else {
        text.to_string()
    }
}

fn normalize_count(text: &str) -> String {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        DEFAULT_QUESTION_COUNT.into()
    } else {
        digits
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
