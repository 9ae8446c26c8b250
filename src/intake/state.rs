//! Intake progress and the completed field set.

use std::collections::BTreeMap;

use super::fields::{normalize_typed, FieldKey, FieldSpec, FIELDS};
use super::IntakeError;

/// Answers captured so far plus the index of the field being asked.
///
/// Values only ever grow; a field is written once, when its answer arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeState {
    values: BTreeMap<FieldKey, String>,
    current_index: usize,
}

impl IntakeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The field being asked, or `None` once every field is filled.
    pub fn current_field(&self) -> Option<&'static FieldSpec> {
        FIELDS.get(self.current_index)
    }

    pub fn value(&self, key: FieldKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= FIELDS.len()
    }

    /// Store the answer for the current field and move to the next one.
    pub(crate) fn record_current(&mut self, value: String) -> Option<FieldKey> {
        let key = self.current_field()?.key;
        self.values.insert(key, value);
        self.current_index += 1;
        Some(key)
    }

    /// Build the final field set; fails if any field is missing or empty.
    pub fn to_fields(&self) -> Result<IntakeFields, IntakeError> {
        let get = |key: FieldKey| -> Result<String, IntakeError> {
            match self.values.get(&key) {
                Some(v) if !v.trim().is_empty() => Ok(v.clone()),
                _ => Err(IntakeError::MissingField(key)),
            }
        };
        Ok(IntakeFields {
            role: get(FieldKey::Role)?,
            interview_type: get(FieldKey::InterviewType)?,
            experience: get(FieldKey::Experience)?,
            technology: get(FieldKey::Technology)?,
            question_count: get(FieldKey::QuestionCount)?,
        })
    }
}

// ---------------------------------------------------------------------------
// IntakeFields
// ---------------------------------------------------------------------------

/// A complete, normalized set of interview-setup answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeFields {
    pub role: String,
    pub interview_type: String,
    pub experience: String,
    pub technology: String,
    /// Raw count text; parsed when the interview is generated.
    pub question_count: String,
}

impl IntakeFields {
    /// Validate and normalize manually entered values.
    pub fn manual(
        role: &str,
        interview_type: &str,
        experience: &str,
        technology: &str,
        question_count: &str,
    ) -> Result<Self, IntakeError> {
        let field = |key: FieldKey, raw: &str| -> Result<String, IntakeError> {
            if raw.trim().is_empty() {
                return Err(IntakeError::MissingField(key));
            }
            Ok(normalize_typed(key, raw))
        };
        Ok(Self {
            role: field(FieldKey::Role, role)?,
            interview_type: field(FieldKey::InterviewType, interview_type)?,
            experience: field(FieldKey::Experience, experience)?,
            technology: field(FieldKey::Technology, technology)?,
            question_count: field(FieldKey::QuestionCount, question_count)?,
        })
    }

    pub fn get(&self, key: FieldKey) -> &str {
        match key {
            FieldKey::Role => &self.role,
            FieldKey::InterviewType => &self.interview_type,
            FieldKey::Experience => &self.experience,
            FieldKey::Technology => &self.technology,
            FieldKey::QuestionCount => &self.question_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_advance_in_order() {
        let mut state = IntakeState::new();
        assert_eq!(state.current_field().map(|f| f.key), Some(FieldKey::Role));

        assert_eq!(state.record_current("Backend developer".into()), Some(FieldKey::Role));
        assert_eq!(state.current_index(), 1);
        assert_eq!(state.value(FieldKey::Role), Some("Backend developer"));
        assert_eq!(
            state.current_field().map(|f| f.key),
            Some(FieldKey::InterviewType)
        );
    }

    #[test]
    fn complete_state_builds_fields() {
        let mut state = IntakeState::new();
        for v in ["Backend developer", "Technical", "Senior", "Rust", "4"] {
            state.record_current(v.into());
        }
        assert!(state.is_complete());
        assert_eq!(state.record_current("extra".into()), None);

        let fields = state.to_fields().unwrap();
        assert_eq!(fields.technology, "Rust");
        assert_eq!(fields.get(FieldKey::QuestionCount), "4");
    }

    #[test]
    fn incomplete_state_reports_first_missing_field() {
        let mut state = IntakeState::new();
        state.record_current("Designer".into());
        assert_eq!(
            state.to_fields(),
            Err(IntakeError::MissingField(FieldKey::InterviewType))
        );
    }

    #[test]
    fn manual_entry_normalizes_closed_fields() {
        let fields =
            IntakeFields::manual(" Data engineer ", "system design", "mid", " Kafka ", "six or 6")
                .unwrap();
        assert_eq!(fields.role, "Data engineer");
        assert_eq!(fields.interview_type, "System Design");
        assert_eq!(fields.experience, "Mid-level");
        assert_eq!(fields.technology, "Kafka");
        assert_eq!(fields.question_count, "6");
    }

    #[test]
    fn manual_entry_rejects_blank_fields() {
        let err = IntakeFields::manual("Dev", "Technical", "Junior", "   ", "3").unwrap_err();
        assert_eq!(err, IntakeError::MissingField(FieldKey::Technology));
    }
}
