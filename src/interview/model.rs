//! Stored interview and result records.
//!
//! Field names serialize in camelCase; `type`, `feedback` and `confidence`
//! keep the short names of the stored layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::generator::InterviewType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    pub id: String,
    pub role: String,
    #[serde(rename = "type")]
    pub interview_type: String,
    pub experience: String,
    pub technology: String,
    pub question_count: usize,
    pub questions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Interview {
    pub fn kind(&self) -> InterviewType {
        InterviewType::resolve(&self.interview_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewResult {
    pub id: String,
    pub interview_id: String,
    pub role: String,
    pub answers: Vec<String>,
    #[serde(rename = "feedback")]
    pub feedback_text: String,
    /// 0–100.
    #[serde(rename = "confidence")]
    pub confidence_score: u8,
    pub completed_at: DateTime<Utc>,
}

impl InterviewResult {
    pub fn new(
        interview: &Interview,
        answers: Vec<String>,
        feedback_text: String,
        confidence_score: u8,
    ) -> Self {
        Self {
            id: format!("result_{}", Uuid::new_v4()),
            interview_id: interview.id.clone(),
            role: interview.role.clone(),
            answers,
            feedback_text,
            confidence_score: confidence_score.min(100),
            completed_at: Utc::now(),
        }
    }
}
