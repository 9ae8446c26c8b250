//! Heuristic feedback scoring.
//!
//! [`score`] is a pure function of the interview metadata and the answer
//! texts.  The confidence score is a 0–100 heuristic built from average
//! answer length and, for technical interviews, keyword usage.

use std::fmt;

use crate::interview::Interview;

const BASE_SCORE: i64 = 70;
const KEYWORD_BONUS: i64 = 2;
const TECHNICAL_TYPE: &str = "Technical";
const TECHNICAL_KEYWORDS: [&str; 5] = [
    "algorithm",
    "data structure",
    "optimization",
    "performance",
    "scalability",
];

const EXCELLENT_TEXT: &str = "Excellent performance! You demonstrated strong knowledge and \
    communication skills. Your answers were comprehensive and showed deep understanding of the \
    concepts.";
const GOOD_TEXT: &str = "Good performance overall. You showed solid understanding of the topics \
    with room for improvement in providing more detailed explanations and examples.";
const NEEDS_IMPROVEMENT_TEXT: &str = "There's room for improvement. Consider preparing more \
    thoroughly and practicing your responses to be more confident and detailed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceLevel {
    Excellent,
    Good,
    NeedsImprovement,
}

impl PerformanceLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => PerformanceLevel::Excellent,
            60..=79 => PerformanceLevel::Good,
            _ => PerformanceLevel::NeedsImprovement,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PerformanceLevel::Excellent => "Excellent",
            PerformanceLevel::Good => "Good",
            PerformanceLevel::NeedsImprovement => "Needs Improvement",
        }
    }

    fn summary(self) -> &'static str {
        match self {
            PerformanceLevel::Excellent => EXCELLENT_TEXT,
            PerformanceLevel::Good => GOOD_TEXT,
            PerformanceLevel::NeedsImprovement => NEEDS_IMPROVEMENT_TEXT,
        }
    }
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub confidence_score: u8,
    pub feedback_text: String,
    pub level: PerformanceLevel,
}

/// Mean whitespace-separated word count; `0.0` for no answers.
pub fn average_words(answers: &[String]) -> f64 {
    if answers.is_empty() {
        return 0.0;
    }
    let total: usize = answers.iter().map(|a| a.split_whitespace().count()).sum();
    total as f64 / answers.len() as f64
}

/// Words of the joined, lower-cased answers that contain a technical keyword.
///
/// Matching is per word, so multi-word keywords never match.
pub fn keyword_count(answers: &[String]) -> usize {
    answers
        .join(" ")
        .to_lowercase()
        .split_whitespace()
        .filter(|word| TECHNICAL_KEYWORDS.iter().any(|k| word.contains(k)))
        .count()
}

pub fn score(interview: &Interview, answers: &[String]) -> Feedback {
    let avg_words = average_words(answers);
    let technical = interview.interview_type == TECHNICAL_TYPE;

    let mut raw = BASE_SCORE;
    if avg_words > 50.0 {
        raw += 15;
    } else if avg_words > 20.0 {
        raw += 10;
    } else if avg_words < 10.0 {
        raw -= 20;
    }
    if technical {
        raw += KEYWORD_BONUS * keyword_count(answers) as i64;
    }
    let confidence_score = raw.clamp(0, 100) as u8;
    let level = PerformanceLevel::from_score(confidence_score);

    let mut text = format!(
        "Based on your {} interview performance, here's your evaluation:\n\n{}",
        interview.role,
        level.summary()
    );
    text.push_str("\n\nAreas to focus on:\n");
    if avg_words < 20.0 {
        text.push_str("• Provide more detailed and comprehensive answers\n");
    }
    if technical {
        text.push_str("• Include more technical terminology and concepts\n");
        text.push_str("• Discuss implementation details and trade-offs\n");
    }
    text.push_str("• Practice speaking more confidently\n");
    text.push_str("• Use specific examples from your experience\n");

    log::debug!("feedback: avg {avg_words:.1} words → {confidence_score} ({level})");
    Feedback {
        confidence_score,
        feedback_text: text,
        level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn interview(kind: &str, count: usize) -> Interview {
        Interview {
            id: "interview_t".into(),
            role: "Backend developer".into(),
            interview_type: kind.into(),
            experience: "Mid-level".into(),
            technology: "Python".into(),
            question_count: count,
            questions: vec!["q".into(); count],
            created_at: Utc::now(),
        }
    }

    fn words(n: usize, filler: &str) -> String {
        vec![filler; n].join(" ")
    }

    #[test]
    fn short_behavioral_answers_need_improvement() {
        let answers = vec![words(5, "word"); 3];
        let fb = score(&interview("Behavioral", 3), &answers);

        assert_eq!(fb.confidence_score, 50);
        assert_eq!(fb.level, PerformanceLevel::NeedsImprovement);
        assert!(fb.feedback_text.starts_with(
            "Based on your Backend developer interview performance, here's your evaluation:\n\n"
        ));
        assert!(fb.feedback_text.contains(NEEDS_IMPROVEMENT_TEXT));
        assert!(fb.feedback_text.contains("• Provide more detailed and comprehensive answers"));
        assert!(!fb.feedback_text.contains("technical terminology"));
        assert!(fb.feedback_text.ends_with("• Use specific examples from your experience\n"));
    }

    #[test]
    fn long_technical_answers_with_keywords_excel() {
        // 60 words each, "algorithm" twice in total.
        let mut first = vec!["word"; 58];
        first.push("algorithm");
        first.push("algorithms,");
        let answers = vec![first.join(" "), words(60, "word")];
        let fb = score(&interview("Technical", 2), &answers);

        assert_eq!(keyword_count(&answers), 2);
        assert_eq!(fb.confidence_score, 89);
        assert_eq!(fb.level, PerformanceLevel::Excellent);
        assert!(fb.feedback_text.contains(EXCELLENT_TEXT));
        assert!(!fb.feedback_text.contains("more detailed and comprehensive"));
        assert!(fb.feedback_text.contains("• Include more technical terminology and concepts\n"));
        assert!(fb.feedback_text.contains("• Discuss implementation details and trade-offs\n"));
    }

    #[test]
    fn empty_answers_score_fifty() {
        let fb = score(&interview("Technical", 3), &vec![String::new(); 3]);
        assert_eq!(fb.confidence_score, 50);
        let fb = score(&interview("Behavioral", 0), &[]);
        assert_eq!(fb.confidence_score, 50);
    }

    #[test]
    fn medium_answers_are_good() {
        let answers = vec![words(25, "word"); 2];
        let fb = score(&interview("System Design", 2), &answers);
        assert_eq!(fb.confidence_score, 80);
        let answers = vec![words(15, "word"); 2];
        let fb = score(&interview("System Design", 2), &answers);
        assert_eq!(fb.confidence_score, 70);
        assert_eq!(fb.level, PerformanceLevel::Good);
        assert!(fb.feedback_text.contains(GOOD_TEXT));
    }

    #[test]
    fn score_is_clamped() {
        let answers = vec![words(80, "performance"); 4];
        let fb = score(&interview("Technical", 4), &answers);
        assert_eq!(fb.confidence_score, 100);
    }

    #[test]
    fn keyword_bonus_needs_exact_technical_type() {
        let answers = vec![words(60, "scalability")];
        assert_eq!(score(&interview("technical", 1), &answers).confidence_score, 85);
        assert_eq!(score(&interview("Technical", 1), &answers).confidence_score, 100);
    }

    #[test]
    fn multi_word_keyword_never_matches() {
        let answers = vec!["a data structure".to_string()];
        assert_eq!(keyword_count(&answers), 0);
    }

    #[test]
    fn levels_from_score() {
        assert_eq!(PerformanceLevel::from_score(100), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_score(80), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_score(79), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_score(60), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_score(59), PerformanceLevel::NeedsImprovement);
        assert_eq!(PerformanceLevel::NeedsImprovement.to_string(), "Needs Improvement");
    }
}
