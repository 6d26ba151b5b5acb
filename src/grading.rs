//! Scoring rules for quiz/exam submissions and assignment grades.
//!
//! Everything here is pure: the workflows in `assessments` and `assignments` load
//! entities, call into these functions and persist what they return.

use crate::error::{LmsError, LmsResult};
use crate::feedback::FeedbackProvider;
use crate::model::{Answer, AssessmentSubmission, Question, QuestionType};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct AutoGrade {
    pub answers: Vec<Answer>,
    /// Multiple-choice points earned.
    pub score: f64,
    /// Points of every resolved question, whatever its type.
    pub total_possible: f64,
}

/// Scores a fresh set of answers.
///
/// Answers naming an unknown question are dropped, as are repeat answers to
/// a question already answered earlier in the list. Multiple-choice answers
/// earn the full point value on an exact match and nothing otherwise.
/// Open-ended answers earn nothing here but may pick up feedback.
pub fn auto_grade(
    questions: &[Question],
    answers: &[Answer],
    feedback: &dyn FeedbackProvider,
) -> AutoGrade {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(answers.len());
    let mut score = 0.0;
    let mut total_possible = 0.0;

    for a in answers {
        let Some(q) = questions.iter().find(|q| q.id == a.question_id) else {
            continue;
        };
        if !seen.insert(q.id.as_str()) {
            continue;
        }
        total_possible += q.points;

        let note = match q.question_type {
            QuestionType::MultipleChoice => {
                if q.correct_answer.as_deref() == Some(a.response.as_str()) {
                    score += q.points;
                }
                None
            }
            QuestionType::OpenEnded => feedback.feedback(q, &a.response),
        };
        out.push(Answer {
            question_id: q.id.clone(),
            response: a.response.clone(),
            feedback: note,
        });
    }

    AutoGrade {
        answers: out,
        score,
        total_possible,
    }
}

/// Bounds a teacher-supplied score to `[0, max]`. NaN counts as zero.
pub fn clamp_points(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max.max(0.0))
}

/// The single manual grading pass.
///
/// Each override naming a question the submission answered is clamped to
/// that question's point value and added to the auto-graded score. Other ids,
/// including questions the student left unanswered, are ignored. A graded submission is
/// rejected untouched.
pub fn apply_overrides(
    submission: &AssessmentSubmission,
    questions: &[Question],
    overrides: &HashMap<String, f64>,
    feedback: Option<&str>,
    graded_at: &str,
) -> LmsResult<AssessmentSubmission> {
    if submission.graded {
        return Err(LmsError::conflict("Submission already graded"));
    }

    let answered: HashSet<&str> = submission
        .answers
        .iter()
        .map(|a| a.question_id.as_str())
        .collect();
    let added: f64 = questions
        .iter()
        .filter(|q| answered.contains(q.id.as_str()))
        .filter_map(|q| overrides.get(&q.id).map(|v| clamp_points(*v, q.points)))
        .sum();

    let mut next = submission.clone();
    next.score = submission.score + added;
    next.graded = true;
    next.feedback = feedback.unwrap_or_default().to_string();
    next.graded_at = Some(graded_at.to_string());
    Ok(next)
}

pub fn validate_assignment_grade(grade: f64) -> LmsResult<f64> {
    if !grade.is_finite() || !(0.0..=100.0).contains(&grade) {
        return Err(LmsError::validation("grade must be between 0 and 100"));
    }
    Ok(grade)
}

/// Score as a percentage of `total`; `None` when there is nothing to divide by.
pub fn percent(score: f64, total: f64) -> Option<f64> {
    if total > 0.0 {
        Some(score / total * 100.0)
    } else {
        None
    }
}

/// `"50.00%"` style label used in submit responses.
pub fn percentage_label(score: f64, total: f64) -> String {
    format!("{:.2}%", percent(score, total).unwrap_or(0.0))
}
