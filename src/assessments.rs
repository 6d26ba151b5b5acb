//! Quiz and exam lifecycle.
//!
//! Per `(assessment, student)`: not submitted -> submitted (ungraded) -> graded.
//! Submission happens once. Grading happens once and is terminal.

use crate::courses;
use crate::error::{LmsError, LmsResult};
use crate::feedback::FeedbackProvider;
use crate::grading::{self, AutoGrade};
use crate::model::{
    Answer, Assessment, AssessmentKind, AssessmentPatch, AssessmentSubmission, NewAssessment, NewQuestion,
    Question, QuestionType, WithStudent,
};
use crate::store::{self, assessments};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub submission_id: String,
    pub score: f64,
    pub total_possible_score: f64,
    pub percentage: String,
}

fn build_questions(new: &[NewQuestion]) -> LmsResult<Vec<Question>> {
    new.iter()
        .enumerate()
        .map(|(i, q)| {
            let text = q.question_text.trim();
            if text.is_empty() {
                return Err(LmsError::validation(format!("question {} has no text", i + 1)));
            }
            if !q.points.is_finite() || q.points < 0.0 {
                return Err(LmsError::validation(format!(
                    "question {} must be worth zero or more points",
                    i + 1
                )));
            }
            let (options, correct_answer) = match q.question_type {
                QuestionType::MultipleChoice => {
                    let Some(correct) = q.correct_answer.as_deref().filter(|c| !c.is_empty()) else {
                        return Err(LmsError::validation(format!(
                            "question {} is multiple-choice and needs a correctAnswer",
                            i + 1
                        )));
                    };
                    (q.options.clone(), Some(correct.to_string()))
                }
                QuestionType::OpenEnded => (Vec::new(), None),
            };
            Ok(Question {
                id: store::new_id(),
                question_text: text.to_string(),
                question_type: q.question_type,
                options,
                correct_answer,
                points: q.points,
            })
        })
        .collect()
}

/// Hides correct answers from students.
pub fn redacted(mut a: Assessment) -> Assessment {
    for q in &mut a.questions {
        q.correct_answer = None;
    }
    a
}

pub fn find(conn: &Connection, assessment_id: &str) -> LmsResult<Assessment> {
    assessments::find_assessment(conn, assessment_id)?.ok_or_else(|| LmsError::not_found("Assessment"))
}

fn find_owned(conn: &Connection, teacher_id: &str, assessment_id: &str) -> LmsResult<Assessment> {
    let a = find(conn, assessment_id)?;
    courses::require_owner(conn, &a.course_id, teacher_id)?;
    Ok(a)
}

pub fn create(
    conn: &Connection,
    teacher_id: &str,
    kind: AssessmentKind,
    new: &NewAssessment,
    now: &str,
) -> LmsResult<Assessment> {
    courses::require_owner(conn, &new.course_id, teacher_id)?;
    let title = new.title.trim();
    if title.is_empty() {
        return Err(LmsError::validation("missing title"));
    }
    if matches!(new.time_limit, Some(m) if m <= 0) {
        return Err(LmsError::validation("timeLimit must be a positive number of minutes"));
    }
    let a = Assessment {
        id: store::new_id(),
        kind,
        course_id: new.course_id.clone(),
        teacher_id: teacher_id.to_string(),
        title: title.to_string(),
        description: new.description.trim().to_string(),
        deadline: new.deadline,
        time_limit: new.time_limit,
        questions: build_questions(&new.questions)?,
        created_at: now.to_string(),
    };

    let tx = conn.unchecked_transaction()?;
    assessments::insert_assessment(&tx, &a)?;
    tx.commit()?;
    info!(kind = kind.as_str(), assessment = %a.id, course = %a.course_id, questions = a.questions.len(), "assessment created");
    Ok(a)
}

/// Questions can only be replaced while nobody has submitted; scores
/// already stored would otherwise point at questions that no longer exist.
pub fn update(
    conn: &Connection,
    teacher_id: &str,
    assessment_id: &str,
    patch: &AssessmentPatch,
) -> LmsResult<Assessment> {
    let mut a = find_owned(conn, teacher_id, assessment_id)?;
    if let Some(t) = patch.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        a.title = t.to_string();
    }
    if let Some(d) = &patch.description {
        a.description = d.trim().to_string();
    }
    match (patch.clear_deadline, patch.deadline) {
        (true, Some(_)) => {
            return Err(LmsError::validation("Use either deadline or clearDeadline, not both"));
        }
        (true, None) => a.deadline = None,
        (false, Some(d)) => a.deadline = Some(d),
        (false, None) => {}
    }
    if let Some(m) = patch.time_limit {
        if m <= 0 {
            return Err(LmsError::validation("timeLimit must be a positive number of minutes"));
        }
        a.time_limit = Some(m);
    }

    let tx = conn.unchecked_transaction()?;
    if let Some(qs) = &patch.questions {
        if assessments::submission_count(&tx, &a.id)? > 0 {
            return Err(LmsError::conflict(
                "Questions cannot be replaced after students have submitted",
            ));
        }
        a.questions = build_questions(qs)?;
        assessments::replace_questions(&tx, &a.id, &a.questions)?;
    }
    assessments::update_assessment_meta(&tx, &a)?;
    tx.commit()?;
    Ok(a)
}

/// Removes the assessment with its submissions; returns how many submissions went with it.
pub fn delete(conn: &Connection, teacher_id: &str, assessment_id: &str) -> LmsResult<i64> {
    let a = find_owned(conn, teacher_id, assessment_id)?;
    let tx = conn.unchecked_transaction()?;
    let submissions = assessments::submission_count(&tx, &a.id)?;
    assessments::delete_assessment(&tx, &a.id)?;
    tx.commit()?;
    info!(kind = a.kind.as_str(), assessment = %a.id, submissions, "assessment deleted");
    Ok(submissions)
}

pub fn list(
    conn: &Connection,
    course_id: &str,
    kind: Option<AssessmentKind>,
    hide_answers: bool,
) -> LmsResult<Vec<Assessment>> {
    courses::find(conn, course_id)?;
    let all = assessments::list_for_course(conn, course_id, kind)?;
    Ok(if hide_answers {
        all.into_iter().map(redacted).collect()
    } else {
        all
    })
}

/// Records a student's one and only submission.
///
/// A repeat submission is refused before the deadline is looked at. The
/// unique index on `(assessment_id, student_id)` turns a racing second
/// insert into the same conflict.
pub fn submit(
    conn: &Connection,
    feedback: &dyn FeedbackProvider,
    student_id: &str,
    assessment_id: &str,
    answers: &[Answer],
    now: DateTime<Utc>,
) -> LmsResult<SubmitOutcome> {
    let a = find(conn, assessment_id)?;
    if store::accounts::find_student(conn, student_id)?.is_none() {
        return Err(LmsError::not_found("Student"));
    }
    let duplicate = || LmsError::conflict(format!("You have already submitted this {}", a.kind.as_str()));
    if assessments::find_submission(conn, &a.id, student_id)?.is_some() {
        return Err(duplicate());
    }
    if let Some(deadline) = a.deadline {
        if now > deadline {
            return Err(LmsError::validation(format!(
                "The deadline for this {} has passed",
                a.kind.as_str()
            )));
        }
    }

    let AutoGrade {
        answers,
        score,
        total_possible,
    } = grading::auto_grade(&a.questions, answers, feedback);
    let submission = AssessmentSubmission {
        id: store::new_id(),
        assessment_id: a.id.clone(),
        student_id: student_id.to_string(),
        answers,
        score,
        total_possible_score: total_possible,
        graded: false,
        feedback: String::new(),
        submitted_at: store::ts(&now),
        graded_at: None,
    };

    let tx = conn.unchecked_transaction()?;
    match assessments::insert_submission(&tx, &submission) {
        Ok(()) => {}
        Err(e) if store::is_unique_violation(&e) => return Err(duplicate()),
        Err(e) => return Err(e.into()),
    }
    tx.commit()?;

    info!(kind = a.kind.as_str(), assessment = %a.id, student = %student_id, score, total_possible, "assessment submitted");
    Ok(SubmitOutcome {
        submission_id: submission.id,
        score,
        total_possible_score: total_possible,
        percentage: grading::percentage_label(score, total_possible),
    })
}

/// The single manual grading pass by the course's teacher.
pub fn grade(
    conn: &Connection,
    teacher_id: &str,
    assessment_id: &str,
    student_id: &str,
    overrides: &HashMap<String, f64>,
    feedback: Option<&str>,
    now: DateTime<Utc>,
) -> LmsResult<AssessmentSubmission> {
    let a = find_owned(conn, teacher_id, assessment_id)?;
    let current = assessments::find_submission(conn, &a.id, student_id)?
        .ok_or_else(|| LmsError::not_found("Submission"))?;
    let next = grading::apply_overrides(&current, &a.questions, overrides, feedback, &store::ts(&now))?;
    if assessments::mark_graded(conn, &next)? == 0 {
        return Err(LmsError::conflict("Submission already graded"));
    }
    info!(kind = a.kind.as_str(), assessment = %a.id, student = %student_id, score = next.score, "submission graded");
    Ok(next)
}

pub fn results(conn: &Connection, student_id: &str, assessment_id: &str) -> LmsResult<AssessmentSubmission> {
    let a = find(conn, assessment_id)?;
    assessments::find_submission(conn, &a.id, student_id)?.ok_or_else(|| LmsError::not_found("Submission"))
}

pub fn submissions(
    conn: &Connection,
    teacher_id: &str,
    assessment_id: &str,
) -> LmsResult<Vec<WithStudent<AssessmentSubmission>>> {
    let a = find_owned(conn, teacher_id, assessment_id)?;
    assessments::list_submissions(conn, &a.id)?
        .into_iter()
        .map(|s| -> LmsResult<WithStudent<AssessmentSubmission>> {
            let who = store::accounts::find_student(conn, &s.student_id)?;
            Ok(WithStudent {
                student_name: who.as_ref().map(|w| w.name.clone()),
                student_email: who.map(|w| w.email),
                item: s,
            })
        })
        .collect()
}
