use super::{bad_column, from_json_list, parse_bool, parse_ts, to_json_list, ts};
use crate::model::{Answer, Assessment, AssessmentKind, AssessmentSubmission, Question, QuestionType};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension, Row};

const ASSESSMENT_COLUMNS: &str =
    "id, kind, course_id, teacher_id, title, description, deadline, time_limit, created_at";
const SUBMISSION_COLUMNS: &str = "id, assessment_id, student_id, score, total_possible, graded,
    feedback, submitted_at, graded_at";

fn assessment_from_row(r: &Row<'_>) -> rusqlite::Result<Assessment> {
    let kind_raw: String = r.get(1)?;
    let kind = AssessmentKind::parse(&kind_raw)
        .ok_or_else(|| bad_column(1, format!("unknown assessment kind: {kind_raw}")))?;
    let deadline = match r.get::<_, Option<String>>(6)? {
        Some(s) => Some(parse_ts(6, &s)?),
        None => None,
    };
    Ok(Assessment {
        id: r.get(0)?,
        kind,
        course_id: r.get(2)?,
        teacher_id: r.get(3)?,
        title: r.get(4)?,
        description: r.get(5)?,
        deadline,
        time_limit: r.get(7)?,
        questions: Vec::new(),
        created_at: r.get(8)?,
    })
}

fn submission_from_row(r: &Row<'_>) -> rusqlite::Result<AssessmentSubmission> {
    Ok(AssessmentSubmission {
        id: r.get(0)?,
        assessment_id: r.get(1)?,
        student_id: r.get(2)?,
        answers: Vec::new(),
        score: r.get(3)?,
        total_possible_score: r.get(4)?,
        graded: parse_bool(r.get(5)?),
        feedback: r.get(6)?,
        submitted_at: r.get(7)?,
        graded_at: r.get(8)?,
    })
}

pub fn insert_assessment(conn: &Connection, a: &Assessment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO assessments(id, kind, course_id, teacher_id, title, description, deadline, time_limit, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &a.id,
            a.kind.as_str(),
            &a.course_id,
            &a.teacher_id,
            &a.title,
            &a.description,
            a.deadline.as_ref().map(ts),
            a.time_limit,
            &a.created_at,
        ),
    )?;
    insert_questions(conn, &a.id, &a.questions)
}

pub fn update_assessment_meta(conn: &Connection, a: &Assessment) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE assessments SET title = ?, description = ?, deadline = ?, time_limit = ? WHERE id = ?",
        (
            &a.title,
            &a.description,
            a.deadline.as_ref().map(ts),
            a.time_limit,
            &a.id,
        ),
    )
}

pub fn replace_questions(conn: &Connection, assessment_id: &str, questions: &[Question]) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM questions WHERE assessment_id = ?", [assessment_id])?;
    insert_questions(conn, assessment_id, questions)
}

fn insert_questions(conn: &Connection, assessment_id: &str, questions: &[Question]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO questions(id, assessment_id, idx, question_text, question_type, options, correct_answer, points)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    for (idx, q) in questions.iter().enumerate() {
        stmt.execute((
            &q.id,
            assessment_id,
            idx as i64,
            &q.question_text,
            q.question_type.as_str(),
            to_json_list(&q.options),
            &q.correct_answer,
            q.points,
        ))?;
    }
    Ok(())
}

fn questions_for(conn: &Connection, assessment_id: &str) -> rusqlite::Result<Vec<Question>> {
    let mut stmt = conn.prepare(
        "SELECT id, question_text, question_type, options, correct_answer, points
         FROM questions WHERE assessment_id = ? ORDER BY idx",
    )?;
    let rows = stmt.query_map([assessment_id], |r| {
        let type_raw: String = r.get(2)?;
        let question_type = QuestionType::parse(&type_raw)
            .ok_or_else(|| bad_column(2, format!("unknown question type: {type_raw}")))?;
        let options: String = r.get(3)?;
        Ok(Question {
            id: r.get(0)?,
            question_text: r.get(1)?,
            question_type,
            options: from_json_list(3, &options)?,
            correct_answer: r.get(4)?,
            points: r.get(5)?,
        })
    })?;
    rows.collect()
}

pub fn find_assessment(conn: &Connection, id: &str) -> rusqlite::Result<Option<Assessment>> {
    let sql = format!("SELECT {} FROM assessments WHERE id = ?", ASSESSMENT_COLUMNS);
    let found = conn.query_row(&sql, [id], assessment_from_row).optional()?;
    match found {
        Some(mut a) => {
            a.questions = questions_for(conn, &a.id)?;
            Ok(Some(a))
        }
        None => Ok(None),
    }
}

pub fn list_for_course(
    conn: &Connection,
    course_id: &str,
    kind: Option<AssessmentKind>,
) -> rusqlite::Result<Vec<Assessment>> {
    let mut sql = format!(
        "SELECT {} FROM assessments WHERE course_id = ?",
        ASSESSMENT_COLUMNS
    );
    let mut values = vec![Value::Text(course_id.to_string())];
    if let Some(k) = kind {
        sql.push_str(" AND kind = ?");
        values.push(Value::Text(k.as_str().to_string()));
    }
    sql.push_str(" ORDER BY created_at, title");

    let mut stmt = conn.prepare(&sql)?;
    let mut out = stmt
        .query_map(params_from_iter(values), assessment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for a in &mut out {
        a.questions = questions_for(conn, &a.id)?;
    }
    Ok(out)
}

/// Removes the assessment with its questions and submissions. Run inside a transaction.
pub fn delete_assessment(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM submission_answers
         WHERE submission_id IN (SELECT id FROM assessment_submissions WHERE assessment_id = ?)",
        [id],
    )?;
    conn.execute("DELETE FROM assessment_submissions WHERE assessment_id = ?", [id])?;
    conn.execute("DELETE FROM questions WHERE assessment_id = ?", [id])?;
    conn.execute("DELETE FROM assessments WHERE id = ?", [id])
}

pub fn submission_count(conn: &Connection, assessment_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM assessment_submissions WHERE assessment_id = ?",
        [assessment_id],
        |r| r.get(0),
    )
}

/// Inserts the submission row and its answers. The UNIQUE(assessment_id,
/// student_id) index rejects a second submission; run inside a transaction.
pub fn insert_submission(conn: &Connection, s: &AssessmentSubmission) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO assessment_submissions(id, assessment_id, student_id, score, total_possible,
                                            graded, feedback, submitted_at, graded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &s.id,
            &s.assessment_id,
            &s.student_id,
            s.score,
            s.total_possible_score,
            s.graded as i64,
            &s.feedback,
            &s.submitted_at,
            &s.graded_at,
        ),
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO submission_answers(submission_id, idx, question_id, response, feedback)
         VALUES(?, ?, ?, ?, ?)",
    )?;
    for (idx, a) in s.answers.iter().enumerate() {
        stmt.execute((&s.id, idx as i64, &a.question_id, &a.response, &a.feedback))?;
    }
    Ok(())
}

fn answers_for(conn: &Connection, submission_id: &str) -> rusqlite::Result<Vec<Answer>> {
    let mut stmt = conn.prepare(
        "SELECT question_id, response, feedback FROM submission_answers
         WHERE submission_id = ? ORDER BY idx",
    )?;
    let rows = stmt.query_map([submission_id], |r| {
        Ok(Answer {
            question_id: r.get(0)?,
            response: r.get(1)?,
            feedback: r.get(2)?,
        })
    })?;
    rows.collect()
}

pub fn find_submission(
    conn: &Connection,
    assessment_id: &str,
    student_id: &str,
) -> rusqlite::Result<Option<AssessmentSubmission>> {
    let sql = format!(
        "SELECT {} FROM assessment_submissions WHERE assessment_id = ? AND student_id = ?",
        SUBMISSION_COLUMNS
    );
    let found = conn
        .query_row(&sql, (assessment_id, student_id), submission_from_row)
        .optional()?;
    match found {
        Some(mut s) => {
            s.answers = answers_for(conn, &s.id)?;
            Ok(Some(s))
        }
        None => Ok(None),
    }
}

pub fn list_submissions(conn: &Connection, assessment_id: &str) -> rusqlite::Result<Vec<AssessmentSubmission>> {
    let sql = format!(
        "SELECT {} FROM assessment_submissions WHERE assessment_id = ? ORDER BY submitted_at",
        SUBMISSION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut out = stmt
        .query_map([assessment_id], submission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for s in &mut out {
        s.answers = answers_for(conn, &s.id)?;
    }
    Ok(out)
}

/// Persists a graded submission only if it is still ungraded; returns rows changed.
pub fn mark_graded(conn: &Connection, s: &AssessmentSubmission) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE assessment_submissions
         SET score = ?, graded = 1, feedback = ?, graded_at = ?
         WHERE id = ? AND graded = 0",
        (s.score, &s.feedback, &s.graded_at, &s.id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{is_unique_violation, test_support::open_temp};

    fn seed(conn: &Connection) -> Assessment {
        conn.execute_batch(
            "INSERT INTO teachers VALUES('t1', 'Ms T', 't@school.test', 'h', 'now');
             INSERT INTO courses(id, title, course_code, description, duration, level, course_format, teacher_id, created_at)
               VALUES('c1', 'Algebra', 'MATH-1', 'd', '5 weeks', 'Beginner', 'online', 't1', 'now');",
        )
        .expect("seed");
        let a = Assessment {
            id: "quiz-1".into(),
            kind: AssessmentKind::Quiz,
            course_id: "c1".into(),
            teacher_id: "t1".into(),
            title: "Quiz 1".into(),
            description: String::new(),
            deadline: None,
            time_limit: Some(20),
            questions: vec![Question {
                id: "q1".into(),
                question_text: "1 + 1?".into(),
                question_type: QuestionType::MultipleChoice,
                options: vec!["1".into(), "2".into()],
                correct_answer: Some("2".into()),
                points: 2.0,
            }],
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        insert_assessment(conn, &a).expect("assessment");
        a
    }

    fn submission(id: &str) -> AssessmentSubmission {
        AssessmentSubmission {
            id: id.into(),
            assessment_id: "quiz-1".into(),
            student_id: "s1".into(),
            answers: vec![Answer {
                question_id: "q1".into(),
                response: "2".into(),
                feedback: None,
            }],
            score: 2.0,
            total_possible_score: 2.0,
            graded: false,
            feedback: String::new(),
            submitted_at: "2026-01-02T00:00:00.000Z".into(),
            graded_at: None,
        }
    }

    #[test]
    fn assessment_round_trips_with_questions() {
        let (_dir, conn) = open_temp();
        let a = seed(&conn);
        let found = find_assessment(&conn, &a.id).expect("find").expect("exists");
        assert_eq!(found.questions, a.questions);
        assert_eq!(found.time_limit, Some(20));
        assert_eq!(list_for_course(&conn, "c1", Some(AssessmentKind::Exam)).expect("list").len(), 0);
        assert_eq!(list_for_course(&conn, "c1", None).expect("list").len(), 1);
    }

    #[test]
    fn second_submission_violates_uniqueness() {
        let (_dir, conn) = open_temp();
        seed(&conn);
        insert_submission(&conn, &submission("sub-1")).expect("first");
        let e = insert_submission(&conn, &submission("sub-2")).unwrap_err();
        assert!(is_unique_violation(&e));
        assert_eq!(submission_count(&conn, "quiz-1").expect("count"), 1);
    }

    #[test]
    fn mark_graded_only_once() {
        let (_dir, conn) = open_temp();
        seed(&conn);
        insert_submission(&conn, &submission("sub-1")).expect("insert");
        let mut graded = submission("sub-1");
        graded.graded = true;
        graded.score = 2.0;
        graded.graded_at = Some("later".into());
        assert_eq!(mark_graded(&conn, &graded).expect("grade"), 1);
        graded.score = 99.0;
        assert_eq!(mark_graded(&conn, &graded).expect("grade again"), 0);

        let stored = find_submission(&conn, "quiz-1", "s1").expect("find").expect("exists");
        assert_eq!(stored.score, 2.0);
        assert!(stored.graded);
        assert_eq!(stored.answers.len(), 1);
    }
}
