//! Read-only performance summaries.
//!
//! Loaders pull one [`Scored`] row per submission out of the store; the fold
//! functions are pure and work on those rows only. Quiz and exam scores are
//! normalized to a percentage of the assessment's question points, assignment
//! grades are taken as-is. Category averages are first-class: the overall
//! figure is the mean of the categories that have at least one value, never a
//! mean of pooled raw scores.

use crate::error::{LmsError, LmsResult};
use crate::grading::percent;
use crate::model::{AssessmentKind, Student};
use crate::store;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Quiz,
    Exam,
    Assignment,
}

impl From<AssessmentKind> for Category {
    fn from(kind: AssessmentKind) -> Self {
        match kind {
            AssessmentKind::Quiz => Category::Quiz,
            AssessmentKind::Exam => Category::Exam,
        }
    }
}

/// One submission, already normalized. `value` is `None` when the submission
/// contributes nothing (ungraded assignment, assessment without points).
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub course_id: String,
    pub course_title: String,
    pub student_id: String,
    pub category: Category,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScores {
    pub quiz_scores: Vec<f64>,
    pub exam_scores: Vec<f64>,
    pub assignment_scores: Vec<f64>,
}

impl CategoryScores {
    fn push(&mut self, category: Category, value: f64) {
        match category {
            Category::Quiz => self.quiz_scores.push(value),
            Category::Exam => self.exam_scores.push(value),
            Category::Assignment => self.assignment_scores.push(value),
        }
    }

    pub fn averages(&self) -> CategoryAverages {
        let lists = [&self.quiz_scores, &self.exam_scores, &self.assignment_scores];
        let non_empty: Vec<f64> = lists
            .iter()
            .filter(|l| !l.is_empty())
            .map(|l| mean(l))
            .collect();
        CategoryAverages {
            quiz_average: mean(&self.quiz_scores),
            exam_average: mean(&self.exam_scores),
            assignment_average: mean(&self.assignment_scores),
            average_score: mean(&non_empty),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverages {
    pub quiz_average: f64,
    pub exam_average: f64,
    pub assignment_average: f64,
    pub average_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallPerformance {
    pub total_quizzes: usize,
    pub total_exams: usize,
    pub total_assignments: usize,
    #[serde(flatten)]
    pub averages: CategoryAverages,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePerformance {
    pub course_id: String,
    pub course_name: String,
    #[serde(flatten)]
    pub scores: CategoryScores,
    #[serde(flatten)]
    pub averages: CategoryAverages,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAnalytics {
    pub student: Student,
    pub overall_performance: OverallPerformance,
    pub course_performance: Vec<CoursePerformance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub total_students: usize,
    pub average_quiz_score: f64,
    pub average_exam_score: f64,
    pub average_assignment_score: f64,
    pub average_overall_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBreakdown {
    pub student_id: String,
    pub student_name: String,
    pub student_email: String,
    #[serde(flatten)]
    pub averages: CategoryAverages,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAnalytics {
    pub course_id: String,
    pub course_title: String,
    pub class_stats: ClassStats,
    pub student_breakdown: Vec<StudentBreakdown>,
}

/// Someone listed in a course breakdown; names are `None` when the account is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub student_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Folds one student's submissions into an overall summary plus a
/// per-course breakdown ordered by course title.
pub fn fold_student(records: &[Scored]) -> (OverallPerformance, Vec<CoursePerformance>) {
    let mut overall = OverallPerformance::default();
    let mut all = CategoryScores::default();
    let mut by_course: BTreeMap<&str, (&str, CategoryScores)> = BTreeMap::new();

    for r in records {
        match r.category {
            Category::Quiz => overall.total_quizzes += 1,
            Category::Exam => overall.total_exams += 1,
            Category::Assignment => overall.total_assignments += 1,
        }
        let entry = by_course
            .entry(r.course_id.as_str())
            .or_insert_with(|| (r.course_title.as_str(), CategoryScores::default()));
        if let Some(v) = r.value {
            all.push(r.category, v);
            entry.1.push(r.category, v);
        }
    }
    overall.averages = all.averages();

    let mut courses: Vec<CoursePerformance> = by_course
        .into_iter()
        .map(|(id, (title, scores))| CoursePerformance {
            course_id: id.to_string(),
            course_name: title.to_string(),
            averages: scores.averages(),
            scores,
        })
        .collect();
    courses.sort_by(|a, b| a.course_name.cmp(&b.course_name).then(a.course_id.cmp(&b.course_id)));
    (overall, courses)
}

/// Class-wide view of one course. Every participant gets a breakdown row;
/// class category averages only count students with a value in that category.
pub fn fold_course(
    course_id: &str,
    course_title: &str,
    participants: &[Participant],
    records: &[Scored],
) -> CourseAnalytics {
    let mut per_student: BTreeMap<&str, CategoryScores> = BTreeMap::new();
    for p in participants {
        per_student.entry(p.student_id.as_str()).or_default();
    }
    for r in records.iter().filter(|r| r.course_id == course_id) {
        let scores = per_student.entry(r.student_id.as_str()).or_default();
        if let Some(v) = r.value {
            scores.push(r.category, v);
        }
    }

    let mut class = CategoryScores::default();
    let mut breakdown = Vec::with_capacity(per_student.len());
    for (student_id, scores) in &per_student {
        let averages = scores.averages();
        if !scores.quiz_scores.is_empty() {
            class.quiz_scores.push(averages.quiz_average);
        }
        if !scores.exam_scores.is_empty() {
            class.exam_scores.push(averages.exam_average);
        }
        if !scores.assignment_scores.is_empty() {
            class.assignment_scores.push(averages.assignment_average);
        }
        let who = participants.iter().find(|p| p.student_id == *student_id);
        breakdown.push(StudentBreakdown {
            student_id: student_id.to_string(),
            student_name: who
                .and_then(|p| p.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            student_email: who
                .and_then(|p| p.email.clone())
                .unwrap_or_else(|| "N/A".to_string()),
            averages,
        });
    }
    breakdown.sort_by(|a, b| a.student_name.cmp(&b.student_name).then(a.student_id.cmp(&b.student_id)));

    let class_averages = class.averages();
    CourseAnalytics {
        course_id: course_id.to_string(),
        course_title: course_title.to_string(),
        class_stats: ClassStats {
            total_students: breakdown.len(),
            average_quiz_score: class_averages.quiz_average,
            average_exam_score: class_averages.exam_average,
            average_assignment_score: class_averages.assignment_average,
            average_overall_score: class_averages.average_score,
        },
        student_breakdown: breakdown,
    }
}

enum Scope<'a> {
    Student(&'a str, Option<&'a str>),
    Course(&'a str),
}

fn load_scores(conn: &Connection, scope: Scope<'_>) -> LmsResult<Vec<Scored>> {
    let (filter, args): (&str, Vec<&str>) = match scope {
        Scope::Student(sid, None) => ("s.student_id = ?", vec![sid]),
        Scope::Student(sid, Some(cid)) => ("s.student_id = ? AND c.id = ?", vec![sid, cid]),
        Scope::Course(cid) => ("c.id = ?", vec![cid]),
    };

    let sql = format!(
        "SELECT c.id, c.title, s.student_id, a.kind, s.score,
                (SELECT COALESCE(SUM(q.points), 0) FROM questions q WHERE q.assessment_id = a.id)
         FROM assessment_submissions s
         JOIN assessments a ON a.id = s.assessment_id
         JOIN courses c ON c.id = a.course_id
         WHERE {filter}
         ORDER BY s.submitted_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut out = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |r| {
            let kind_raw: String = r.get(3)?;
            let kind = AssessmentKind::parse(&kind_raw).ok_or_else(|| {
                store::bad_column(3, format!("unknown assessment kind: {kind_raw}"))
            })?;
            let score: f64 = r.get(4)?;
            let total: f64 = r.get(5)?;
            Ok(Scored {
                course_id: r.get(0)?,
                course_title: r.get(1)?,
                student_id: r.get(2)?,
                category: kind.into(),
                value: percent(score, total),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let sql = format!(
        "SELECT c.id, c.title, s.student_id, s.grade
         FROM assignment_submissions s
         JOIN assignments a ON a.id = s.assignment_id
         JOIN courses c ON c.id = a.course_id
         WHERE {filter}
         ORDER BY s.submitted_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let assignments = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |r| {
            Ok(Scored {
                course_id: r.get(0)?,
                course_title: r.get(1)?,
                student_id: r.get(2)?,
                category: Category::Assignment,
                value: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    out.extend(assignments);
    Ok(out)
}

pub fn student_analytics(
    conn: &Connection,
    student_id: &str,
    course_id: Option<&str>,
) -> LmsResult<StudentAnalytics> {
    let student = store::accounts::find_student(conn, student_id)?
        .ok_or_else(|| LmsError::not_found("Student"))?;
    let records = load_scores(conn, Scope::Student(student_id, course_id))?;
    let (overall_performance, course_performance) = fold_student(&records);
    Ok(StudentAnalytics {
        student,
        overall_performance,
        course_performance,
    })
}

/// Enrolled students plus anyone with a submission in the course.
fn participants(conn: &Connection, course_id: &str) -> LmsResult<Vec<Participant>> {
    let mut stmt = conn.prepare(
        "SELECT p.student_id, st.name, st.email
         FROM (
           SELECT student_id FROM enrollments WHERE course_id = ?1 AND state = 'enrolled'
           UNION
           SELECT s.student_id FROM assessment_submissions s
             JOIN assessments a ON a.id = s.assessment_id WHERE a.course_id = ?1
           UNION
           SELECT s.student_id FROM assignment_submissions s
             JOIN assignments a ON a.id = s.assignment_id WHERE a.course_id = ?1
         ) p
         LEFT JOIN students st ON st.id = p.student_id
         ORDER BY p.student_id",
    )?;
    let rows = stmt.query_map([course_id], |r| {
        Ok(Participant {
            student_id: r.get(0)?,
            name: r.get(1)?,
            email: r.get(2)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn course_analytics(conn: &Connection, course_id: &str) -> LmsResult<CourseAnalytics> {
    let course = store::courses::find_course(conn, course_id)?
        .ok_or_else(|| LmsError::not_found("Course"))?;
    let people = participants(conn, course_id)?;
    let records = load_scores(conn, Scope::Course(course_id))?;
    Ok(fold_course(&course.id, &course.title, &people, &records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scored(course: &str, student: &str, category: Category, value: Option<f64>) -> Scored {
        Scored {
            course_id: course.into(),
            course_title: format!("Course {course}"),
            student_id: student.into(),
            category,
            value,
        }
    }

    fn participant(id: &str, name: &str) -> Participant {
        Participant {
            student_id: id.into(),
            name: Some(name.into()),
            email: Some(format!("{id}@school.test")),
        }
    }

    #[test]
    fn overall_is_mean_of_category_means() {
        let records = [
            scored("c1", "s1", Category::Quiz, percent(5.0, 10.0)),
            scored("c1", "s1", Category::Assignment, Some(90.0)),
        ];
        let (overall, courses) = fold_student(&records);
        assert_eq!(overall.averages.quiz_average, 50.0);
        assert_eq!(overall.averages.assignment_average, 90.0);
        assert_eq!(overall.averages.average_score, 70.0);
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].averages.average_score, 70.0);
    }

    #[test]
    fn category_weighting_is_not_pooled() {
        let records = [
            scored("c1", "s1", Category::Quiz, Some(100.0)),
            scored("c1", "s1", Category::Quiz, Some(100.0)),
            scored("c1", "s1", Category::Quiz, Some(100.0)),
            scored("c1", "s1", Category::Exam, Some(40.0)),
        ];
        let (overall, _) = fold_student(&records);
        assert_eq!(overall.averages.average_score, 70.0);
        assert_eq!(overall.total_quizzes, 3);
        assert_eq!(overall.total_exams, 1);
    }

    #[test]
    fn valueless_submissions_count_but_do_not_average() {
        let records = [
            scored("c1", "s1", Category::Assignment, None),
            scored("c1", "s1", Category::Quiz, None),
        ];
        let (overall, courses) = fold_student(&records);
        assert_eq!(overall.total_assignments, 1);
        assert_eq!(overall.averages, CategoryAverages::default());
        assert_eq!(courses[0].scores, CategoryScores::default());
    }

    #[test]
    fn courses_are_grouped_and_titled() {
        let mut b = scored("c2", "s1", Category::Exam, Some(80.0));
        b.course_title = "Biology".into();
        let mut a = scored("c1", "s1", Category::Quiz, Some(60.0));
        a.course_title = "Algebra".into();
        let (_, courses) = fold_student(&[b, a]);
        let names: Vec<&str> = courses.iter().map(|c| c.course_name.as_str()).collect();
        assert_eq!(names, vec!["Algebra", "Biology"]);
        assert_eq!(courses[1].averages.exam_average, 80.0);
    }

    #[test]
    fn class_averages_only_count_contributing_students() {
        let people = [participant("s1", "Ada"), participant("s2", "Ben"), participant("s3", "Cy")];
        let records = [
            scored("c1", "s1", Category::Quiz, Some(50.0)),
            scored("c1", "s1", Category::Quiz, Some(100.0)),
            scored("c1", "s2", Category::Quiz, Some(25.0)),
            scored("c1", "s2", Category::Assignment, Some(80.0)),
            scored("other", "s3", Category::Quiz, Some(0.0)),
        ];
        let report = fold_course("c1", "Algebra", &people, &records);
        assert_eq!(report.class_stats.total_students, 3);
        assert_eq!(report.class_stats.average_quiz_score, 50.0);
        assert_eq!(report.class_stats.average_assignment_score, 80.0);
        assert_eq!(report.class_stats.average_exam_score, 0.0);
        assert_eq!(report.class_stats.average_overall_score, 65.0);

        let cy = &report.student_breakdown[2];
        assert_eq!(cy.student_name, "Cy");
        assert_eq!(cy.averages, CategoryAverages::default());
    }

    #[test]
    fn unknown_submitters_are_labelled() {
        let records = [scored("c1", "ghost", Category::Assignment, Some(70.0))];
        let report = fold_course("c1", "Algebra", &[], &records);
        assert_eq!(report.student_breakdown[0].student_name, "Unknown");
        assert_eq!(report.student_breakdown[0].student_email, "N/A");
        assert_eq!(report.class_stats.average_overall_score, 70.0);
    }

    #[test]
    fn empty_course_reports_zeroes() {
        let report = fold_course("c1", "Algebra", &[], &[]);
        assert_eq!(report.class_stats, ClassStats::default());
        assert!(report.student_breakdown.is_empty());
    }
}
