use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Beginner" => Some(Level::Beginner),
            "Intermediate" => Some(Level::Intermediate),
            "Advanced" => Some(Level::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Video,
    Image,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Video => "video",
            FileKind::Image => "image",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pdf" => Some(FileKind::Pdf),
            "video" => Some(FileKind::Video),
            "image" => Some(FileKind::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseFile {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub course_code: String,
    pub description: String,
    pub duration: String,
    pub level: Level,
    pub course_format: String,
    pub prerequisites: Vec<String>,
    pub objectives: Vec<String>,
    pub teacher_id: String,
    pub enrolled_count: i64,
    pub files: Vec<CourseFile>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub title: String,
    pub course_code: String,
    pub description: String,
    #[serde(default)]
    pub duration: String,
    pub level: Level,
    #[serde(default)]
    pub course_format: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
}

/// Partial edit of a course; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub level: Option<Level>,
    pub course_format: Option<String>,
    pub prerequisites: Option<Vec<String>>,
    pub objectives: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentState {
    None,
    Pending,
    Enrolled,
}

impl EnrollmentState {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentState::None => "none",
            EnrollmentState::Pending => "pending",
            EnrollmentState::Enrolled => "enrolled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "none" => Some(EnrollmentState::None),
            "pending" => Some(EnrollmentState::Pending),
            "enrolled" => Some(EnrollmentState::Enrolled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub parent_email1: Option<String>,
    pub parent_email2: Option<String>,
    pub is_approved: bool,
    pub created_at: String,
}

/// Teacher, parent and admin records share this shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Quiz,
    Exam,
}

impl AssessmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentKind::Quiz => "quiz",
            AssessmentKind::Exam => "exam",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "quiz" => Some(AssessmentKind::Quiz),
            "exam" => Some(AssessmentKind::Exam),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssessmentKind::Quiz => "Quiz",
            AssessmentKind::Exam => "Exam",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "multiple-choice")]
    MultipleChoice,
    #[serde(rename = "open-ended")]
    OpenEnded,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::OpenEnded => "open-ended",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "multiple-choice" => Some(QuestionType::MultipleChoice),
            "open-ended" => Some(QuestionType::OpenEnded),
            _ => None,
        }
    }
}

pub const DEFAULT_POINTS: f64 = 1.0;

fn default_points() -> f64 {
    DEFAULT_POINTS
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
    pub points: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default = "default_points")]
    pub points: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub kind: AssessmentKind,
    pub course_id: String,
    pub teacher_id: String,
    pub title: String,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
    pub time_limit: Option<i64>,
    pub questions: Vec<Question>,
    pub created_at: String,
}

impl Assessment {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssessment {
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_limit: Option<i64>,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    /// Removes the deadline; cannot be combined with `deadline`.
    #[serde(default)]
    pub clear_deadline: bool,
    pub time_limit: Option<i64>,
    pub questions: Option<Vec<NewQuestion>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSubmission {
    pub id: String,
    pub assessment_id: String,
    pub student_id: String,
    pub answers: Vec<Answer>,
    pub score: f64,
    pub total_possible_score: f64,
    pub graded: bool,
    pub feedback: String,
    pub submitted_at: String,
    pub graded_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub course_id: String,
    pub teacher_id: String,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSubmission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub file_ref: String,
    pub file_name: String,
    pub submitted_at: String,
    pub grade: Option<f64>,
    pub feedback: String,
}

/// A submission listed for its teacher, with the submitter's contact details.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithStudent<T> {
    #[serde(flatten)]
    pub item: T,
    pub student_name: Option<String>,
    pub student_email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeePayment {
    pub id: String,
    pub student_id: String,
    pub amount_paid: f64,
    pub term: String,
    pub is_paid_in_full: bool,
    pub date_paid: String,
    pub payment_method: Option<String>,
}

pub const DEFAULT_FEE_TERM: &str = "School Fee Payment";
