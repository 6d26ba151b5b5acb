pub mod accounts;
pub mod analytics;
pub mod assessments;
pub mod assignments;
pub mod core;
pub mod courses;
pub mod enrollment;
