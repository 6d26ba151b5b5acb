//! Hook for annotating open-ended answers at submission time.
//!
//! Feedback is free text only and never changes a score.

use crate::config::FeedbackConfig;
use crate::model::Question;

pub trait FeedbackProvider {
    fn feedback(&self, question: &Question, response: &str) -> Option<String>;
}

pub struct NoFeedback;

impl FeedbackProvider for NoFeedback {
    fn feedback(&self, _question: &Question, _response: &str) -> Option<String> {
        None
    }
}

pub struct TemplateFeedback {
    template: String,
}

impl TemplateFeedback {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl FeedbackProvider for TemplateFeedback {
    fn feedback(&self, question: &Question, response: &str) -> Option<String> {
        Some(
            self.template
                .replace("{question}", &question.question_text)
                .replace("{response}", response),
        )
    }
}

pub fn from_config(cfg: &FeedbackConfig) -> Box<dyn FeedbackProvider> {
    match cfg.template.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => Box::new(TemplateFeedback::new(t)),
        _ => Box::new(NoFeedback),
    }
}
