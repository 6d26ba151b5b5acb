//! Layered daemon configuration.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`LMSD_*`, `__` separates nested sections)
//! 2. `lmsd.toml` in the working directory
//! 3. Built-in defaults

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "lmsd.toml";

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LmsConfig {
    /// Workspace opened at startup; `workspace.select` can still switch it.
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// Fallback tracing filter when `LMSD_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub admin: AdminDefaults,

    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl Default for LmsConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            log_level: default_log_level(),
            admin: AdminDefaults::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

/// Account created by `admin.provision` when the request names none.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminDefaults {
    pub name: String,
    pub email: String,
    pub credential_hash: String,
}

impl Default for AdminDefaults {
    fn default() -> Self {
        Self {
            name: "Super Admin".to_string(),
            email: "admin@example.com".to_string(),
            credential_hash: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeedbackConfig {
    /// Template for open-ended answers. `{question}` and `{response}` are
    /// substituted. No feedback is attached when unset.
    #[serde(default)]
    pub template: Option<String>,
}

impl LmsConfig {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::figment().extract()?)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("LMSD_").split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_without_sources() {
        figment::Jail::expect_with(|_jail| {
            let cfg = LmsConfig::load().expect("load");
            assert_eq!(cfg.workspace, None);
            assert_eq!(cfg.log_level, "info");
            assert_eq!(cfg.admin.email, "admin@example.com");
            assert_eq!(cfg.feedback.template, None);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                log_level = "debug"
                workspace = "/tmp/from-file"

                [admin]
                name = "Registrar"
                email = "registrar@school.test"
                credential_hash = "x"
                "#,
            )?;
            jail.set_env("LMSD_WORKSPACE", "/tmp/from-env");
            jail.set_env("LMSD_FEEDBACK__TEMPLATE", "Reviewed: {response}");

            let cfg = LmsConfig::load().expect("load");
            assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/from-env")));
            assert_eq!(cfg.log_level, "debug");
            assert_eq!(cfg.admin.name, "Registrar");
            assert_eq!(cfg.feedback.template.as_deref(), Some("Reviewed: {response}"));
            Ok(())
        });
    }
}
