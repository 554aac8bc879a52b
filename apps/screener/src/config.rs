use std::path::PathBuf;

use anyhow::{bail, Context, Result};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_PAGE_ORIGIN: &str = "http://localhost:8000";
const DEFAULT_MOCK_PORT: u16 = 8000;

/// Client configuration, resolved once at startup and injected into the
/// endpoint policy and the REST client. Nothing reads the environment after this.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base: String,
    /// Process-wide chat endpoint override (second in endpoint precedence).
    pub ws_url: Option<String>,
    /// Origin the default chat endpoint is derived from.
    pub page_origin: String,
    pub application_id: Option<i64>,
    pub user_id: Option<i64>,
    pub job_id: Option<i64>,
    pub cv_path: Option<PathBuf>,
    pub cover_letter: Option<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Config {
            api_base: var("SCREENER_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            ws_url: var("SCREENER_WS_URL"),
            page_origin: var("SCREENER_PAGE_ORIGIN")
                .unwrap_or_else(|| DEFAULT_PAGE_ORIGIN.to_string()),
            application_id: parse_opt(&var, "SCREENER_APPLICATION_ID")?,
            user_id: parse_opt(&var, "SCREENER_USER_ID")?,
            job_id: parse_opt(&var, "SCREENER_JOB_ID")?,
            cv_path: var("SCREENER_CV_PATH").map(PathBuf::from),
            cover_letter: var("SCREENER_COVER_LETTER"),
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        };

        if config.application_id.is_none() && config.job_id.is_some() && config.cv_path.is_none() {
            bail!("SCREENER_CV_PATH is required when SCREENER_JOB_ID is set");
        }

        Ok(config)
    }
}

/// Configuration for the scripted mock interviewer.
#[derive(Debug, Clone, PartialEq)]
pub struct MockConfig {
    pub port: u16,
    /// `host:port` advertised in the `websocket_url` handed to applicants.
    pub public_host: String,
    pub questions: Vec<String>,
    pub rust_log: String,
}

impl MockConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_opt(&var, "MOCK_PORT")?.unwrap_or(DEFAULT_MOCK_PORT);
        let questions = match var("MOCK_QUESTIONS") {
            Some(raw) => raw
                .split('|')
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string)
                .collect(),
            None => default_questions(),
        };

        Ok(MockConfig {
            port,
            public_host: var("MOCK_PUBLIC_HOST").unwrap_or_else(|| format!("localhost:{port}")),
            questions,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn default_questions() -> Vec<String> {
    vec![
        "How many years of professional experience do you have with the core stack listed in the job description?".to_string(),
        "Tell me about a project where you owned a feature end to end. What was your role?".to_string(),
        "When would you be available to start, and are you comfortable with the work format of this position?".to_string(),
    ]
}

fn parse_opt<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} must be a valid number, got '{raw}'"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.page_origin, DEFAULT_PAGE_ORIGIN);
        assert!(config.ws_url.is_none());
        assert!(config.application_id.is_none());
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_blank_values_are_treated_as_unset() {
        let config = Config::from_lookup(lookup(&[("SCREENER_WS_URL", "  ")])).unwrap();
        assert!(config.ws_url.is_none());
    }

    #[test]
    fn test_parses_application_and_user_ids() {
        let config = Config::from_lookup(lookup(&[
            ("SCREENER_APPLICATION_ID", "42"),
            ("SCREENER_USER_ID", " 7 "),
        ]))
        .unwrap();
        assert_eq!(config.application_id, Some(42));
        assert_eq!(config.user_id, Some(7));
    }

    #[test]
    fn test_invalid_number_names_the_variable() {
        let err = Config::from_lookup(lookup(&[("SCREENER_APPLICATION_ID", "abc")])).unwrap_err();
        assert!(err.to_string().contains("SCREENER_APPLICATION_ID"));
    }

    #[test]
    fn test_job_id_without_cv_path_is_rejected() {
        let err = Config::from_lookup(lookup(&[("SCREENER_JOB_ID", "3")])).unwrap_err();
        assert!(err.to_string().contains("SCREENER_CV_PATH"));
    }

    #[test]
    fn test_mock_config_splits_questions() {
        let config = MockConfig::from_lookup(lookup(&[
            ("MOCK_PORT", "9100"),
            ("MOCK_QUESTIONS", "First? | Second? ||"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.public_host, "localhost:9100");
        assert_eq!(config.questions, vec!["First?", "Second?"]);
    }

    #[test]
    fn test_mock_config_defaults_to_scripted_questions() {
        let config = MockConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.questions.len(), 3);
    }
}
