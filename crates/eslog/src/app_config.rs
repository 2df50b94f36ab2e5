//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Env vars are `ESLOG_*`, nested with `__`:
//! `ESLOG_ELASTICSEARCH__SEARCH_URL=http://es:9200` sets `elasticsearch.search_url`.

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::log_message::LogLevel;
use crate::options::{EsLoggerOptions, lenient_string};

/// 📦 One struct to rule them all.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Everything the Elasticsearch logger needs.
    pub elasticsearch: EsLoggerOptions,
    #[serde(default)]
    pub cli: CliConfig,
}

/// 🎛️ Defaults for events the CLI creates from stdin lines.
#[derive(Debug, Deserialize, Clone)]
pub struct CliConfig {
    #[serde(default = "default_category", deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(default)]
    pub level: LogLevel,
    /// 📦 Upper bound on events per `_bulk` request. Smaller batches go out whenever input pauses.
    #[serde(default = "default_max_events_per_request")]
    pub max_events_per_request: usize,
}

fn default_category() -> String {
    "eslog-cli".to_string()
}

fn default_max_events_per_request() -> usize {
    500
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            level: LogLevel::default(),
            max_events_per_request: default_max_events_per_request(),
        }
    }
}

/// 🚀 Load the config from `ESLOG_*` env vars, plus a TOML file if one was given.
///
/// 📐 `None` means env vars only. `Some(path)` means env vars + TOML, TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("ESLOG_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (ESLOG_*). \
             The file exists in our hearts, but apparently not in a shape serde likes.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (ESLOG_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RegisterTemplateRecovery;
    use figment::Jail;

    // 🔒 Every test that calls load_config runs inside a Jail: it owns the process env and
    // cwd for the duration, so env-var tests can't leak into their neighbours.

    #[test]
    fn the_one_where_the_toml_file_describes_the_whole_logger() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "eslog.toml",
                r#"
                [elasticsearch]
                search_url = "http://es1:9200;http://es2:9200"
                index_format = "app-{0:yyyy.MM}"
                auto_register_template = true
                register_template_failure = "FailSink"
                username = "elastic"
                password = "changeme"

                [cli]
                category = "nightly-job"
                level = "Warning"
                "#,
            )?;

            let app_config = load_config(Some(Path::new("eslog.toml")))
                .expect("💀 full config should parse");

            let es = &app_config.elasticsearch;
            assert_eq!(es.search_url, "http://es1:9200;http://es2:9200");
            assert_eq!(es.index_format, "app-{0:yyyy.MM}");
            assert!(es.auto_register_template);
            assert_eq!(es.register_template_failure, RegisterTemplateRecovery::FailSink);
            assert_eq!(es.username.as_deref(), Some("elastic"));
            assert_eq!(es.type_name, "logevent");
            assert_eq!(app_config.cli.category, "nightly-job");
            assert_eq!(app_config.cli.level, LogLevel::Warning);
            Ok(())
        });
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "eslog.toml",
                r#"
                [elasticsearch]
                search_url = "http://localhost:9200"
                "#,
            )?;

            let app_config = load_config(Some(Path::new("eslog.toml")))
                .expect("💀 minimal config should parse");

            assert_eq!(app_config.elasticsearch.index_format, "logstash-{0:yyyy.MM.dd}");
            assert_eq!(app_config.elasticsearch.template_name, "eslog-events-template");
            assert!(!app_config.elasticsearch.auto_register_template);
            assert_eq!(app_config.cli.category, "eslog-cli");
            assert_eq!(app_config.cli.level, LogLevel::Information);
            assert_eq!(app_config.cli.max_events_per_request, 500);
            Ok(())
        });
    }

    #[test]
    fn the_one_where_a_typo_in_the_policy_is_caught_at_load_time() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "eslog.toml",
                r#"
                [elasticsearch]
                search_url = "http://localhost:9200"
                register_template_failure = "IndexSomewhereIGuess"
                "#,
            )?;

            let err = load_config(Some(Path::new("eslog.toml")))
                .expect_err("💀 unknown policy should not parse");
            assert!(format!("{err:#}").contains("Failed to parse configuration"));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_environment_alone_is_enough_even_with_a_numeric_password() {
        Jail::expect_with(|jail| {
            jail.set_env("ESLOG_ELASTICSEARCH__SEARCH_URL", "http://envhost:9200");
            jail.set_env("ESLOG_ELASTICSEARCH__USERNAME", "elastic");
            jail.set_env("ESLOG_ELASTICSEARCH__PASSWORD", "123456");
            jail.set_env("ESLOG_ELASTICSEARCH__AUTO_REGISTER_TEMPLATE", "true");
            jail.set_env("ESLOG_CLI__CATEGORY", "2024");

            let app_config =
                load_config(None).expect("💀 env-only config with a digit password should parse");

            let es = &app_config.elasticsearch;
            assert_eq!(es.search_url, "http://envhost:9200");
            assert_eq!(es.username.as_deref(), Some("elastic"));
            assert_eq!(es.password.as_deref(), Some("123456"));
            assert!(es.auto_register_template);
            assert_eq!(app_config.cli.category, "2024");
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_toml_file_outranks_the_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("ESLOG_ELASTICSEARCH__SEARCH_URL", "http://envhost:9200");
            jail.set_env("ESLOG_ELASTICSEARCH__PASSWORD", "987654");
            jail.create_file(
                "eslog.toml",
                r#"
                [elasticsearch]
                search_url = "http://filehost:9200"
                "#,
            )?;

            let app_config = load_config(Some(Path::new("eslog.toml")))
                .expect("💀 env + file config should parse");

            assert_eq!(app_config.elasticsearch.search_url, "http://filehost:9200");
            // keys the file doesn't mention still come from the environment
            assert_eq!(app_config.elasticsearch.password.as_deref(), Some("987654"));
            Ok(())
        });
    }
}
