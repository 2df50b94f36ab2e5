//! 🎯 Index resolution: "which index does this log event go to?"
//!
//! 🎬 *[a log event arrives. it has a timestamp and hopes.]*
//! *[somewhere upstream, a template registration either worked or didn't.]*
//! *[the resolver checks a flag. the event learns its fate.]*
//!
//! 🧠 Knowledge graph:
//! - Options are validated once, in `IndexResolver::new`. Invalid options never produce a resolver.
//! - The naming strategy is picked once: the caller's decider, or a formatter over `index_format`.
//! - `TemplateRegistration` is a tiny lifecycle: `Pending` → `Resolved { succeeded }`.
//!   Only `Pending` exists when auto registration is on. Turning it off starts us resolved.
//! - Dead-letter routing happens iff registration has not succeeded AND the policy is
//!   `IndexToDeadletterIndex`. Every other combination uses the normal strategy.
//! - `record_template_registration_outcome` takes `&mut self`. Startup owns the resolver
//!   while it registers; shared `&self` lookups only begin after. The borrow checker enforces
//!   the ordering so nobody has to remember it.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::index_format::IndexFormat;
use crate::log_message::LogMessage;
use crate::options::{EsLoggerOptions, IndexDecider, RegisterTemplateRecovery};

/// 🔄 Where the template registration stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateRegistration {
    /// Registration is required and nothing has been recorded yet.
    Pending,
    /// Outcome is known. `succeeded: true` also covers "registration was never required".
    Resolved { succeeded: bool },
}

impl TemplateRegistration {
    pub fn succeeded(self) -> bool {
        matches!(self, Self::Resolved { succeeded: true })
    }
}

/// 🧭 The per-event naming strategy, resolved once at construction.
#[derive(Clone)]
enum IndexStrategy {
    Decider(IndexDecider),
    Format(IndexFormat),
}

impl IndexStrategy {
    fn index_for(&self, event: &LogMessage) -> String {
        match self {
            Self::Decider(decide) => decide(event),
            Self::Format(format) => format.format(&event.timestamp),
        }
    }
}

/// 📦 Validated options plus the one bit of state that changes after startup.
#[derive(Clone)]
pub struct IndexResolver {
    strategy: IndexStrategy,
    dead_letter: IndexFormat,
    template_match_string: String,
    template_name: String,
    type_name: String,
    recovery: RegisterTemplateRecovery,
    registration: TemplateRegistration,
}

impl IndexResolver {
    /// 🚀 Validate `options` and build the resolver. No network, no side effects.
    ///
    /// Blank required options fail in this order: `search_url`, `index_format`,
    /// `type_name`, `template_name`. The first one found is the one reported.
    pub fn new(options: &EsLoggerOptions) -> Result<Self, ConfigurationError> {
        require("search_url", &options.search_url)?;
        require("index_format", &options.index_format)?;
        require("type_name", &options.type_name)?;
        require("template_name", &options.template_name)?;

        let index_format = IndexFormat::parse("index_format", &options.index_format)?;
        let dead_letter =
            IndexFormat::parse("dead_letter_index_name", &options.dead_letter_index_name)?;
        let template_match_string = index_format.wildcard();

        let strategy = match &options.index_decider {
            Some(decider) => IndexStrategy::Decider(Arc::clone(decider)),
            None => IndexStrategy::Format(index_format),
        };

        let registration = if options.auto_register_template {
            TemplateRegistration::Pending
        } else {
            TemplateRegistration::Resolved { succeeded: true }
        };

        debug!(
            "🎯 Index resolver ready: template '{}' matches '{}', registration {:?}",
            options.template_name, template_match_string, registration
        );

        Ok(Self {
            strategy,
            dead_letter,
            template_match_string,
            template_name: options.template_name.clone(),
            type_name: options.type_name.clone(),
            recovery: options.register_template_failure,
            registration,
        })
    }

    /// 📡 The index `event` should be written to.
    ///
    /// `timestamp` only feeds the dead-letter name; the normal strategy reads the event.
    pub fn resolve_index_name(&self, event: &LogMessage, timestamp: &DateTime<FixedOffset>) -> String {
        if !self.registration.succeeded()
            && self.recovery == RegisterTemplateRecovery::IndexToDeadletterIndex
        {
            return self.dead_letter.format(timestamp);
        }
        self.strategy.index_for(event)
    }

    /// ✍️ Record how the template registration went.
    ///
    /// Meant to be called once. A second call overwrites the first; it never errors.
    pub fn record_template_registration_outcome(&mut self, success: bool) {
        if let TemplateRegistration::Resolved { succeeded } = self.registration {
            debug!(
                "🔄 Template registration outcome overwritten: {} -> {}",
                succeeded, success
            );
        }
        self.registration = TemplateRegistration::Resolved { succeeded: success };
    }

    pub fn template_registration_succeeded(&self) -> bool {
        self.registration.succeeded()
    }

    pub fn registration(&self) -> TemplateRegistration {
        self.registration
    }

    /// 🎯 `index_format` with its placeholder swapped for `*`.
    pub fn template_match_string(&self) -> &str {
        &self.template_match_string
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn recovery(&self) -> RegisterTemplateRecovery {
        self.recovery
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigurationError> {
    if value.trim().is_empty() {
        return Err(ConfigurationError::MissingField(field));
    }
    Ok(())
}

impl fmt::Debug for IndexResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match &self.strategy {
            IndexStrategy::Decider(_) => "<decider fn>".to_string(),
            IndexStrategy::Format(format) => format.as_str().to_string(),
        };
        f.debug_struct("IndexResolver")
            .field("strategy", &strategy)
            .field("dead_letter", &self.dead_letter.as_str())
            .field("template_match_string", &self.template_match_string)
            .field("template_name", &self.template_name)
            .field("type_name", &self.type_name)
            .field("recovery", &self.recovery)
            .field("registration", &self.registration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_message::LogLevel;
    use chrono::TimeZone;

    fn jan_15_2024() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("💀 UTC exists")
            .with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
            .single()
            .expect("💀 unambiguous")
    }

    fn event() -> LogMessage {
        LogMessage::new(jan_15_2024(), LogLevel::Information, "tests", "hello")
    }

    fn options(auto_register: bool, recovery: RegisterTemplateRecovery) -> EsLoggerOptions {
        EsLoggerOptions {
            index_format: "logs-{0:yyyy.MM}".to_string(),
            dead_letter_index_name: "deadletter-{0:yyyy.MM.dd}".to_string(),
            auto_register_template: auto_register,
            register_template_failure: recovery,
            ..EsLoggerOptions::new("http://localhost:9200")
        }
    }

    #[test]
    fn the_one_where_the_flag_starts_as_the_opposite_of_auto_register() {
        for auto in [true, false] {
            let resolver = IndexResolver::new(&options(auto, RegisterTemplateRecovery::IndexAnyway))
                .expect("💀 valid options should build");
            assert_eq!(resolver.template_registration_succeeded(), !auto);
        }
        let resolver = IndexResolver::new(&options(true, RegisterTemplateRecovery::IndexAnyway))
            .expect("💀 valid options should build");
        assert_eq!(resolver.registration(), TemplateRegistration::Pending);
    }

    #[test]
    fn the_one_where_each_blank_field_gets_named_and_shamed() {
        let cases: [(&str, fn(&mut EsLoggerOptions)); 4] = [
            ("search_url", |o| o.search_url = String::new()),
            ("index_format", |o| o.index_format = "   ".to_string()),
            ("type_name", |o| o.type_name = String::new()),
            ("template_name", |o| o.template_name = "\t".to_string()),
        ];
        for (field, blank_it) in cases {
            let mut opts = options(false, RegisterTemplateRecovery::IndexAnyway);
            blank_it(&mut opts);
            match IndexResolver::new(&opts) {
                Err(ConfigurationError::MissingField(name)) => assert_eq!(name, field),
                other => panic!("💀 expected MissingField({field}), got {other:?}"),
            }
        }
    }

    #[test]
    fn the_one_where_the_first_missing_field_wins() {
        let mut opts = options(false, RegisterTemplateRecovery::IndexAnyway);
        opts.type_name = String::new();
        opts.search_url = String::new();
        assert!(matches!(
            IndexResolver::new(&opts),
            Err(ConfigurationError::MissingField("search_url"))
        ));
    }

    #[test]
    fn the_one_where_a_placeholderless_dead_letter_name_is_rejected() {
        let mut opts = options(true, RegisterTemplateRecovery::IndexToDeadletterIndex);
        opts.dead_letter_index_name = "deadletter".to_string();
        assert!(matches!(
            IndexResolver::new(&opts),
            Err(ConfigurationError::InvalidIndexFormat { field: "dead_letter_index_name", .. })
        ));
    }

    #[test]
    fn the_one_where_the_match_string_is_just_a_star_in_disguise() {
        let resolver = IndexResolver::new(&options(false, RegisterTemplateRecovery::IndexAnyway))
            .expect("💀 valid options should build");
        assert_eq!(resolver.template_match_string(), "logs-*");
    }

    #[test]
    fn the_one_where_no_registration_means_no_dead_letters_ever() {
        for recovery in [
            RegisterTemplateRecovery::IndexAnyway,
            RegisterTemplateRecovery::IndexToDeadletterIndex,
            RegisterTemplateRecovery::FailSink,
        ] {
            let resolver = IndexResolver::new(&options(false, recovery))
                .expect("💀 valid options should build");
            let flush_time = FixedOffset::east_opt(0)
                .expect("💀 UTC exists")
                .with_ymd_and_hms(1999, 12, 31, 23, 59, 59)
                .single()
                .expect("💀 unambiguous");
            assert_eq!(resolver.resolve_index_name(&event(), &jan_15_2024()), "logs-2024.01");
            assert_eq!(resolver.resolve_index_name(&event(), &flush_time), "logs-2024.01");
        }
    }

    #[test]
    fn the_one_where_pending_registration_sends_everything_to_the_dead_letter_index() {
        let resolver =
            IndexResolver::new(&options(true, RegisterTemplateRecovery::IndexToDeadletterIndex))
                .expect("💀 valid options should build");
        assert_eq!(
            resolver.resolve_index_name(&event(), &jan_15_2024()),
            "deadletter-2024.01.15"
        );
    }

    #[test]
    fn the_one_where_success_brings_the_events_home() {
        let mut resolver =
            IndexResolver::new(&options(true, RegisterTemplateRecovery::IndexToDeadletterIndex))
                .expect("💀 valid options should build");
        resolver.record_template_registration_outcome(true);
        assert_eq!(resolver.resolve_index_name(&event(), &jan_15_2024()), "logs-2024.01");
    }

    #[test]
    fn the_one_where_failure_only_matters_for_the_dead_letter_policy() {
        for recovery in [RegisterTemplateRecovery::IndexAnyway, RegisterTemplateRecovery::FailSink] {
            let mut resolver = IndexResolver::new(&options(true, recovery))
                .expect("💀 valid options should build");
            resolver.record_template_registration_outcome(false);
            assert_eq!(resolver.resolve_index_name(&event(), &jan_15_2024()), "logs-2024.01");
        }

        let mut resolver =
            IndexResolver::new(&options(true, RegisterTemplateRecovery::IndexToDeadletterIndex))
                .expect("💀 valid options should build");
        resolver.record_template_registration_outcome(false);
        assert_eq!(
            resolver.registration(),
            TemplateRegistration::Resolved { succeeded: false }
        );
        assert_eq!(
            resolver.resolve_index_name(&event(), &jan_15_2024()),
            "deadletter-2024.01.15"
        );
    }

    #[test]
    fn the_one_where_a_second_outcome_overwrites_the_first() {
        let mut resolver =
            IndexResolver::new(&options(true, RegisterTemplateRecovery::IndexToDeadletterIndex))
                .expect("💀 valid options should build");
        resolver.record_template_registration_outcome(false);
        resolver.record_template_registration_outcome(true);
        assert!(resolver.template_registration_succeeded());
        assert_eq!(resolver.resolve_index_name(&event(), &jan_15_2024()), "logs-2024.01");
    }

    #[test]
    fn the_one_where_the_caller_brings_their_own_decider() {
        let opts = options(false, RegisterTemplateRecovery::IndexAnyway)
            .with_index_decider(|e: &LogMessage| format!("by-category-{}", e.category));
        let resolver = IndexResolver::new(&opts).expect("💀 valid options should build");
        assert_eq!(resolver.resolve_index_name(&event(), &jan_15_2024()), "by-category-tests");
        // the match string still comes from index_format
        assert_eq!(resolver.template_match_string(), "logs-*");
    }

    #[test]
    fn the_one_where_asking_twice_gets_the_same_answer() {
        let resolver =
            IndexResolver::new(&options(true, RegisterTemplateRecovery::IndexToDeadletterIndex))
                .expect("💀 valid options should build");
        let first = resolver.resolve_index_name(&event(), &jan_15_2024());
        for _ in 0..5 {
            assert_eq!(resolver.resolve_index_name(&event(), &jan_15_2024()), first);
        }
    }
}
