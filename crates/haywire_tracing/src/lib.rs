//! Tracing subscriber setup for haywire applications.
//!
//! Containers emit `tracing` events and spans on their own; this crate only
//! installs a subscriber that prints them. Every top-level request runs in a
//! `haywire.request` span carrying the container label and the requested
//! identifier, and every supplier invocation in a `haywire.supplier` span.
//!
//! | Level | Events |
//! |-------|--------|
//! | `debug` | container creation and validation, preloading, request failures, factory registrations |
//! | `warn` | containers failing validation |
//! | `trace` | supplier invocation spans |
//!
//! # Example
//!
//! ```
//! use haywire_tracing::{TracingFormat, TracingSetup};
//! use tracing::Level;
//!
//! let config = TracingSetup::default()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Compact)
//!     .with_env_filter("haywire_container=debug,hyper=warn")
//!     .init();
//!
//! assert_eq!(config.level, Level::DEBUG);
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig
// ─────────────────────────────────────────────────────────────────────────────

/// The configuration a subscriber was installed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    /// The configured log level.
    pub level: Level,
    /// The configured output format.
    pub format: TracingFormat,
}

/// Errors from [`TracingSetup::try_init`].
#[derive(Debug, Error)]
pub enum TracingError {
    /// The filter directives could not be parsed.
    #[error("invalid tracing filter {directives:?}: {source}")]
    InvalidFilter {
        /// The directives as given.
        directives: String,
        /// Parser error.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// A global subscriber is already installed.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingSetup
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for the global tracing subscriber.
///
/// # Configuration Options
///
/// ```
/// use haywire_tracing::{TracingFormat, TracingSetup};
/// use tracing::Level;
///
/// // Development: pretty output, request spans shown as they open and close
/// let dev = TracingSetup::default()
///     .with_level(Level::DEBUG)
///     .with_format(TracingFormat::Pretty)
///     .with_span_events(true);
///
/// // Production: JSON output for log aggregation
/// let prod = TracingSetup::default()
///     .with_level(Level::INFO)
///     .with_format(TracingFormat::Json)
///     .with_env_filter("haywire_container=info,hyper=warn");
/// ```
#[derive(Debug, Clone)]
pub struct TracingSetup {
    /// Maximum log level.
    level: Level,
    /// Output format.
    format: TracingFormat,
    /// Filter directives (e.g., `"haywire_container=debug,hyper=warn"`).
    env_filter: Option<String>,
    /// Whether to include span enter/exit events.
    span_events: bool,
}

impl Default for TracingSetup {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingSetup {
    /// Creates a setup with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets filter directives.
    ///
    /// Format: `target=level,target=level,...`
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Returns the configuration this setup installs.
    #[must_use]
    pub fn config(&self) -> TracingConfig {
        TracingConfig {
            level: self.level,
            format: self.format,
        }
    }

    fn filter(&self) -> Result<EnvFilter, TracingError> {
        match &self.env_filter {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|source| TracingError::InvalidFilter {
                    directives: directives.clone(),
                    source,
                })
            }
            None => Ok(EnvFilter::new(self.level.as_str())),
        }
    }

    /// Installs the global subscriber.
    ///
    /// # Errors
    ///
    /// - [`TracingError::InvalidFilter`] if the filter directives do not parse
    /// - [`TracingError::AlreadyInitialized`] if a global subscriber exists
    pub fn try_init(&self) -> Result<TracingConfig, TracingError> {
        let env_filter = self.filter()?;
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let installed = match self.format {
            TracingFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(span_events),
                )
                .try_init(),
            TracingFormat::Compact => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_span_events(span_events),
                )
                .try_init(),
            TracingFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_span_events(span_events),
                )
                .try_init(),
        };
        installed.map_err(|_| TracingError::AlreadyInitialized)?;

        tracing::info!(
            level = %self.level,
            format = ?self.format,
            "haywire tracing initialized"
        );
        Ok(self.config())
    }

    /// Installs the global subscriber, keeping any existing one.
    ///
    /// Invalid filter directives fall back to the configured level.
    pub fn init(&self) -> TracingConfig {
        match self.try_init() {
            Ok(config) => config,
            Err(TracingError::InvalidFilter { .. }) => Self {
                env_filter: None,
                ..self.clone()
            }
            .try_init()
            .ok()
            .unwrap_or_else(|| self.config()),
            Err(TracingError::AlreadyInitialized) => self.config(),
        }
    }
}
