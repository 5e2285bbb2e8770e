//! Container construction options.

/// Label used when none is configured.
pub const DEFAULT_CONTAINER_LABEL: &str = "container";

/// Options applied when a container is created.
///
/// # Example
///
/// ```
/// use haywire_container::config::ContainerConfig;
///
/// let config = ContainerConfig::default()
///     .with_label("billing")
///     .with_validate_on_create(false);
///
/// assert_eq!(config.label(), "billing");
/// assert!(!config.validate_on_create());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Name attached to the `haywire.request` span of every request.
    label: String,
    /// Whether creation validates and wires the graph.
    validate_on_create: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_CONTAINER_LABEL.to_owned(),
            validate_on_create: true,
        }
    }
}

impl ContainerConfig {
    /// Sets the label used in tracing spans.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets whether creation fails fast on an invalid graph.
    ///
    /// When disabled, validation runs on the first request instead and every
    /// request reports the same error.
    #[must_use]
    pub fn with_validate_on_create(mut self, validate: bool) -> Self {
        self.validate_on_create = validate;
        self
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns whether creation validates the graph.
    #[must_use]
    pub fn validate_on_create(&self) -> bool {
        self.validate_on_create
    }
}
