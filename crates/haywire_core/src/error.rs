//! Error types.
//!
//! Errors come in two families:
//!
//! - [`ValidationError`] describes a module or container that can never
//!   resolve correctly. These are deterministic for a given set of bindings
//!   and are raised while building, never deferred to the first request.
//! - [`ResolveError`] describes a failed resolution attempt: a provider
//!   returned an unacceptable value or failed outright. Concurrent failures
//!   are aggregated into a flat [`MultiError`].
//!
//! Every message lists identifiers in sorted order so output is stable
//! across runs.
//!
//! All errors are `Clone`: a failed in-flight singleton resolution is shared
//! with every caller awaiting it.

use core::error::Error as StdError;
use core::fmt;
use std::sync::Arc;

use hashbrown::HashSet;
use thiserror::Error;

use crate::identifier::{Identifier, join_sorted};

// ─────────────────────────────────────────────────────────────────────────────
// Validation errors
// ─────────────────────────────────────────────────────────────────────────────

/// A binding that receives a synchronous supplier over a value that can only
/// be produced asynchronously.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnsafeSupplier {
    /// Output of the binding declaring the dependency.
    pub binding_output_id: Identifier,
    /// The offending `supplier(sync)` dependency.
    pub supplier_id: Identifier,
}

impl fmt::Display for UnsafeSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[output id: {}, dependency supplier id: {}]",
            self.binding_output_id, self.supplier_id
        )
    }
}

/// Structural problems with a module or container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two bindings claim the same output.
    #[error("Duplicate output identifier for module: {}", join_sorted(.output_ids))]
    DuplicateOutput {
        /// Base identifiers of the overlapping outputs, sorted.
        output_ids: Vec<Identifier>,
    },

    /// Dependencies no binding provides.
    #[error("Providers missing for container: {}", join_sorted(.dependency_ids))]
    ProviderMissing {
        /// Unsatisfied dependency identifiers, sorted.
        dependency_ids: Vec<Identifier>,
    },

    /// Dependency cycles not broken by a late binding.
    #[error("Circular dependencies detected in container: {}", join_chains(.chains))]
    CircularDependency {
        /// Each cycle rotated to its smallest form, the list sorted.
        chains: Vec<Vec<Identifier>>,
    },

    /// Synchronous suppliers that would need to wait on an async provider.
    #[error(
        "Binding has dependency on syncronous supplier that must be async: {}",
        join_unsafe(.bindings)
    )]
    SyncSupplier {
        /// Offending bindings, sorted by their rendering.
        bindings: Vec<UnsafeSupplier>,
    },
}

impl ValidationError {
    /// Builds a [`ValidationError::DuplicateOutput`] with deduplicated, sorted ids.
    #[must_use]
    pub fn duplicate_output(ids: impl IntoIterator<Item = Identifier>) -> Self {
        Self::DuplicateOutput {
            output_ids: sorted_unique(ids),
        }
    }

    /// Builds a [`ValidationError::ProviderMissing`] with deduplicated, sorted ids.
    #[must_use]
    pub fn provider_missing(ids: impl IntoIterator<Item = Identifier>) -> Self {
        Self::ProviderMissing {
            dependency_ids: sorted_unique(ids),
        }
    }

    /// Builds a [`ValidationError::CircularDependency`].
    ///
    /// Cycles over the same members are reported once. Each cycle is rotated
    /// so its rendering is the smallest of all rotations, and the cycles are
    /// sorted by rendering. The report is therefore the same no matter where
    /// cycle detection started.
    #[must_use]
    pub fn circular_dependency(chains: impl IntoIterator<Item = Vec<Identifier>>) -> Self {
        let mut seen: Vec<HashSet<Identifier>> = Vec::new();
        let mut canonical: Vec<(String, Vec<Identifier>)> = Vec::new();

        for chain in chains {
            let members: HashSet<Identifier> = chain.iter().cloned().collect();
            if seen.contains(&members) {
                continue;
            }
            seen.push(members);

            let best = (0..chain.len())
                .map(|start| {
                    let rotated: Vec<Identifier> = chain[start..]
                        .iter()
                        .chain(&chain[..start])
                        .cloned()
                        .collect();
                    (render_chain(&rotated), rotated)
                })
                .min_by(|(left, _), (right, _)| left.cmp(right));
            if let Some(best) = best {
                canonical.push(best);
            }
        }

        canonical.sort_by(|(left, _), (right, _)| left.cmp(right));
        Self::CircularDependency {
            chains: canonical.into_iter().map(|(_, chain)| chain).collect(),
        }
    }

    /// Builds a [`ValidationError::SyncSupplier`] sorted by rendering.
    #[must_use]
    pub fn sync_supplier(bindings: impl IntoIterator<Item = UnsafeSupplier>) -> Self {
        let mut bindings: Vec<(String, UnsafeSupplier)> = bindings
            .into_iter()
            .map(|binding| (binding.to_string(), binding))
            .collect();
        bindings.sort_by(|(left, _), (right, _)| left.cmp(right));
        bindings.dedup_by(|(left, _), (right, _)| left == right);
        Self::SyncSupplier {
            bindings: bindings.into_iter().map(|(_, binding)| binding).collect(),
        }
    }
}

fn sorted_unique(ids: impl IntoIterator<Item = Identifier>) -> Vec<Identifier> {
    let mut unique: Vec<(String, Identifier)> = Vec::new();
    for id in ids {
        if unique.iter().all(|(_, existing)| *existing != id) {
            unique.push((id.to_string(), id));
        }
    }
    unique.sort_by(|(left, _), (right, _)| left.cmp(right));
    unique.into_iter().map(|(_, id)| id).collect()
}

fn render_chain(chain: &[Identifier]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("->")
}

fn join_chains(chains: &[Vec<Identifier>]) -> String {
    chains
        .iter()
        .map(|chain| render_chain(chain))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_unsafe(bindings: &[UnsafeSupplier]) -> String {
    bindings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider errors
// ─────────────────────────────────────────────────────────────────────────────

/// An error returned by a user provider.
///
/// Any `std::error::Error + Send + Sync` converts into a `ProviderError`, so
/// providers can use `?` on their own fallible calls. The wrapped error is
/// surfaced to the caller unchanged.
///
/// # Example
///
/// ```
/// use haywire_core::error::ProviderError;
///
/// fn parse(port: &str) -> Result<u16, ProviderError> {
///     Ok(port.parse::<u16>()?)
/// }
///
/// let error = parse("http").unwrap_err();
/// assert!(error.downcast_ref::<std::num::ParseIntError>().is_some());
/// assert_eq!(ProviderError::msg("boom").to_string(), "boom");
/// ```
#[derive(Clone)]
pub struct ProviderError(Arc<dyn StdError + Send + Sync + 'static>);

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

impl ProviderError {
    /// Wraps an error value.
    #[must_use]
    pub fn new<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Self(Arc::new(error))
    }

    /// Creates an error carrying only a message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Borrows the wrapped error as `E` if it is one.
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl<E: StdError + Send + Sync + 'static> From<E> for ProviderError {
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failure to produce a requested value.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The container itself is invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A provider returned null for an output that is not nullable.
    #[error("Null value returned for non-nullable provider: {output_id}")]
    NullResponse {
        /// Output of the offending binding.
        output_id: Identifier,
    },

    /// A provider returned undefined for an output that is not undefinable.
    #[error("Undefined value returned for non-undefinable provider: {output_id}")]
    UndefinedResponse {
        /// Output of the offending binding.
        output_id: Identifier,
    },

    /// A provider returned a value of the wrong type for a type-keyed output.
    #[error("Value {type_name} returned by provider is not instance of type: {output_id}")]
    InstanceOf {
        /// Output of the offending binding.
        output_id: Identifier,
        /// Type name of the returned value.
        type_name: &'static str,
    },

    /// Several independent resolutions failed.
    #[error(transparent)]
    Multi(#[from] MultiError),

    /// A provider failed on its own.
    #[error("{0}")]
    Provider(ProviderError),

    /// A resolved dependency could not be converted to the provider's parameter type.
    #[error("Dependency #{index} cannot be injected as {expected}: received {found}")]
    Injection {
        /// Position of the dependency.
        index: usize,
        /// Parameter type the provider declared.
        expected: &'static str,
        /// What was actually resolved.
        found: &'static str,
    },

    /// The provider takes a different number of parameters than declared dependencies.
    #[error("Provider expects {expected} dependencies but {found} were declared")]
    Arity {
        /// Parameters taken by the provider.
        expected: usize,
        /// Dependencies declared on the binding.
        found: usize,
    },

    /// An async provider was reached on a synchronous resolution path.
    #[error("Asynchronous provider cannot be resolved synchronously: {output_id}")]
    AsyncInSyncContext {
        /// Output of the async binding.
        output_id: Identifier,
    },

    /// A late binding was dropped before its target was resolved.
    #[error("Late binding was abandoned before it resolved: {id}")]
    LateBindingAbandoned {
        /// Identifier the late binding was waiting for.
        id: Identifier,
    },

    /// A cached resolution other callers were waiting on stopped without an
    /// outcome, because its provider panicked.
    #[error("Resolution was abandoned before it completed: {id}")]
    ResolutionAbandoned {
        /// Output of the binding being resolved.
        id: Identifier,
    },

    /// A supplier outlived the container that created it.
    #[error("Container was dropped before supplier was called: {id}")]
    ContainerDropped {
        /// Identifier the supplier resolves.
        id: Identifier,
    },
}

impl ResolveError {
    /// Converts a provider failure, unwrapping resolution errors that a
    /// provider passed through (for example from calling a supplier).
    #[must_use]
    pub fn from_provider(error: ProviderError) -> Self {
        match error.downcast_ref::<Self>() {
            Some(inner) => inner.clone(),
            None => Self::Provider(error),
        }
    }

    /// Combines failures: a single failure is returned unchanged, several
    /// become a [`MultiError`].
    #[must_use]
    pub fn from_failures(mut failures: Vec<Self>) -> Self {
        if failures.len() == 1
            && let Some(only) = failures.pop()
        {
            return only;
        }
        Self::Multi(MultiError::new(failures))
    }

    /// Collects results, failing with every error if any failed.
    ///
    /// # Errors
    ///
    /// Returns the failure itself when exactly one result failed, or a
    /// [`MultiError`] of all failures in input order otherwise.
    pub fn settle<T>(
        results: impl IntoIterator<Item = Result<T, Self>>,
    ) -> Result<Vec<T>, Self> {
        let mut values = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(value) => values.push(value),
                Err(error) => failures.push(error),
            }
        }

        if failures.is_empty() {
            Ok(values)
        } else {
            Err(Self::from_failures(failures))
        }
    }
}

/// Aggregate of several failures.
///
/// The cause list is always flat: nested multi-errors are spliced in.
///
/// ```
/// use haywire_core::error::{MultiError, ProviderError, ResolveError};
///
/// let inner = MultiError::new([
///     ResolveError::Provider(ProviderError::msg("a")),
///     ResolveError::Provider(ProviderError::msg("b")),
/// ]);
/// let outer = MultiError::new([
///     ResolveError::Multi(inner),
///     ResolveError::Provider(ProviderError::msg("c")),
/// ]);
///
/// assert_eq!(outer.causes().len(), 3);
/// assert_eq!(outer.to_string(), "Multiple errors: [a, b, c]");
/// ```
#[derive(Debug, Clone)]
pub struct MultiError {
    causes: Vec<ResolveError>,
}

impl MultiError {
    /// Creates a multi-error, flattening nested multi-errors.
    #[must_use]
    pub fn new(errors: impl IntoIterator<Item = ResolveError>) -> Self {
        let mut causes = Vec::new();
        for error in errors {
            match error {
                ResolveError::Multi(multi) => causes.extend(multi.causes),
                other => causes.push(other),
            }
        }
        Self { causes }
    }

    /// Returns the individual failures in order.
    #[must_use]
    pub fn causes(&self) -> &[ResolveError] {
        &self.causes
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.causes.iter().map(ToString::to_string).collect();
        write!(f, "Multiple errors: [{}]", messages.join(", "))
    }
}

impl StdError for MultiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.causes.first().map(|cause| cause as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Identifier, Identifier, Identifier) {
        (
            Identifier::new("a"),
            Identifier::new("b"),
            Identifier::new("c"),
        )
    }

    #[test]
    fn duplicate_output_message_is_sorted() {
        let (a, b, _) = ids();
        let error = ValidationError::duplicate_output([b.clone(), a.clone(), b]);

        assert_eq!(
            error.to_string(),
            "Duplicate output identifier for module: a, b"
        );
    }

    #[test]
    fn provider_missing_message() {
        let (a, _, c) = ids();
        let error = ValidationError::provider_missing([c, a.nullable()]);
        assert_eq!(
            error.to_string(),
            "Providers missing for container: a(nullable), c"
        );
    }

    #[test]
    fn cycles_are_canonical_and_deduplicated() {
        let (a, b, c) = ids();
        let error = ValidationError::circular_dependency([
            vec![b.clone(), c.clone(), a.clone()],
            vec![c.clone(), a.clone(), b.clone()],
            vec![b.clone(), a.clone()],
        ]);

        assert_eq!(
            error.to_string(),
            "Circular dependencies detected in container: a->b, a->b->c"
        );
        let ValidationError::CircularDependency { chains } = error else {
            panic!("expected circular dependency error");
        };
        assert_eq!(chains, vec![vec![a.clone(), b.clone()], vec![a, b, c]]);
    }

    #[test]
    fn sync_supplier_message() {
        let (a, b, c) = ids();
        let error = ValidationError::sync_supplier([
            UnsafeSupplier {
                binding_output_id: c,
                supplier_id: a.sync_supplier(false),
            },
            UnsafeSupplier {
                binding_output_id: b,
                supplier_id: a.sync_supplier(true),
            },
        ]);

        assert_eq!(
            error.to_string(),
            "Binding has dependency on syncronous supplier that must be async: \
             [output id: b, dependency supplier id: a(supplier(sync, propagating))], \
             [output id: c, dependency supplier id: a(supplier(sync))]"
        );
    }

    #[test]
    fn instance_error_messages() {
        let (a, _, _) = ids();
        assert_eq!(
            ResolveError::NullResponse {
                output_id: a.clone()
            }
            .to_string(),
            "Null value returned for non-nullable provider: a"
        );
        assert_eq!(
            ResolveError::UndefinedResponse {
                output_id: a.clone()
            }
            .to_string(),
            "Undefined value returned for non-undefinable provider: a"
        );
        assert_eq!(
            ResolveError::InstanceOf {
                output_id: a,
                type_name: "u32"
            }
            .to_string(),
            "Value u32 returned by provider is not instance of type: a"
        );
    }

    #[test]
    fn settle_returns_single_failure_unchanged() {
        let result = ResolveError::settle([
            Ok(1),
            Err(ResolveError::Provider(ProviderError::msg("only"))),
            Ok(2),
        ]);
        let error = result.unwrap_err();
        assert!(matches!(error, ResolveError::Provider(_)));
        assert_eq!(error.to_string(), "only");
    }

    #[test]
    fn settle_aggregates_in_order() {
        let result: Result<Vec<u8>, _> = ResolveError::settle([
            Err(ResolveError::Provider(ProviderError::msg("first"))),
            Err(ResolveError::Provider(ProviderError::msg("second"))),
        ]);
        let ResolveError::Multi(multi) = result.unwrap_err() else {
            panic!("expected multi error");
        };
        assert_eq!(multi.causes().len(), 2);
        assert_eq!(multi.to_string(), "Multiple errors: [first, second]");
        assert_eq!(multi.source().map(ToString::to_string).as_deref(), Some("first"));
    }

    #[test]
    fn provider_errors_unwrap_resolution_errors() {
        let (a, _, _) = ids();
        let inner = ResolveError::NullResponse { output_id: a };
        let wrapped = ProviderError::new(inner);

        assert!(matches!(
            ResolveError::from_provider(wrapped),
            ResolveError::NullResponse { .. }
        ));
        assert!(matches!(
            ResolveError::from_provider(ProviderError::msg("x")),
            ResolveError::Provider(_)
        ));
    }
}
