//! Identifiers naming requestable values.
//!
//! An [`Identifier`] is the key every binding is registered under and every
//! dependency is requested by. It is a plain value: cloning is cheap,
//! equality and hashing are structural over the token and the
//! [`Annotations`], and deriving a variant never mutates the original.
//!
//! # Tokens
//!
//! - [`Identifier::new`] allocates a fresh token. Two calls with the same
//!   label produce different identifiers.
//! - [`Identifier::of`] keys the identifier by a Rust type. Every call for
//!   the same type yields an equal identifier, and resolved values are
//!   checked to actually be of that type.
//!
//! # Annotations
//!
//! Annotations refine what is requested:
//!
//! | Annotation | Meaning |
//! |------------|---------|
//! | `named` | distinguishes several values of the same token |
//! | `nullable` | a null value is acceptable |
//! | `undefinable` | an undefined value is acceptable |
//! | `supplier` | inject a callback instead of the value itself |
//! | `late_binding` | inject a handle resolved after the requester is built |
//!
//! # Example
//!
//! ```
//! use haywire_core::identifier::Identifier;
//!
//! let db = Identifier::new("db");
//! let maybe_db = db.nullable();
//!
//! assert_ne!(db, maybe_db);
//! assert_eq!(maybe_db.base_id(), db);
//! assert_eq!(maybe_db.nullable(), maybe_db);
//! assert_eq!(db.named("replica").nullable().to_string(), "db(named: replica, nullable)");
//! ```

use core::any::{Any, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::symbol::Symbol;

/// Label used by [`Identifier::anonymous`].
pub const DEFAULT_LABEL: &str = "haywire-id";

// ─────────────────────────────────────────────────────────────────────────────
// Names and supplier modes
// ─────────────────────────────────────────────────────────────────────────────

/// Value of the `named` annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Name {
    /// A plain string name.
    Str(Arc<str>),
    /// A symbol name, unique unless interned.
    Symbol(Symbol),
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(name) => f.write_str(name),
            Self::Symbol(symbol) => symbol.fmt(f),
        }
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self::Str(Arc::from(name))
    }
}

impl From<String> for Name {
    fn from(name: String) -> Self {
        Self::Str(Arc::from(name))
    }
}

impl From<Symbol> for Name {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

/// How a dependency is delivered to its provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SupplierMode {
    /// The resolved value itself.
    #[default]
    None,
    /// A synchronous callback producing the value on each call.
    Sync {
        /// Calls share the request scope of the provider that received the callback.
        propagate_scope: bool,
    },
    /// An asynchronous callback producing the value on each call.
    Async {
        /// Calls share the request scope of the provider that received the callback.
        propagate_scope: bool,
    },
}

impl SupplierMode {
    /// Returns `true` unless this is [`SupplierMode::None`].
    #[must_use]
    pub const fn is_supplier(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns `true` if calls inherit the caller's request scope.
    #[must_use]
    pub const fn propagates_scope(self) -> bool {
        matches!(
            self,
            Self::Sync {
                propagate_scope: true
            } | Self::Async {
                propagate_scope: true
            }
        )
    }
}

/// Annotation set carried by an [`Identifier`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Annotations {
    /// Optional disambiguating name.
    pub named: Option<Name>,
    /// Null values are acceptable.
    pub nullable: bool,
    /// Undefined values are acceptable.
    pub undefinable: bool,
    /// Delivery as a callback.
    pub supplier: SupplierMode,
    /// Delivery as a late binding handle.
    pub late_binding: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────────

/// Rust type attached to a type-keyed identifier.
///
/// Resolved values for identifiers carrying a tag must be of exactly this type.
#[derive(Debug, Clone, Copy)]
pub struct TypeTag {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeTag {
    /// Returns the tag for `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Returns the tagged [`TypeId`].
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the full type name of the tagged type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name without its module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let base = self
            .type_name
            .split_once('<')
            .map_or(self.type_name, |(base, _)| base);
        let start = base.rfind("::").map_or(0, |index| index + 2);
        &self.type_name[start..]
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Token {
    Unique(Symbol),
    Type(TypeTag),
}

// ─────────────────────────────────────────────────────────────────────────────
// Identifier
// ─────────────────────────────────────────────────────────────────────────────

/// Typed, annotatable token naming a requestable value.
///
/// See the [module documentation](self) for an overview.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    token: Token,
    annotations: Annotations,
}

impl Identifier {
    /// Creates a new unique identifier with the given label.
    ///
    /// The label is only used for display; it does not participate in equality.
    #[must_use]
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self {
            token: Token::Unique(Symbol::new(label)),
            annotations: Annotations::default(),
        }
    }

    /// Creates a new unique identifier labelled [`DEFAULT_LABEL`].
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(DEFAULT_LABEL)
    }

    /// Returns the identifier keyed by the type `T`.
    ///
    /// Values resolved for this identifier must be of type `T`.
    ///
    /// ```
    /// use haywire_core::identifier::Identifier;
    ///
    /// struct Database;
    ///
    /// assert_eq!(Identifier::of::<Database>(), Identifier::of::<Database>());
    /// assert_eq!(Identifier::of::<Database>().to_string(), "Database");
    /// ```
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            token: Token::Type(TypeTag::of::<T>()),
            annotations: Annotations::default(),
        }
    }

    /// Returns the display label of the underlying token.
    #[must_use]
    pub fn label(&self) -> &str {
        match &self.token {
            Token::Unique(symbol) => symbol.description(),
            Token::Type(tag) => tag.short_name(),
        }
    }

    /// Returns the type tag for identifiers created by [`Identifier::of`].
    #[must_use]
    pub fn construct(&self) -> Option<TypeTag> {
        match &self.token {
            Token::Unique(_) => None,
            Token::Type(tag) => Some(*tag),
        }
    }

    /// Returns the annotations of this identifier.
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Returns `true` if null values are acceptable.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.annotations.nullable
    }

    /// Returns `true` if undefined values are acceptable.
    #[must_use]
    pub fn is_undefinable(&self) -> bool {
        self.annotations.undefinable
    }

    /// Returns the supplier mode.
    #[must_use]
    pub fn supplier_mode(&self) -> SupplierMode {
        self.annotations.supplier
    }

    /// Returns `true` if this identifier requests a late binding.
    #[must_use]
    pub fn is_late_binding(&self) -> bool {
        self.annotations.late_binding
    }

    fn with(&self, update: impl FnOnce(&mut Annotations)) -> Self {
        let mut derived = self.clone();
        update(&mut derived.annotations);
        derived
    }

    /// Returns a variant with the `named` annotation set.
    #[must_use]
    pub fn named(&self, name: impl Into<Name>) -> Self {
        let name = name.into();
        self.with(|annotations| annotations.named = Some(name))
    }

    /// Returns a variant with the `named` annotation removed.
    #[must_use]
    pub fn unnamed(&self) -> Self {
        self.with(|annotations| annotations.named = None)
    }

    /// Returns a variant accepting null values.
    #[must_use]
    pub fn nullable(&self) -> Self {
        self.with(|annotations| annotations.nullable = true)
    }

    /// Returns a variant rejecting null values.
    #[must_use]
    pub fn non_nullable(&self) -> Self {
        self.with(|annotations| annotations.nullable = false)
    }

    /// Returns a variant accepting undefined values.
    #[must_use]
    pub fn undefinable(&self) -> Self {
        self.with(|annotations| annotations.undefinable = true)
    }

    /// Returns a variant rejecting undefined values.
    #[must_use]
    pub fn non_undefinable(&self) -> Self {
        self.with(|annotations| annotations.undefinable = false)
    }

    /// Returns a variant delivered according to `mode`.
    #[must_use]
    pub fn supplier(&self, mode: SupplierMode) -> Self {
        self.with(|annotations| annotations.supplier = mode)
    }

    /// Returns a variant delivered as a synchronous supplier.
    #[must_use]
    pub fn sync_supplier(&self, propagate_scope: bool) -> Self {
        self.supplier(SupplierMode::Sync { propagate_scope })
    }

    /// Returns a variant delivered as an asynchronous supplier.
    #[must_use]
    pub fn async_supplier(&self, propagate_scope: bool) -> Self {
        self.supplier(SupplierMode::Async { propagate_scope })
    }

    /// Returns a variant delivered as the value itself.
    #[must_use]
    pub fn no_supplier(&self) -> Self {
        self.supplier(SupplierMode::None)
    }

    /// Returns a variant delivered as a late binding.
    #[must_use]
    pub fn late_binding(&self) -> Self {
        self.with(|annotations| annotations.late_binding = true)
    }

    /// Returns a variant without the late binding annotation.
    #[must_use]
    pub fn no_late_binding(&self) -> Self {
        self.with(|annotations| annotations.late_binding = false)
    }

    /// Returns the identifier stripped of every annotation except `named`.
    ///
    /// ```
    /// use haywire_core::identifier::Identifier;
    ///
    /// let id = Identifier::new("config").named("prod");
    /// assert_eq!(id.nullable().late_binding().base_id(), id);
    /// ```
    #[must_use]
    pub fn base_id(&self) -> Self {
        Self {
            token: self.token.clone(),
            annotations: Annotations {
                named: self.annotations.named.clone(),
                ..Annotations::default()
            },
        }
    }

    /// Returns the identifier a binding must output to satisfy this one.
    ///
    /// Supplier and late binding annotations only describe delivery, so they
    /// are removed. Nullability is preserved.
    #[must_use]
    pub fn output_id(&self) -> Self {
        self.with(|annotations| {
            annotations.supplier = SupplierMode::None;
            annotations.late_binding = false;
        })
    }

    /// Returns every identifier a binding for this output satisfies.
    ///
    /// A provider of the strict value also satisfies looser requests, so the
    /// set is the output combined with each nullable/undefinable relaxation.
    /// Duplicates are removed, so a nullable output yields two identifiers and
    /// a strict one yields four.
    #[must_use]
    pub fn expand_output(&self) -> Vec<Self> {
        let output = self.output_id();
        let mut expanded = Vec::with_capacity(4);
        for nullable in [false, true] {
            for undefinable in [false, true] {
                let mut id = output.clone();
                if nullable {
                    id = id.nullable();
                }
                if undefinable {
                    id = id.undefinable();
                }
                if !expanded.contains(&id) {
                    expanded.push(id);
                }
            }
        }
        expanded
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())?;

        let annotations = &self.annotations;
        let mut parts: Vec<String> = Vec::new();
        if let Some(name) = &annotations.named {
            parts.push(format!("named: {name}"));
        }
        if annotations.nullable {
            parts.push("nullable".to_owned());
        }
        if annotations.undefinable {
            parts.push("undefinable".to_owned());
        }
        let supplier = match annotations.supplier {
            SupplierMode::None => None,
            SupplierMode::Sync { propagate_scope } => Some(("sync", propagate_scope)),
            SupplierMode::Async { propagate_scope } => Some(("async", propagate_scope)),
        };
        match supplier {
            Some((flavor, true)) => parts.push(format!("supplier({flavor}, propagating)")),
            Some((flavor, false)) => parts.push(format!("supplier({flavor})")),
            None => {}
        }
        if annotations.late_binding {
            parts.push("late-binding".to_owned());
        }

        if !parts.is_empty() {
            write!(f, "({})", parts.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identifier")
            .field(&format_args!("{self}"))
            .finish()
    }
}

/// Joins identifiers by their display form, sorted, separated by `", "`.
pub(crate) fn join_sorted(ids: &[Identifier]) -> String {
    let mut rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
    rendered.sort();
    rendered.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Widget;

    #[test]
    fn fresh_identifiers_are_distinct() {
        let first = Identifier::new("same");
        let second = Identifier::new("same");

        assert_ne!(first, second);
        assert_eq!(first, first.clone());
        assert_eq!(Identifier::anonymous().label(), DEFAULT_LABEL);
    }

    #[test]
    fn type_identifiers_are_shared() {
        let first = Identifier::of::<Widget>();
        let second = Identifier::of::<Widget>();

        assert_eq!(first, second);
        assert_eq!(first.label(), "Widget");
        assert_eq!(first.construct(), Some(TypeTag::of::<Widget>()));
        assert!(Identifier::new("x").construct().is_none());
    }

    #[test]
    fn short_name_strips_paths_and_keeps_generics() {
        let tag = TypeTag::of::<Vec<Widget>>();
        assert!(tag.short_name().starts_with("Vec<"));
        assert_eq!(TypeTag::of::<String>().short_name(), "String");
    }

    #[test]
    fn derivation_is_idempotent() {
        let id = Identifier::new("id");
        assert_eq!(id.nullable().nullable(), id.nullable());
        assert_eq!(id.nullable().non_nullable(), id);
        assert_eq!(id.late_binding().no_late_binding(), id);
        assert_eq!(id.sync_supplier(true).no_supplier(), id);
    }

    #[test]
    fn base_id_keeps_only_name() {
        let id = Identifier::new("id");
        let annotated = id
            .named("a")
            .nullable()
            .undefinable()
            .async_supplier(true)
            .late_binding();

        assert_eq!(annotated.base_id(), id.named("a"));
        assert_ne!(annotated.base_id(), id);
    }

    #[test]
    fn output_id_drops_delivery_annotations() {
        let id = Identifier::new("id").nullable();
        assert_eq!(id.sync_supplier(false).late_binding().output_id(), id);
    }

    #[test]
    fn expanded_outputs() {
        let id = Identifier::new("id");
        let strict = id.expand_output();
        assert_eq!(strict.len(), 4);
        assert!(strict.contains(&id));
        assert!(strict.contains(&id.nullable().undefinable()));

        let nullable = id.nullable().expand_output();
        assert_eq!(nullable, vec![id.nullable(), id.nullable().undefinable()]);

        let loosest = id.nullable().undefinable().expand_output();
        assert_eq!(loosest, vec![id.nullable().undefinable()]);
    }

    #[test]
    fn display_lists_annotations_in_order() {
        let id = Identifier::new("service");
        assert_eq!(id.to_string(), "service");
        assert_eq!(
            id.named("x")
                .nullable()
                .undefinable()
                .sync_supplier(true)
                .late_binding()
                .to_string(),
            "service(named: x, nullable, undefinable, supplier(sync, propagating), late-binding)"
        );
        assert_eq!(
            id.async_supplier(false).to_string(),
            "service(supplier(async))"
        );
        assert_eq!(
            id.named(Symbol::new("tag")).to_string(),
            "service(named: Symbol(tag))"
        );
    }

    #[test]
    fn join_sorted_orders_by_display() {
        let b = Identifier::new("b");
        let a = Identifier::new("a");
        assert_eq!(join_sorted(&[b, a.nullable(), a.clone()]), "a, a(nullable), b");
    }

    proptest! {
        #[test]
        fn annotation_order_does_not_matter(nullable in any::<bool>(), undefinable in any::<bool>(), late in any::<bool>()) {
            let id = Identifier::new("prop");
            let mut forward = id.clone();
            if nullable { forward = forward.nullable(); }
            if undefinable { forward = forward.undefinable(); }
            if late { forward = forward.late_binding(); }

            let mut backward = id.clone();
            if late { backward = backward.late_binding(); }
            if undefinable { backward = backward.undefinable(); }
            if nullable { backward = backward.nullable(); }

            prop_assert_eq!(&forward, &backward);
            prop_assert_eq!(forward.base_id(), id);
        }
    }
}
