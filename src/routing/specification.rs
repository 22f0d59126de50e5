//! Accessor specifications.
//!
//! # Responsibilities
//! - Describe which accessors one call should reach
//! - Distinguish by-name selection from predicate filtering in one tagged type
//! - Carry the mode predicates that split a selection into mirrors and stripes
//!
//! # Design Decisions
//! - Predicates only see descriptors, never live accessors
//! - Narrowing composes with AND semantics and extends the criteria text
//! - `criteria()` is what selection errors report

use std::fmt;
use std::sync::Arc;

use crate::accessor::{AccessMode, AccessorDescriptor, DispatchingMode};

/// Predicate over an accessor's routing snapshot.
pub type AccessorPredicate = Arc<dyn Fn(&AccessorDescriptor) -> bool + Send + Sync>;

/// Splits a selection into a mirroring and a striping subset.
#[derive(Clone)]
pub struct ModePredicates {
    pub mirroring: AccessorPredicate,
    pub striping: AccessorPredicate,
}

impl ModePredicates {
    /// Split on the accessor's declared dispatching mode.
    ///
    /// Accessors without a declared mode are treated as mirrors.
    pub fn by_dispatching_mode() -> Self {
        Self {
            mirroring: Arc::new(|d: &AccessorDescriptor| {
                matches!(d.dispatching, DispatchingMode::Default | DispatchingMode::Mirroring)
            }),
            striping: Arc::new(|d: &AccessorDescriptor| d.dispatching == DispatchingMode::Striping),
        }
    }
}

impl fmt::Debug for ModePredicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModePredicates")
    }
}

/// Selects the accessors one call is dispatched to.
#[derive(Clone)]
pub enum AccessorSpecification {
    /// Exactly one accessor, by configured name or id.
    Named(String),
    /// Every accessor satisfying `predicate`.
    ByPredicate {
        criteria: String,
        access: AccessMode,
        predicate: AccessorPredicate,
        modes: Option<ModePredicates>,
    },
}

impl AccessorSpecification {
    pub fn named(name: impl Into<String>) -> Self {
        AccessorSpecification::Named(name.into())
    }

    /// Accessors that accept reads, split by dispatching mode.
    pub fn read() -> Self {
        AccessorSpecification::ByPredicate {
            criteria: "access includes read".to_string(),
            access: AccessMode::Read,
            predicate: Arc::new(|d: &AccessorDescriptor| d.access.allows_read()),
            modes: Some(ModePredicates::by_dispatching_mode()),
        }
    }

    /// Accessors that accept writes, split by dispatching mode.
    pub fn write() -> Self {
        AccessorSpecification::ByPredicate {
            criteria: "access includes write".to_string(),
            access: AccessMode::Write,
            predicate: Arc::new(|d: &AccessorDescriptor| d.access.allows_write()),
            modes: Some(ModePredicates::by_dispatching_mode()),
        }
    }

    /// Custom filter without mode predicates. Selected accessors are kept in pool order.
    pub fn predicate<F>(criteria: impl Into<String>, access: AccessMode, predicate: F) -> Self
    where
        F: Fn(&AccessorDescriptor) -> bool + Send + Sync + 'static,
    {
        AccessorSpecification::ByPredicate {
            criteria: criteria.into(),
            access,
            predicate: Arc::new(predicate),
            modes: None,
        }
    }

    /// Attach mode predicates to a predicate specification. No-op on `Named`.
    pub fn with_modes(self, modes: ModePredicates) -> Self {
        match self {
            AccessorSpecification::ByPredicate {
                criteria,
                access,
                predicate,
                ..
            } => AccessorSpecification::ByPredicate {
                criteria,
                access,
                predicate,
                modes: Some(modes),
            },
            named => named,
        }
    }

    /// Narrow a predicate specification. `Named` is returned unchanged.
    pub fn and<F>(self, criteria: impl Into<String>, extra: F) -> Self
    where
        F: Fn(&AccessorDescriptor) -> bool + Send + Sync + 'static,
    {
        match self {
            AccessorSpecification::ByPredicate {
                criteria: base,
                access,
                predicate,
                modes,
            } => AccessorSpecification::ByPredicate {
                criteria: format!("{} and {}", base, criteria.into()),
                access,
                predicate: Arc::new(move |d: &AccessorDescriptor| predicate(d) && extra(d)),
                modes,
            },
            named => named,
        }
    }

    pub fn in_group(self, group: i32) -> Self {
        self.and(format!("group = {group}"), move |d: &AccessorDescriptor| d.group == group)
    }

    /// Human-readable description used in errors and logs.
    pub fn criteria(&self) -> String {
        match self {
            AccessorSpecification::Named(name) => format!("named '{name}'"),
            AccessorSpecification::ByPredicate { criteria, .. } => criteria.clone(),
        }
    }

    /// Returns true if the accessor satisfies this specification.
    pub fn is_satisfied_by(&self, descriptor: &AccessorDescriptor) -> bool {
        match self {
            AccessorSpecification::Named(name) => descriptor.is_named(name),
            AccessorSpecification::ByPredicate { predicate, .. } => predicate(descriptor),
        }
    }
}

impl fmt::Debug for AccessorSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessorSpecification::Named(name) => f.debug_tuple("Named").field(name).finish(),
            AccessorSpecification::ByPredicate {
                criteria,
                access,
                modes,
                ..
            } => f
                .debug_struct("ByPredicate")
                .field("criteria", criteria)
                .field("access", access)
                .field("mode_aware", &modes.is_some())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::AccessorSettings;

    fn descriptor(settings: AccessorSettings) -> AccessorDescriptor {
        AccessorDescriptor::compute(&settings, None, "utf-8")
    }

    #[test]
    fn test_named_matches_name_or_id() {
        let d = descriptor(AccessorSettings::new("a1").with_name("primary"));
        assert!(AccessorSpecification::named("primary").is_satisfied_by(&d));
        assert!(AccessorSpecification::named("a1").is_satisfied_by(&d));
        assert!(!AccessorSpecification::named("replica").is_satisfied_by(&d));
    }

    #[test]
    fn test_read_and_write() {
        let reader = descriptor(AccessorSettings::new("r").with_access(AccessMode::Read));
        let writer = descriptor(AccessorSettings::new("w").with_access(AccessMode::Write));
        let both = descriptor(AccessorSettings::new("rw"));

        let read = AccessorSpecification::read();
        assert!(read.is_satisfied_by(&reader));
        assert!(!read.is_satisfied_by(&writer));
        assert!(read.is_satisfied_by(&both));

        let write = AccessorSpecification::write();
        assert!(!write.is_satisfied_by(&reader));
        assert!(write.is_satisfied_by(&writer));
        assert!(write.is_satisfied_by(&both));
    }

    #[test]
    fn test_mode_predicates() {
        let modes = ModePredicates::by_dispatching_mode();
        let plain = descriptor(AccessorSettings::new("a"));
        let stripe = descriptor(AccessorSettings::new("b").with_dispatching(DispatchingMode::Striping));

        assert!((modes.mirroring)(&plain));
        assert!(!(modes.striping)(&plain));
        assert!((modes.striping)(&stripe));
        assert!(!(modes.mirroring)(&stripe));
    }

    #[test]
    fn test_narrowing() {
        let spec = AccessorSpecification::read().in_group(2);
        assert_eq!(spec.criteria(), "access includes read and group = 2");
        assert!(spec.is_satisfied_by(&descriptor(AccessorSettings::new("a").with_group(2))));
        assert!(!spec.is_satisfied_by(&descriptor(AccessorSettings::new("b").with_group(1))));

        let named = AccessorSpecification::named("a").in_group(2);
        assert_eq!(named.criteria(), "named 'a'");
    }

    #[test]
    fn test_custom_predicate_has_no_modes() {
        let spec = AccessorSpecification::predicate("priority < 5", AccessMode::ReadWrite, |d| {
            d.priority < 5.0
        });
        assert!(matches!(
            spec,
            AccessorSpecification::ByPredicate { modes: None, .. }
        ));
        let spec = spec.with_modes(ModePredicates::by_dispatching_mode());
        assert!(matches!(
            spec,
            AccessorSpecification::ByPredicate { modes: Some(_), .. }
        ));
    }
}
