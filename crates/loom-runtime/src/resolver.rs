//! Dependency resolution
//!
//! Expands a set of types into the compiled units source mentioning them
//! needs in scope. Types are visited depth-first through their generic
//! arguments; each visited type contributes its declaring unit, and each
//! unit contributes the units it declares as dependencies. Units are
//! deduplicated by location, so two types from the same origin add one
//! reference.

use std::sync::Arc;

use loom_sdk::{core_types, TypeDescriptor, TypeKind, UnitDescriptor};
use rustc_hash::FxHashSet;

use crate::error::RuntimeError;

/// Compile-time references for one generation session.
///
/// Only grows. The core unit is always present.
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    units: Vec<Arc<UnitDescriptor>>,
    locations: FxHashSet<String>,
    /// Keys of types already walked
    visited: FxHashSet<String>,
}

impl Default for ReferenceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceSet {
    pub fn new() -> Self {
        let core = core_types().unit.clone();
        let mut locations = FxHashSet::default();
        if let Some(location) = core.location() {
            locations.insert(location.to_string());
        }
        Self {
            units: vec![core],
            locations,
            visited: FxHashSet::default(),
        }
    }

    pub fn units(&self) -> &[Arc<UnitDescriptor>] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains_location(&self, location: &str) -> bool {
        self.locations.contains(location)
    }

    /// Add the units `ty` needs. Returns how many units were new.
    ///
    /// Fails without modifying the set if any unit on the way has no
    /// location.
    pub fn add_type(&mut self, ty: &Arc<TypeDescriptor>) -> Result<usize, RuntimeError> {
        self.add_types(std::slice::from_ref(ty))
    }

    /// Add the units every type in `types` needs, all or nothing.
    pub fn add_types(&mut self, types: &[Arc<TypeDescriptor>]) -> Result<usize, RuntimeError> {
        let mut walk = Walk::new(self);
        for ty in types {
            walk.visit_type(ty)?;
        }
        Ok(walk.commit(self))
    }

    /// Add `unit` and its declared dependencies. Returns how many were new.
    pub fn add_unit(&mut self, unit: &Arc<UnitDescriptor>) -> Result<usize, RuntimeError> {
        let mut walk = Walk::new(self);
        walk.visit_unit(unit, unit.name())?;
        Ok(walk.commit(self))
    }
}

/// One resolution pass. Collects into `pending` so a failure leaves the
/// set untouched.
struct Walk {
    known: FxHashSet<String>,
    visited_types: FxHashSet<String>,
    visited_units: FxHashSet<String>,
    pending: Vec<(String, Arc<UnitDescriptor>)>,
}

impl Walk {
    fn new(set: &ReferenceSet) -> Self {
        Self {
            known: set.locations.clone(),
            visited_types: set.visited.clone(),
            visited_units: FxHashSet::default(),
            pending: Vec::new(),
        }
    }

    fn visit_type(&mut self, ty: &Arc<TypeDescriptor>) -> Result<(), RuntimeError> {
        if !self.visited_types.insert(ty.key()) {
            return Ok(());
        }
        // Generic parameters render as names, not as references
        if ty.kind() != TypeKind::GenericParameter {
            self.visit_unit(ty.unit(), &ty.to_string())?;
        }
        for arg in ty.generic_args() {
            self.visit_type(arg)?;
        }
        Ok(())
    }

    /// Add `unit`, then walk its dependencies even when the unit itself was
    /// already known. `origin` names the type that led here.
    fn visit_unit(&mut self, unit: &Arc<UnitDescriptor>, origin: &str) -> Result<(), RuntimeError> {
        if !self.visited_units.insert(unit.name().to_string()) {
            return Ok(());
        }
        let Some(location) = unit.location() else {
            return Err(RuntimeError::UnresolvedReference {
                type_name: origin.to_string(),
                unit: unit.name().to_string(),
            });
        };
        if self.known.insert(location.to_string()) {
            self.pending.push((location.to_string(), unit.clone()));
        }
        for dependency in unit.dependencies() {
            self.visit_unit(&dependency, origin)?;
        }
        Ok(())
    }

    fn commit(self, set: &mut ReferenceSet) -> usize {
        let added = self.pending.len();
        for (location, unit) in self.pending {
            tracing::debug!(unit = unit.name(), %location, "Added reference");
            set.locations.insert(location);
            set.units.push(unit);
        }
        set.visited.extend(self.visited_types);
        added
    }
}
