//! Execution contexts
//!
//! A context owns every module loaded into it. Module names are unique per
//! context and every successful load produces a fresh type; loading an image
//! whose name is already taken fails with `DuplicateModule`.

use std::path::Path;
use std::sync::Arc;

use loom_sdk::{core_types, UnitDescriptor, ValueSource};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use super::class::{GeneratedType, LoadedModule};
use super::{VmError, VmResult};
use crate::compiler::{Module, ModuleReference};

/// Maps a module's recorded reference to a live unit.
pub trait ReferenceBinder: Send + Sync {
    /// Pick the unit satisfying `reference`.
    ///
    /// `candidates` are the units supplied with the load request and `loaded`
    /// the units of modules already in the context.
    fn bind(
        &self,
        reference: &ModuleReference,
        candidates: &[Arc<UnitDescriptor>],
        loaded: &[Arc<UnitDescriptor>],
    ) -> Option<Arc<UnitDescriptor>>;
}

/// Binds by unit name: supplied units first, then loaded modules, then core.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBinder;

impl ReferenceBinder for DefaultBinder {
    fn bind(
        &self,
        reference: &ModuleReference,
        candidates: &[Arc<UnitDescriptor>],
        loaded: &[Arc<UnitDescriptor>],
    ) -> Option<Arc<UnitDescriptor>> {
        candidates
            .iter()
            .chain(loaded)
            .find(|u| u.name() == reference.name)
            .cloned()
            .or_else(|| {
                let core = &core_types().unit;
                (core.name() == reference.name).then(|| core.clone())
            })
    }
}

#[derive(Default)]
struct Registry {
    by_name: FxHashMap<String, Arc<LoadedModule>>,
    order: Vec<Arc<LoadedModule>>,
}

/// An isolated set of loaded modules.
pub struct ExecutionContext {
    id: Uuid,
    name: String,
    source: Arc<dyn ValueSource>,
    binder: Arc<dyn ReferenceBinder>,
    registry: RwLock<Registry>,
}

impl ExecutionContext {
    /// Context whose generated code reads cached values from `source`.
    pub fn new(name: impl Into<String>, source: Arc<dyn ValueSource>) -> Self {
        Self::with_binder(name, source, Arc::new(DefaultBinder))
    }

    pub fn with_binder(name: impl Into<String>, source: Arc<dyn ValueSource>, binder: Arc<dyn ReferenceBinder>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source,
            binder,
            registry: RwLock::new(Registry::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value source generated code in this context reads from
    pub fn source(&self) -> &Arc<dyn ValueSource> {
        &self.source
    }

    /// Load an in-memory module image.
    pub fn load_bytes(&self, bytes: &[u8], references: &[Arc<UnitDescriptor>]) -> VmResult<Arc<LoadedModule>> {
        self.load(bytes, references, None)
    }

    /// Load a module file. The path becomes the unit's location.
    pub fn load_path(&self, path: impl AsRef<Path>, references: &[Arc<UnitDescriptor>]) -> VmResult<Arc<LoadedModule>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| VmError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.load(&bytes, references, Some(path.display().to_string()))
    }

    /// Module by name
    pub fn module(&self, name: &str) -> Option<Arc<LoadedModule>> {
        self.registry.read().by_name.get(name).cloned()
    }

    /// Modules in load order
    pub fn modules(&self) -> Vec<Arc<LoadedModule>> {
        self.registry.read().order.clone()
    }

    fn load(
        &self,
        bytes: &[u8],
        references: &[Arc<UnitDescriptor>],
        location: Option<String>,
    ) -> VmResult<Arc<LoadedModule>> {
        let checksum = Module::hash_bytes(bytes);
        let module = Module::decode(bytes)?;
        if self.registry.read().by_name.contains_key(&module.name) {
            return Err(VmError::DuplicateModule(module.name));
        }

        let loaded_units: Vec<_> = self.modules().iter().map(|m| m.unit().clone()).collect();
        let mut bound = FxHashMap::default();
        let mut bound_units = Vec::with_capacity(module.references.len());
        for reference in &module.references {
            let unit = self
                .binder
                .bind(reference, references, &loaded_units)
                .ok_or_else(|| VmError::UnresolvedReference {
                    module: module.name.clone(),
                    unit: reference.name.clone(),
                })?;
            bound.insert(reference.name.clone(), unit.clone());
            bound_units.push(unit);
        }

        let unit = UnitDescriptor::create(module.name.clone(), module.version.clone(), location);
        for dep in &bound_units {
            unit.add_dependency(dep.clone());
        }
        let ty = GeneratedType::load(&module, &unit, &bound, self.source.clone())?;

        let loaded = Arc::new(LoadedModule {
            name: module.name.clone(),
            checksum,
            source_hash: module.source_hash_hex(),
            references: bound_units,
            ty,
        });

        let mut registry = self.registry.write();
        if registry.by_name.contains_key(&module.name) {
            return Err(VmError::DuplicateModule(module.name));
        }
        registry.by_name.insert(module.name.clone(), loaded.clone());
        registry.order.push(loaded.clone());
        drop(registry);

        tracing::debug!(
            context = %self.name,
            module = %loaded.name,
            ty = %loaded.ty.full_name(),
            location = loaded.location().unwrap_or("<memory>"),
            "loaded module"
        );
        Ok(loaded)
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("modules", &self.registry.read().order.len())
            .finish()
    }
}
