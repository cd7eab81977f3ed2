//! Compilation service
//!
//! Owns one execution context and the reference set of one generation
//! session. `compile` runs the embedded compiler over generated source and
//! loads the single exported type, either straight from memory or through a
//! module file in the working directory.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use loom_engine::{compile, CompileOptions, ExecutionContext, GeneratedType, LoadedModule};
use loom_sdk::{TypeDescriptor, UnitDescriptor, ValueSource};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::cache::ValueCache;
use crate::config::GeneratorConfig;
use crate::error::RuntimeError;
use crate::resolver::ReferenceSet;

// ============================================================================
// Context factories
// ============================================================================

/// Creates the execution context a service loads its modules into.
///
/// Custom factories can install a [`loom_engine::ReferenceBinder`] that
/// intercepts reference binding, or share one context between services.
pub trait ContextFactory: Send + Sync {
    fn create(&self, name: &str, source: Arc<dyn ValueSource>) -> Arc<ExecutionContext>;
}

impl<F> ContextFactory for F
where
    F: Fn(&str, Arc<dyn ValueSource>) -> Arc<ExecutionContext> + Send + Sync,
{
    fn create(&self, name: &str, source: Arc<dyn ValueSource>) -> Arc<ExecutionContext> {
        self(name, source)
    }
}

/// A fresh context with the default binder per service.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultContextFactory;

impl ContextFactory for DefaultContextFactory {
    fn create(&self, name: &str, source: Arc<dyn ValueSource>) -> Arc<ExecutionContext> {
        Arc::new(ExecutionContext::new(name, source))
    }
}

static DEFAULT_FACTORY: Lazy<RwLock<Arc<dyn ContextFactory>>> =
    Lazy::new(|| RwLock::new(Arc::new(DefaultContextFactory)));

/// Factory used by services built without an explicit context or factory.
pub fn default_context_factory() -> Arc<dyn ContextFactory> {
    DEFAULT_FACTORY.read().clone()
}

/// Replace the process-wide default factory.
pub fn set_default_context_factory(factory: Arc<dyn ContextFactory>) {
    *DEFAULT_FACTORY.write() = factory;
}

// ============================================================================
// Options
// ============================================================================

/// Working directory used when none is configured:
/// `<temp>/loom/<program name>/<program version>`.
pub fn default_working_dir() -> PathBuf {
    let program = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "loom".to_string());
    std::env::temp_dir()
        .join("loom")
        .join(program)
        .join(env!("CARGO_PKG_VERSION"))
}

/// How a [`CompilationService`] is set up.
#[derive(Clone)]
pub struct CompilationOptions {
    /// Write modules to the working directory and load them from there
    pub persist: bool,
    /// Defaults to [`default_working_dir`]
    pub working_dir: Option<PathBuf>,
    /// Module name; a random name is drawn per compile when unset
    pub module_name: Option<String>,
    pub warnings_as_errors: bool,
    /// Units referenced from the start
    pub units: Vec<Arc<UnitDescriptor>>,
    /// Store generated code resolves identifiers against. Defaults to
    /// [`ValueCache::global`].
    pub cache: Option<Arc<ValueCache>>,
    /// Use this context instead of creating one. Its value source must be
    /// the service cache.
    pub context: Option<Arc<ExecutionContext>>,
    /// Create the context with this factory instead of the default one.
    /// The factory must build on the source it is handed.
    pub context_factory: Option<Arc<dyn ContextFactory>>,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self {
            persist: true,
            working_dir: None,
            module_name: None,
            warnings_as_errors: false,
            units: Vec::new(),
            cache: None,
            context: None,
            context_factory: None,
        }
    }
}

impl CompilationOptions {
    /// Options that never touch the filesystem.
    pub fn ephemeral() -> Self {
        Self {
            persist: false,
            ..Self::default()
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            persist: config.persist,
            working_dir: config.working_dir.clone(),
            warnings_as_errors: config.warnings_as_errors,
            ..Self::default()
        }
    }

    pub fn with_cache(mut self, cache: Arc<ValueCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_unit(mut self, unit: Arc<UnitDescriptor>) -> Self {
        self.units.push(unit);
        self
    }

    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    pub fn with_context(mut self, context: Arc<ExecutionContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_context_factory(mut self, factory: Arc<dyn ContextFactory>) -> Self {
        self.context_factory = Some(factory);
        self
    }
}

// ============================================================================
// Service
// ============================================================================

/// Compiles generated source and loads it into an owned context.
pub struct CompilationService {
    cache: Arc<ValueCache>,
    context: Arc<ExecutionContext>,
    references: Mutex<ReferenceSet>,
    persist: bool,
    working_dir: PathBuf,
    module_name: Option<String>,
    warnings_as_errors: bool,
}

impl CompilationService {
    /// Build a service. Initial units are resolved immediately.
    ///
    /// Fails with [`RuntimeError::ForeignContext`] when the context, injected
    /// or built by a factory, reads from a store other than the service cache.
    pub fn new(options: CompilationOptions) -> Result<Self, RuntimeError> {
        let cache = options.cache.unwrap_or_else(ValueCache::global);
        let context = match options.context {
            Some(context) => context,
            None => {
                let factory = options.context_factory.unwrap_or_else(default_context_factory);
                let name = format!("loom-{}", Uuid::new_v4().simple());
                factory.create(&name, cache.clone())
            }
        };
        if !reads_from(&context, &cache) {
            tracing::warn!(context = %context.name(), "Execution context does not read from the service cache");
            return Err(RuntimeError::ForeignContext {
                context: context.name().to_string(),
            });
        }

        let service = Self {
            cache,
            context,
            references: Mutex::new(ReferenceSet::new()),
            persist: options.persist,
            working_dir: options.working_dir.unwrap_or_else(default_working_dir),
            module_name: options.module_name,
            warnings_as_errors: options.warnings_as_errors,
        };
        for unit in &options.units {
            service.add_unit(unit)?;
        }
        Ok(service)
    }

    /// Persisted service with default settings and the global cache.
    pub fn with_defaults() -> Result<Self, RuntimeError> {
        Self::new(CompilationOptions::default())
    }

    pub fn cache(&self) -> &Arc<ValueCache> {
        &self.cache
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    pub fn is_persisted(&self) -> bool {
        self.persist
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Reference the unit declaring `ty`, its generic arguments' units and
    /// everything those units depend on. Adding a type twice is a no-op.
    pub fn add_reference(&self, ty: &Arc<TypeDescriptor>) -> Result<(), RuntimeError> {
        self.references.lock().add_type(ty)?;
        Ok(())
    }

    /// [`add_reference`](Self::add_reference) for several types, all or nothing.
    pub fn add_references(&self, types: &[Arc<TypeDescriptor>]) -> Result<(), RuntimeError> {
        self.references.lock().add_types(types)?;
        Ok(())
    }

    /// Reference a unit directly, e.g. a previously generated module.
    pub fn add_unit(&self, unit: &Arc<UnitDescriptor>) -> Result<(), RuntimeError> {
        self.references.lock().add_unit(unit)?;
        Ok(())
    }

    /// Snapshot of the referenced units, core included.
    pub fn references(&self) -> Vec<Arc<UnitDescriptor>> {
        self.references.lock().units().to_vec()
    }

    pub fn reference_count(&self) -> usize {
        self.references.lock().len()
    }

    /// Compile `source` and return its exported type.
    pub fn compile(&self, source: &str) -> Result<Arc<GeneratedType>, RuntimeError> {
        Ok(self.compile_module(source)?.generated_type().clone())
    }

    /// Compile `source` and return the loaded module.
    pub fn compile_module(&self, source: &str) -> Result<Arc<LoadedModule>, RuntimeError> {
        let name = self
            .module_name
            .clone()
            .unwrap_or_else(|| format!("gen_{}", Uuid::new_v4().simple()));
        let references = self.references();

        let mut options = CompileOptions::new(name.clone());
        options.warnings_as_errors = self.warnings_as_errors;

        tracing::debug!(module = %name, bytes = source.len(), references = references.len(), "Compiling generated source");
        let output = compile(source, &references, &options)?;
        let Some(image) = output.image.as_deref() else {
            tracing::warn!(module = %name, errors = output.errors().count(), "Generated source failed to compile");
            return Err(RuntimeError::Compilation {
                message: failure_message(output.errors(), source),
            });
        };
        for warning in output.warnings() {
            tracing::debug!(module = %name, "{}", warning);
        }

        let module = if self.persist {
            std::fs::create_dir_all(&self.working_dir)?;
            let path = self.working_dir.join(&name);
            std::fs::write(&path, image)?;
            self.context.load_path(&path, &references)?
        } else {
            self.context.load_bytes(image, &references)?
        };

        tracing::info!(
            module = %name,
            type_name = %module.generated_type().full_name(),
            persisted = self.persist,
            "Loaded generated type"
        );
        Ok(module)
    }
}

impl std::fmt::Debug for CompilationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationService")
            .field("context", &self.context.name())
            .field("persist", &self.persist)
            .field("working_dir", &self.working_dir)
            .field("references", &self.reference_count())
            .finish()
    }
}

fn reads_from(context: &ExecutionContext, cache: &Arc<ValueCache>) -> bool {
    Arc::as_ptr(context.source()) as *const () == Arc::as_ptr(cache) as *const ()
}

/// Every error diagnostic followed by the offending source.
fn failure_message<'a>(errors: impl Iterator<Item = &'a loom_engine::Diagnostic>, source: &str) -> String {
    let mut message = String::from("Compilation failures!\n\n");
    for d in errors {
        let _ = writeln!(message, "{}", d);
    }
    let _ = write!(message, "\nCode:\n\n{}", source);
    message
}
