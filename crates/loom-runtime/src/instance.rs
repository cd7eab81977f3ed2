//! Instance wrapper generator
//!
//! Emits a class that holds an instance of an existing type and forwards a
//! selected subset of its methods and properties. Forwarded methods can be
//! bracketed by hooks and by caller-supplied code fragments; the class can
//! inherit a base, implement interfaces, take extra constructor parameters
//! and carry its own source text.
//!
//! The emitted class always has the same section order:
//!
//! 1. imports
//! 2. namespace
//! 3. class header with base and interfaces
//! 4. the `__instance` field, filled from the value cache
//! 5. constructor (parameterless when nothing is routed to it)
//! 6. routed properties
//! 7. wrapper methods
//! 8. wrapper properties
//! 9. custom type-body code
//! 10. the embedded `_source` field

use std::sync::Arc;

use loom_engine::{format_source, GeneratedType};
use loom_sdk::{
    Activator, ConstructHookFn, HostResult, Hook, MethodDescriptor, MethodHookFn, ObjectRef, PropertyDescriptor,
    TypeDescriptor, UnitDescriptor,
};
use uuid::Uuid;

use crate::cache::ValueCache;
use crate::compilation::{CompilationOptions, CompilationService};
use crate::config::GeneratorConfig;
use crate::conversion::{ConversionRule, RoutedCall, RoutedMembers};
use crate::error::RuntimeError;
use crate::source::{
    embed_source, expand_generic, friendly_name, glob_regex, import_namespaces, reserved_name,
    write_constructor_header, write_routed_properties, SourceWriter, SOURCE_PLACEHOLDER,
};

/// Names derived from the options and the wrapped type.
pub type TypeNamer = Arc<dyn Fn(&InstanceWrapperOptions, &TypeDescriptor) -> String + Send + Sync>;
/// Names derived from the options, the wrapped type and one of its methods.
pub type MethodNamer =
    Arc<dyn Fn(&InstanceWrapperOptions, &TypeDescriptor, &MethodDescriptor) -> String + Send + Sync>;
pub type MethodFilter =
    Arc<dyn Fn(&InstanceWrapperOptions, &TypeDescriptor, &MethodDescriptor) -> bool + Send + Sync>;
/// Source fragment for the type body or constructor.
pub type TypeCode = Arc<dyn Fn(&InstanceWrapperOptions, &TypeDescriptor) -> String + Send + Sync>;
/// Source fragment placed around one forwarded call.
pub type MethodCode =
    Arc<dyn Fn(&InstanceWrapperOptions, &TypeDescriptor, &MethodDescriptor) -> String + Send + Sync>;

/// A constructor parameter stored in a field named `_<name>`.
#[derive(Debug, Clone)]
pub struct AdditionalParameter {
    pub ty: Arc<TypeDescriptor>,
    pub name: String,
}

impl AdditionalParameter {
    pub fn new(ty: Arc<TypeDescriptor>, name: impl Into<String>) -> Self {
        Self { ty, name: name.into() }
    }
}

/// Public, non-static, non-generic, non-special methods with a body that
/// the wrapped type declares itself.
pub fn default_include_method(_: &InstanceWrapperOptions, ty: &TypeDescriptor, method: &MethodDescriptor) -> bool {
    method.is_public
        && !method.is_abstract
        && !method.is_static
        && !method.is_generic
        && !method.is_special
        && (method.declaring_type.is_empty() || method.declaring_type == ty.full_name())
}

/// Settings for one instance wrapper.
#[derive(Clone)]
pub struct InstanceWrapperOptions {
    pub type_name: String,
    pub namespace_name: String,
    /// Overrides `type_name`
    pub type_name_generator: Option<TypeNamer>,
    /// Overrides `namespace_name`
    pub namespace_name_generator: Option<TypeNamer>,
    /// Defaults to the wrapped method's name
    pub method_name_generator: Option<MethodNamer>,
    pub conversion_rules: Vec<ConversionRule>,
    /// Method name globs. Empty selects every method passing the predicates.
    pub include_methods: Vec<String>,
    /// Property name globs. Empty selects no properties.
    pub include_properties: Vec<String>,
    pub include_method: MethodFilter,
    pub exclude_method: Option<MethodFilter>,
    /// Produces the wrapped instance; defaults to the type's activator
    pub factory: Option<Activator>,
    pub on_construct: Option<Arc<ConstructHookFn>>,
    pub on_before_method: Option<Arc<MethodHookFn>>,
    pub on_after_method: Option<Arc<MethodHookFn>>,
    /// Fragments see the wrapped object as `__instance` and, in
    /// `after_method_code`, the forwarded call's value as `__result`.
    pub constructor_code: Option<TypeCode>,
    pub before_method_code: Option<MethodCode>,
    pub after_method_code: Option<MethodCode>,
    /// Appended to the type body
    pub custom_code: Option<TypeCode>,
    pub additional_constructor_parameters: Vec<AdditionalParameter>,
    /// Extra import directives
    pub additional_namespaces: Vec<String>,
    /// Extra units to reference
    pub additional_references: Vec<Arc<UnitDescriptor>>,
    pub inherits: Option<Arc<TypeDescriptor>>,
    pub implements: Vec<Arc<TypeDescriptor>>,
    /// Embed the final source in a `_source` field
    pub include_source: bool,
    pub prettify: bool,
    /// Compile with this service instead of a fresh one
    pub compilation: Option<Arc<CompilationService>>,
}

impl Default for InstanceWrapperOptions {
    fn default() -> Self {
        Self {
            type_name: "GeneratedType".to_string(),
            namespace_name: "GeneratedNamespace".to_string(),
            type_name_generator: None,
            namespace_name_generator: None,
            method_name_generator: None,
            conversion_rules: Vec::new(),
            include_methods: Vec::new(),
            include_properties: Vec::new(),
            include_method: Arc::new(default_include_method),
            exclude_method: None,
            factory: None,
            on_construct: None,
            on_before_method: None,
            on_after_method: None,
            constructor_code: None,
            before_method_code: None,
            after_method_code: None,
            custom_code: None,
            additional_constructor_parameters: Vec::new(),
            additional_namespaces: Vec::new(),
            additional_references: Vec::new(),
            inherits: None,
            implements: Vec::new(),
            include_source: true,
            prettify: true,
            compilation: None,
        }
    }
}

impl InstanceWrapperOptions {
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            type_name: config.type_name.clone(),
            namespace_name: config.namespace.clone(),
            include_source: config.include_source,
            prettify: config.prettify,
            ..Self::default()
        }
    }

    pub fn with_on_construct<F>(mut self, f: F) -> Self
    where
        F: Fn(&ObjectRef) -> HostResult<()> + Send + Sync + 'static,
    {
        self.on_construct = Some(Arc::new(f));
        self
    }

    pub fn with_on_before_method<F>(mut self, f: F) -> Self
    where
        F: Fn(&ObjectRef, &MethodDescriptor) -> HostResult<()> + Send + Sync + 'static,
    {
        self.on_before_method = Some(Arc::new(f));
        self
    }

    pub fn with_on_after_method<F>(mut self, f: F) -> Self
    where
        F: Fn(&ObjectRef, &MethodDescriptor) -> HostResult<()> + Send + Sync + 'static,
    {
        self.on_after_method = Some(Arc::new(f));
        self
    }

    pub fn type_name_for(&self, ty: &TypeDescriptor) -> String {
        match &self.type_name_generator {
            Some(f) => f(self, ty),
            None => self.type_name.clone(),
        }
    }

    pub fn namespace_for(&self, ty: &TypeDescriptor) -> String {
        match &self.namespace_name_generator {
            Some(f) => f(self, ty),
            None => self.namespace_name.clone(),
        }
    }

    pub fn method_name_for(&self, ty: &TypeDescriptor, method: &MethodDescriptor) -> String {
        match &self.method_name_generator {
            Some(f) => f(self, ty, method),
            None => method.name.clone(),
        }
    }
}

impl std::fmt::Debug for InstanceWrapperOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceWrapperOptions")
            .field("type_name", &self.type_name)
            .field("namespace_name", &self.namespace_name)
            .field("include_methods", &self.include_methods)
            .field("include_properties", &self.include_properties)
            .field("inherits", &self.inherits)
            .field("implements", &self.implements)
            .field("include_source", &self.include_source)
            .field("prettify", &self.prettify)
            .finish_non_exhaustive()
    }
}

/// Cache identifiers baked into one wrapper's source.
#[derive(Debug, Clone, Copy)]
pub struct WrapperIds {
    pub instance: Uuid,
    pub on_construct: Option<Uuid>,
    pub before_method: Option<Uuid>,
    pub after_method: Option<Uuid>,
}

/// Methods of `ty` the wrapper forwards.
pub fn select_methods(ty: &TypeDescriptor, options: &InstanceWrapperOptions) -> Result<Vec<MethodDescriptor>, RuntimeError> {
    let patterns = options
        .include_methods
        .iter()
        .map(|p| glob_regex(p))
        .collect::<Result<Vec<_>, _>>()?;

    let selected = ty
        .methods()
        .iter()
        .filter(|m| (options.include_method)(options, ty, m))
        .filter(|m| !options.exclude_method.as_ref().is_some_and(|f| f(options, ty, m)))
        .filter(|m| {
            options.include_methods.is_empty()
                || options.include_methods.contains(&m.name)
                || patterns.iter().any(|re| re.is_match(&m.name))
        })
        .cloned()
        .collect();
    Ok(selected)
}

/// Public readable properties of `ty` matching an include pattern.
pub fn select_properties(
    ty: &TypeDescriptor,
    options: &InstanceWrapperOptions,
) -> Result<Vec<PropertyDescriptor>, RuntimeError> {
    let patterns = options
        .include_properties
        .iter()
        .map(|p| glob_regex(p))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ty
        .properties()
        .iter()
        .filter(|p| p.is_public && p.can_read)
        .filter(|p| patterns.iter().any(|re| re.is_match(&p.name)))
        .cloned()
        .collect())
}

/// Generates types wrapping instances of existing types.
#[derive(Debug, Clone)]
pub struct InstanceWrapper {
    config: GeneratorConfig,
    cache: Arc<ValueCache>,
}

impl Default for InstanceWrapper {
    fn default() -> Self {
        Self::new(ValueCache::global())
    }
}

impl InstanceWrapper {
    pub fn new(cache: Arc<ValueCache>) -> Self {
        Self::with_config(GeneratorConfig::default(), cache)
    }

    /// Services created by this wrapper follow `config`.
    pub fn with_config(config: GeneratorConfig, cache: Arc<ValueCache>) -> Self {
        Self { config, cache }
    }

    /// Generate, compile and load a type wrapping instances of `original`.
    pub fn create_type(
        &self,
        original: &Arc<TypeDescriptor>,
        options: &InstanceWrapperOptions,
    ) -> Result<Arc<GeneratedType>, RuntimeError> {
        let methods = select_methods(original, options)?;
        let properties = select_properties(original, options)?;

        let factory = options
            .factory
            .clone()
            .or_else(|| original.activator().cloned())
            .ok_or_else(|| {
                RuntimeError::Generation(format!("Type '{}' has no activator and no factory was given", original))
            })?;

        let service = match &options.compilation {
            Some(service) => service.clone(),
            None => Arc::new(CompilationService::new(
                CompilationOptions::from_config(&self.config).with_cache(self.cache.clone()),
            )?),
        };
        service.add_references(&required_types(original, &methods, &properties, options))?;
        for unit in &options.additional_references {
            service.add_unit(unit)?;
        }

        let cache = service.cache();
        let ids = WrapperIds {
            instance: cache.add_factory(factory),
            on_construct: options.on_construct.as_ref().map(|h| cache.add_hook(Hook::Construct(h.clone()))),
            before_method: options.on_before_method.as_ref().map(|h| cache.add_hook(Hook::Method(h.clone()))),
            after_method: options.on_after_method.as_ref().map(|h| cache.add_hook(Hook::Method(h.clone()))),
        };

        tracing::debug!(
            original = %original,
            methods = methods.len(),
            properties = properties.len(),
            "Wrapping type"
        );
        let source = render(original, &methods, &properties, &ids, options);
        service.compile(&source)
    }
}

/// Every type the wrapper's source names, generic arguments expanded.
fn required_types(
    original: &Arc<TypeDescriptor>,
    methods: &[MethodDescriptor],
    properties: &[PropertyDescriptor],
    options: &InstanceWrapperOptions,
) -> Vec<Arc<TypeDescriptor>> {
    let mut types = Vec::new();
    expand_generic(original, &mut types);
    for method in methods {
        for parameter in &method.parameters {
            expand_generic(&parameter.ty, &mut types);
        }
        expand_generic(&method.return_type, &mut types);
    }
    for property in properties {
        expand_generic(&property.ty, &mut types);
    }
    for parameter in &options.additional_constructor_parameters {
        expand_generic(&parameter.ty, &mut types);
    }
    if let Some(base) = &options.inherits {
        expand_generic(base, &mut types);
    }
    for iface in &options.implements {
        expand_generic(iface, &mut types);
    }
    types
}

fn hook_call(id: Uuid, args: &str) -> String {
    format!("core.ValueCache.hook(\"{}\").invoke({});", id, args)
}

/// Source for a wrapper over `original` forwarding `methods` and `properties`.
pub fn render(
    original: &Arc<TypeDescriptor>,
    methods: &[MethodDescriptor],
    properties: &[PropertyDescriptor],
    ids: &WrapperIds,
    options: &InstanceWrapperOptions,
) -> String {
    let type_name = options.type_name_for(original);
    let name_of = |ty: &TypeDescriptor| friendly_name(ty, &type_name);

    let mut members = RoutedMembers::new();
    let calls: Vec<RoutedCall> = methods
        .iter()
        .map(|m| members.route(&m.parameters, &options.conversion_rules, name_of))
        .collect();
    for parameter in &options.additional_constructor_parameters {
        members.add_constructor_parameter(name_of(&parameter.ty), parameter.name.clone());
    }

    let mut code = SourceWriter::new();
    let types = required_types(original, methods, properties, options);
    for namespace in import_namespaces(&types, &options.additional_namespaces) {
        code.line(format!("import {};", namespace));
    }
    code.blank();
    code.line(format!("namespace {};", options.namespace_for(original)));
    code.blank();

    let supertypes: Vec<String> = options
        .inherits
        .iter()
        .chain(options.implements.iter())
        .map(|t| name_of(t))
        .collect();
    if supertypes.is_empty() {
        code.open(format!("public class {}", type_name));
    } else {
        code.open(format!("public class {} : {}", type_name, supertypes.join(", ")));
    }

    let mut taken = members.names();
    taken.extend(calls.iter().flat_map(|c| c.parameters.iter().map(|d| d.name.clone())));
    taken.extend(properties.iter().map(|p| p.name.clone()));
    taken.push("_source".to_string());
    let instance = reserved_name("instance", &taken);

    let original_name = name_of(original);
    code.line(format!(
        "private {0} {1} = core.ValueCache.instance(\"{2}\") as {0};",
        original_name, instance, ids.instance
    ));
    code.blank();

    write_constructor_header(&mut code, &type_name, &members);
    if let Some(id) = ids.on_construct {
        code.line(hook_call(id, &instance));
    }
    if let Some(fragment) = &options.constructor_code {
        code.fragment(&fragment(options, original));
    }
    code.close();
    write_routed_properties(&mut code, &members);

    for (method, call) in methods.iter().zip(&calls) {
        write_method(&mut code, original, method, call, &instance, ids, options, &name_of);
    }
    for property in properties {
        write_property(&mut code, property, &instance, &name_of);
    }

    if let Some(fragment) = &options.custom_code {
        code.blank();
        code.fragment(&fragment(options, original));
    }
    if options.include_source {
        code.blank();
        code.line(SOURCE_PLACEHOLDER);
    }
    code.close();

    let mut source = code.finish();
    if options.prettify {
        source = format_source(&source);
    }
    if options.include_source {
        source = embed_source(&source);
    }
    source
}

#[allow(clippy::too_many_arguments)]
fn write_method(
    code: &mut SourceWriter,
    original: &TypeDescriptor,
    method: &MethodDescriptor,
    call: &RoutedCall,
    instance: &str,
    ids: &WrapperIds,
    options: &InstanceWrapperOptions,
    name_of: &dyn Fn(&TypeDescriptor) -> String,
) {
    let returns = name_of(&method.return_type);
    let params: Vec<String> = call.parameters.iter().map(|d| format!("{} {}", d.ty, d.name)).collect();
    let reflect = format!("{0}, core.Reflect.method({0}, \"{1}\")", instance, method.name);
    let mut taken: Vec<String> = call.parameters.iter().map(|d| d.name.clone()).collect();
    taken.push(instance.to_string());
    let result = reserved_name("result", &taken);

    code.blank();
    code.open(format!(
        "public {} {}({})",
        returns,
        options.method_name_for(original, method),
        params.join(", ")
    ));
    if let Some(id) = ids.before_method {
        code.line(hook_call(id, &reflect));
    }
    if let Some(fragment) = &options.before_method_code {
        code.fragment(&fragment(options, original, method));
    }

    let invoke = format!("{}.{}({})", instance, method.name, call.arguments.join(", "));
    if method.returns_void() {
        code.line(format!("{};", invoke));
    } else {
        code.line(format!("var {} = {} as {};", result, invoke, returns));
    }

    if let Some(id) = ids.after_method {
        code.line(hook_call(id, &reflect));
    }
    if let Some(fragment) = &options.after_method_code {
        code.fragment(&fragment(options, original, method));
    }
    if !method.returns_void() {
        code.line(format!("return {};", result));
    }
    code.close();
}

fn write_property(
    code: &mut SourceWriter,
    property: &PropertyDescriptor,
    instance: &str,
    name_of: &dyn Fn(&TypeDescriptor) -> String,
) {
    code.blank();
    code.open(format!("public {} {}", name_of(&property.ty), property.name));
    code.line(format!("get {{ return {}.{}; }}", instance, property.name));
    if property.can_write {
        code.line(format!("set {{ {}.{} = value; }}", instance, property.name));
    }
    code.close();
}
