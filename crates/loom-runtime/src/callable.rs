//! Callable wrapper generator
//!
//! Turns a callable value into a class whose one method fetches the
//! callable from the value cache and invokes it. Conversion rules can move
//! parameters into the constructor or onto public properties, so the
//! resulting type can carry part of the call's arguments as state.

use std::sync::Arc;

use loom_engine::{format_source, GeneratedType};
use loom_sdk::{Callable, Signature, TypeDescriptor};
use uuid::Uuid;

use crate::cache::ValueCache;
use crate::compilation::{CompilationOptions, CompilationService};
use crate::config::GeneratorConfig;
use crate::conversion::{ConversionRule, RoutedMembers};
use crate::error::RuntimeError;
use crate::source::{
    friendly_name, import_namespaces, reserved_name, write_constructor_header, write_routed_properties, SourceWriter,
};

/// Name of the generated method.
#[derive(Clone)]
pub enum MethodName {
    Fixed(String),
    /// Derived from the wrapped signature
    Generated(Arc<dyn Fn(&Signature) -> String + Send + Sync>),
}

impl MethodName {
    fn resolve(&self, signature: &Signature) -> String {
        match self {
            MethodName::Fixed(name) => name.clone(),
            MethodName::Generated(f) => f(signature),
        }
    }
}

impl From<&str> for MethodName {
    fn from(name: &str) -> Self {
        MethodName::Fixed(name.to_string())
    }
}

impl std::fmt::Debug for MethodName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodName::Fixed(name) => write!(f, "MethodName::Fixed({:?})", name),
            MethodName::Generated(_) => write!(f, "MethodName::Generated"),
        }
    }
}

/// Settings for one callable wrapper.
#[derive(Debug, Clone)]
pub struct CallableWrapperOptions {
    pub type_name: String,
    pub namespace_name: String,
    pub method_name: MethodName,
    pub conversion_rules: Vec<ConversionRule>,
    /// Extra import directives
    pub additional_namespaces: Vec<String>,
    pub prettify: bool,
    /// Compile with this service instead of a fresh one
    pub compilation: Option<Arc<CompilationService>>,
}

impl Default for CallableWrapperOptions {
    fn default() -> Self {
        Self {
            type_name: "GeneratedType".to_string(),
            namespace_name: "GeneratedNamespace".to_string(),
            method_name: MethodName::Fixed("Run".to_string()),
            conversion_rules: Vec::new(),
            additional_namespaces: Vec::new(),
            prettify: true,
            compilation: None,
        }
    }
}

impl CallableWrapperOptions {
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            type_name: config.type_name.clone(),
            namespace_name: config.namespace.clone(),
            method_name: MethodName::Fixed(config.method_name.clone()),
            prettify: config.prettify,
            ..Self::default()
        }
    }

    pub fn with_rule(mut self, rule: ConversionRule) -> Self {
        self.conversion_rules.push(rule);
        self
    }
}

/// Generates types wrapping callables.
#[derive(Debug, Clone)]
pub struct CallableWrapper {
    config: GeneratorConfig,
    cache: Arc<ValueCache>,
}

impl Default for CallableWrapper {
    fn default() -> Self {
        Self::new(ValueCache::global())
    }
}

impl CallableWrapper {
    pub fn new(cache: Arc<ValueCache>) -> Self {
        Self::with_config(GeneratorConfig::default(), cache)
    }

    /// Services created by this wrapper follow `config`.
    pub fn with_config(config: GeneratorConfig, cache: Arc<ValueCache>) -> Self {
        Self { config, cache }
    }

    /// Generate, compile and load a type wrapping `callable`.
    pub fn create_type(
        &self,
        callable: Callable,
        options: &CallableWrapperOptions,
    ) -> Result<Arc<GeneratedType>, RuntimeError> {
        let service = match &options.compilation {
            Some(service) => service.clone(),
            None => Arc::new(CompilationService::new(
                CompilationOptions::from_config(&self.config).with_cache(self.cache.clone()),
            )?),
        };

        let signature = callable.signature().clone();
        service.add_references(&signature_types(&signature))?;
        let id = service.cache().add_callable(callable);

        let source = render(&signature, id, options);
        service.compile(&source)
    }
}

/// Parameter and return types, generic arguments expanded.
fn signature_types(signature: &Signature) -> Vec<Arc<TypeDescriptor>> {
    let mut types = Vec::new();
    for parameter in &signature.parameters {
        crate::source::expand_generic(&parameter.ty, &mut types);
    }
    crate::source::expand_generic(&signature.return_type, &mut types);
    types
}

/// Source for a wrapper around the callable cached under `id`.
pub fn render(signature: &Signature, id: Uuid, options: &CallableWrapperOptions) -> String {
    let type_name = options.type_name.as_str();
    let method_name = options.method_name.resolve(signature);
    let name_of = |ty: &TypeDescriptor| friendly_name(ty, type_name);

    let mut members = RoutedMembers::new();
    let call = members.route(&signature.parameters, &options.conversion_rules, name_of);

    let mut code = SourceWriter::new();
    let types = signature_types(signature);
    for namespace in import_namespaces(&types, &options.additional_namespaces) {
        code.line(format!("import {};", namespace));
    }
    code.blank();
    code.line(format!("namespace {};", options.namespace_name));
    code.blank();
    code.open(format!("public class {}", type_name));

    write_constructor_header(&mut code, type_name, &members);
    code.close();
    write_routed_properties(&mut code, &members);

    let params: Vec<String> = call.parameters.iter().map(|d| format!("{} {}", d.ty, d.name)).collect();
    let returns = name_of(&signature.return_type);
    code.blank();
    code.open(format!("public {} {}({})", returns, method_name, params.join(", ")));
    let mut taken = members.names();
    taken.extend(call.parameters.iter().map(|d| d.name.clone()));
    let deleg = reserved_name("deleg", &taken);
    code.line(format!("var {} = core.ValueCache.callable(\"{}\");", deleg, id));
    let invoke = format!("{}.invoke({})", deleg, call.arguments.join(", "));
    if signature.return_type.is_void() {
        code.line(format!("{};", invoke));
    } else {
        code.line(format!("return {} as {};", invoke, returns));
    }
    code.close();
    code.close();

    let source = code.finish();
    if options.prettify {
        format_source(&source)
    } else {
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::Route;
    use loom_sdk::core_types;

    fn signature() -> Signature {
        let core = core_types();
        Signature::new(core.boolean.clone())
            .param("age", core.int32.clone())
            .param("name", core.string.clone())
    }

    #[test]
    fn test_render_plain() {
        let id = Uuid::new_v4();
        let source = render(&signature(), id, &CallableWrapperOptions::default());
        assert!(source.contains("namespace GeneratedNamespace;"));
        assert!(source.contains("public GeneratedType()"));
        assert!(source.contains("public core.Boolean Run(core.Int32 age, core.String name)"));
        assert!(source.contains(&format!("core.ValueCache.callable(\"{}\")", id)));
        assert!(source.contains("return __deleg.invoke(age, name) as core.Boolean;"));
    }

    #[test]
    fn test_render_routed() {
        let options = CallableWrapperOptions::default()
            .with_rule(ConversionRule::for_type(&core_types().int32, Route::ConstructorParameter))
            .with_rule(ConversionRule::for_name("name", Route::PublicProperty));
        let source = render(&signature(), Uuid::new_v4(), &options);
        assert!(source.contains("private core.Int32 _age;"));
        assert!(source.contains("public GeneratedType(core.Int32 age)"));
        assert!(source.contains("_age = age;"));
        assert!(source.contains("public core.String Name { get; set; }"));
        assert!(source.contains("public core.Boolean Run()"));
        assert!(source.contains("__deleg.invoke(_age, Name)"));
    }

    #[test]
    fn test_render_void_and_method_name_strategy() {
        let sig = Signature::new(core_types().void.clone()).param("x", core_types().int32.clone());
        let options = CallableWrapperOptions {
            method_name: MethodName::Generated(Arc::new(|s: &Signature| format!("Call{}", s.parameters.len()))),
            ..CallableWrapperOptions::default()
        };
        let source = render(&sig, Uuid::new_v4(), &options);
        assert!(source.contains("public void Call1(core.Int32 x)"));
        assert!(source.contains("__deleg.invoke(x);"));
        assert!(!source.contains("return"));
    }

    #[test]
    fn test_render_parameter_named_like_a_local() {
        let sig = Signature::new(core_types().int32.clone())
            .param("deleg", core_types().int32.clone())
            .param("__deleg", core_types().int32.clone());
        let source = render(&sig, Uuid::new_v4(), &CallableWrapperOptions::default());
        assert!(source.contains("Run(core.Int32 deleg, core.Int32 __deleg)"));
        assert!(source.contains("return __deleg2.invoke(deleg, __deleg) as core.Int32;"));
    }
}
