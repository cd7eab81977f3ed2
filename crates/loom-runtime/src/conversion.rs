//! Parameter conversion pipeline
//!
//! Decides where each parameter of a wrapped callable or method surfaces in
//! the generated type: as a method parameter, as a constructor parameter
//! stored in a field, or as a settable public property.

use std::sync::Arc;

use loom_sdk::{ParameterDescriptor, TypeDescriptor};

/// Where a parameter ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    MethodParameter,
    ConstructorParameter,
    PublicProperty,
}

/// Outcome of a matching [`ConversionRule`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterConversion {
    /// Replacement parameter name
    pub renamed_to: Option<String>,
    pub route_to: Route,
}

impl ParameterConversion {
    pub fn to_method() -> Self {
        Self::default()
    }

    pub fn to_constructor() -> Self {
        Self {
            renamed_to: None,
            route_to: Route::ConstructorParameter,
        }
    }

    pub fn to_property() -> Self {
        Self {
            renamed_to: None,
            route_to: Route::PublicProperty,
        }
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.renamed_to = Some(name.into());
        self
    }
}

type Predicate = Arc<dyn Fn(&ParameterDescriptor) -> bool + Send + Sync>;
type Handler = Arc<dyn Fn(&ParameterDescriptor) -> ParameterConversion + Send + Sync>;

/// A predicate over parameters plus the conversion applied on a match.
#[derive(Clone)]
pub struct ConversionRule {
    can_handle: Predicate,
    handle: Handler,
}

impl ConversionRule {
    pub fn new<P, H>(can_handle: P, handle: H) -> Self
    where
        P: Fn(&ParameterDescriptor) -> bool + Send + Sync + 'static,
        H: Fn(&ParameterDescriptor) -> ParameterConversion + Send + Sync + 'static,
    {
        Self {
            can_handle: Arc::new(can_handle),
            handle: Arc::new(handle),
        }
    }

    /// Route every parameter of type `ty` to `route`.
    pub fn for_type(ty: &Arc<TypeDescriptor>, route: Route) -> Self {
        let key = ty.key();
        Self::new(
            move |p| p.ty.key() == key,
            move |_| ParameterConversion {
                renamed_to: None,
                route_to: route,
            },
        )
    }

    /// Route the parameter called `name` to `route`.
    pub fn for_name(name: impl Into<String>, route: Route) -> Self {
        let name = name.into();
        Self::new(
            move |p| p.name.as_deref() == Some(name.as_str()),
            move |_| ParameterConversion {
                renamed_to: None,
                route_to: route,
            },
        )
    }

    pub fn can_handle(&self, parameter: &ParameterDescriptor) -> bool {
        (self.can_handle)(parameter)
    }

    pub fn handle(&self, parameter: &ParameterDescriptor) -> ParameterConversion {
        (self.handle)(parameter)
    }
}

impl std::fmt::Debug for ConversionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ConversionRule")
    }
}

/// A typed name as it appears in a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared {
    /// Rendered type
    pub ty: String,
    pub name: String,
}

impl Declared {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
        }
    }

    /// Backing field of a constructor parameter
    pub fn field(&self) -> String {
        format!("_{}", self.name)
    }
}

/// One wrapped call after routing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedCall {
    /// Parameters of the generated method
    pub parameters: Vec<Declared>,
    /// Expressions forwarded to the wrapped call, in the original order
    pub arguments: Vec<String>,
}

/// Constructor parameters and properties collected over every routed call
/// of one generated type. Entries are unique by name.
#[derive(Debug, Clone, Default)]
pub struct RoutedMembers {
    constructor: Vec<Declared>,
    properties: Vec<Declared>,
}

impl RoutedMembers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constructor(&self) -> &[Declared] {
        &self.constructor
    }

    pub fn properties(&self) -> &[Declared] {
        &self.properties
    }

    /// Every identifier the routed members occupy in the generated class.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.constructor.len() * 2 + self.properties.len());
        for declared in &self.constructor {
            names.push(declared.name.clone());
            names.push(declared.field());
        }
        names.extend(self.properties.iter().map(|p| p.name.clone()));
        names
    }

    /// Add a constructor parameter backed by a field.
    pub fn add_constructor_parameter(&mut self, ty: String, name: String) {
        if !self.constructor.iter().any(|c| c.name == name) {
            self.constructor.push(Declared::new(ty, name));
        }
    }

    fn add_property(&mut self, ty: String, name: String) {
        if !self.properties.iter().any(|p| p.name == name) {
            self.properties.push(Declared::new(ty, name));
        }
    }

    /// Route `parameters` through `rules`. The first matching rule decides;
    /// parameters no rule matches stay method parameters.
    pub fn route(
        &mut self,
        parameters: &[ParameterDescriptor],
        rules: &[ConversionRule],
        render: impl Fn(&TypeDescriptor) -> String,
    ) -> RoutedCall {
        let mut call = RoutedCall::default();
        for parameter in parameters {
            let mut name = parameter
                .name
                .clone()
                .unwrap_or_else(|| format!("arg{}", parameter.position));
            let ty = render(&parameter.ty);

            let conversion = rules
                .iter()
                .find(|rule| rule.can_handle(parameter))
                .map(|rule| rule.handle(parameter))
                .unwrap_or_default();
            if let Some(renamed) = conversion.renamed_to.filter(|n| !n.trim().is_empty()) {
                name = renamed;
            }

            match conversion.route_to {
                Route::ConstructorParameter => {
                    let declared = Declared::new(ty.clone(), name.clone());
                    call.arguments.push(declared.field());
                    self.add_constructor_parameter(ty, name);
                }
                Route::PublicProperty => {
                    let property = property_name(&name);
                    call.arguments.push(property.clone());
                    self.add_property(ty, property);
                }
                Route::MethodParameter => {
                    call.arguments.push(name.clone());
                    call.parameters.push(Declared::new(ty, name));
                }
            }
        }
        call
    }
}

/// Title-case each word; append `Prop` when that changes nothing.
pub fn property_name(parameter: &str) -> String {
    let titled = title_case(parameter);
    if titled == parameter {
        format!("{}Prop", titled)
    } else {
        titled
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}
