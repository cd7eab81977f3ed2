//! The built-in `core` unit
//!
//! Every compilation references this unit. It exports the primitive types,
//! the generic collection definitions, and the runtime support types whose
//! static methods the engine implements as intrinsics.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::types::{
    MethodDescriptor, PrimitiveKind, TypeDescriptor, TypeKind, UnitDescriptor,
};

/// Name of the built-in unit.
pub const CORE_UNIT: &str = "core";

/// Location reported by the built-in unit.
pub const CORE_LOCATION: &str = "loom:core";

/// Handles to every type the core unit exports.
pub struct CoreTypes {
    /// The unit itself
    pub unit: Arc<UnitDescriptor>,
    /// `core.Int32`
    pub int32: Arc<TypeDescriptor>,
    /// `core.Int64`
    pub int64: Arc<TypeDescriptor>,
    /// `core.Double`
    pub double: Arc<TypeDescriptor>,
    /// `core.Boolean`
    pub boolean: Arc<TypeDescriptor>,
    /// `core.String`
    pub string: Arc<TypeDescriptor>,
    /// `core.Object`
    pub object: Arc<TypeDescriptor>,
    /// `core.Void`
    pub void: Arc<TypeDescriptor>,
    /// ``core.List`1``
    pub list: Arc<TypeDescriptor>,
    /// ``core.Map`2``
    pub map: Arc<TypeDescriptor>,
    /// `core.MethodInfo`
    pub method_info: Arc<TypeDescriptor>,
    /// `core.ValueCache`
    pub value_cache: Arc<TypeDescriptor>,
    /// `core.Reflect`
    pub reflect: Arc<TypeDescriptor>,
}

impl CoreTypes {
    fn build() -> Self {
        let unit = UnitDescriptor::located(CORE_UNIT, CORE_LOCATION);
        let prim = |name: &str, kind: PrimitiveKind| {
            TypeDescriptor::of_kind(CORE_UNIT, name, TypeKind::Primitive(kind)).build(&unit)
        };

        let int32 = prim("Int32", PrimitiveKind::Int32);
        let int64 = prim("Int64", PrimitiveKind::Int64);
        let double = prim("Double", PrimitiveKind::Double);
        let boolean = prim("Boolean", PrimitiveKind::Boolean);
        let string = prim("String", PrimitiveKind::String);
        let object = prim("Object", PrimitiveKind::Object);
        let list = prim("List`1", PrimitiveKind::List);
        let void = TypeDescriptor::of_kind(CORE_UNIT, "Void", TypeKind::Void).build(&unit);
        let map = TypeDescriptor::class(CORE_UNIT, "Map`2").build(&unit);

        let method_info = TypeDescriptor::class(CORE_UNIT, "MethodInfo")
            .property(crate::types::PropertyDescriptor::new("Name", string.clone()).read_only())
            .build(&unit);

        let value_cache = TypeDescriptor::of_kind(CORE_UNIT, "ValueCache", TypeKind::Runtime)
            .method(MethodDescriptor::new("callable", object.clone()).param("id", string.clone()).static_())
            .method(MethodDescriptor::new("instance", object.clone()).param("id", string.clone()).static_())
            .method(MethodDescriptor::new("hook", object.clone()).param("id", string.clone()).static_())
            .build(&unit);

        let reflect = TypeDescriptor::of_kind(CORE_UNIT, "Reflect", TypeKind::Runtime)
            .method(
                MethodDescriptor::new("method", method_info.clone())
                    .param("target", object.clone())
                    .param("name", string.clone())
                    .static_(),
            )
            .build(&unit);

        Self {
            unit,
            int32,
            int64,
            double,
            boolean,
            string,
            object,
            void,
            list,
            map,
            method_info,
            value_cache,
            reflect,
        }
    }

    /// Resolve a source-level alias (`int`, `string`, ...) to a core type.
    pub fn alias(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        match name {
            "int" => Some(&self.int32),
            "long" => Some(&self.int64),
            "double" => Some(&self.double),
            "bool" => Some(&self.boolean),
            "string" => Some(&self.string),
            "object" => Some(&self.object),
            "void" => Some(&self.void),
            _ => None,
        }
    }
}

static CORE: Lazy<CoreTypes> = Lazy::new(CoreTypes::build);

/// The process-wide core unit.
pub fn core_types() -> &'static CoreTypes {
    &CORE
}
