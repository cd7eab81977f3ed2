//! Instances of generated classes

use std::any::Any;
use std::sync::{Arc, Weak};

use loom_sdk::{HostError, HostObject, HostResult, ObjectRef, PrimitiveKind, TypeDescriptor, TypeKind, Value};
use parking_lot::Mutex;

use super::class::{GeneratedType, ResolvedType};
use super::interp;
use super::{VmError, VmResult};

/// A live object of a generated class.
///
/// Slot state sits behind a mutex that is only held while a slot is read or
/// written, never across a call.
pub struct Instance {
    class: Arc<GeneratedType>,
    slots: Mutex<Vec<Value>>,
    base: Option<ObjectRef>,
    this: Weak<Instance>,
}

impl Instance {
    pub(super) fn construct(class: &Arc<GeneratedType>, args: &[Value]) -> VmResult<ObjectRef> {
        let ctor = if class.class.constructors.is_empty() {
            if !args.is_empty() {
                return Err(VmError::NoConstructor {
                    type_name: class.full_name(),
                    arity: args.len(),
                });
            }
            None
        } else {
            let found = class.class.find_constructor(args.len()).ok_or_else(|| VmError::NoConstructor {
                type_name: class.full_name(),
                arity: args.len(),
            })?;
            Some(found)
        };

        let base = match &class.base {
            Some(base) => {
                let activator = base
                    .activator()
                    .ok_or_else(|| HostError::NoActivator(base.full_name()))?;
                Some(activator(&[])?)
            }
            None => None,
        };

        let slots = class.slot_types.iter().map(default_value).collect();
        let instance = Arc::new_cyclic(|this: &Weak<Instance>| Instance {
            class: class.clone(),
            slots: Mutex::new(slots),
            base,
            this: this.clone(),
        });

        for field in &class.class.fields {
            if let Some(init) = &field.initializer {
                let value = interp::eval_initializer(&instance, init)?;
                instance.store_slot(field.slot, value)?;
            }
        }
        if let Some(ctor) = ctor {
            interp::call_function(&instance, ctor, args)?;
        }
        Ok(instance)
    }

    /// The class this object is an instance of
    pub fn generated_type(&self) -> &Arc<GeneratedType> {
        &self.class
    }

    /// Object created for the base class, if the class has one
    pub fn base_object(&self) -> Option<&ObjectRef> {
        self.base.as_ref()
    }

    pub(super) fn strong(&self) -> VmResult<Arc<Instance>> {
        self.this
            .upgrade()
            .ok_or_else(|| VmError::NullReference(format!("instance of '{}' was dropped", self.class.full_name())))
    }

    pub(super) fn load_slot(&self, slot: usize) -> VmResult<Value> {
        self.slots
            .lock()
            .get(slot)
            .cloned()
            .ok_or_else(|| VmError::TypeError(format!("Slot {} out of range", slot)))
    }

    /// Convert `value` to the slot's type and store it. Returns the stored value.
    pub(super) fn store_slot(&self, slot: usize, value: Value) -> VmResult<Value> {
        let ty = self
            .class
            .slot_types
            .get(slot)
            .ok_or_else(|| VmError::TypeError(format!("Slot {} out of range", slot)))?;
        let value = interp::convert(&self.class, value, ty)?;
        if let Some(target) = self.slots.lock().get_mut(slot) {
            *target = value.clone();
        }
        Ok(value)
    }
}

impl HostObject for Instance {
    fn type_descriptor(&self) -> Arc<TypeDescriptor> {
        self.class.descriptor.clone()
    }

    fn invoke(&self, method: &str, args: &[Value]) -> HostResult<Value> {
        let this = self.strong()?;
        Ok(interp::invoke_public(&this, method, args)?)
    }

    fn get_property(&self, name: &str) -> HostResult<Value> {
        let this = self.strong()?;
        Ok(interp::get_public_property(&this, name)?)
    }

    fn set_property(&self, name: &str, value: Value) -> HostResult<()> {
        let this = self.strong()?;
        interp::set_public_property(&this, name, value)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Instance<{}>", self.class.full_name())
    }
}

/// Zero value for a slot of the given type.
fn default_value(ty: &ResolvedType) -> Value {
    match ty {
        ResolvedType::Host(d) => match d.kind() {
            TypeKind::Primitive(PrimitiveKind::Int32) | TypeKind::Primitive(PrimitiveKind::Int64) => Value::Int(0),
            TypeKind::Primitive(PrimitiveKind::Double) => Value::Float(0.0),
            TypeKind::Primitive(PrimitiveKind::Boolean) => Value::Bool(false),
            _ => Value::Null,
        },
        ResolvedType::Own => Value::Null,
    }
}
