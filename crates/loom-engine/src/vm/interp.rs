//! Tree-walking interpreter for lowered class bodies

use std::cell::Cell;
use std::sync::Arc;

use loom_sdk::{core_types, CachedValue, HostError, ObjectRef, PrimitiveKind, TypeKind, Value};
use uuid::Uuid;

use super::class::{GeneratedType, ResolvedType};
use super::instance::Instance;
use super::{VmError, VmResult, MAX_CALL_DEPTH};
use crate::compiler::ir::*;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Tracks nesting of generated calls on the current thread.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> VmResult<Self> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                return Err(VmError::StackOverflow);
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

enum Flow {
    Normal,
    Return(Value),
}

/// Run a method, constructor or accessor body against `this`.
///
/// Arguments are converted to the declared parameter types and the result to
/// the declared return type. Void functions yield `Null`.
pub(super) fn call_function(this: &Arc<Instance>, function: &IrFunction, args: &[Value]) -> VmResult<Value> {
    let _guard = DepthGuard::enter()?;
    let class = this.generated_type();
    if args.len() != function.params.len() {
        return Err(HostError::ArityMismatch {
            expected: function.params.len(),
            got: args.len(),
        }
        .into());
    }

    let mut locals = vec![Value::Null; function.locals.max(args.len())];
    for (index, (param, arg)) in function.params.iter().zip(args).enumerate() {
        locals[index] = convert(class, arg.clone(), class.resolved(&param.ty)?)?;
    }

    let mut frame = Frame { this, class, locals };
    let result = match frame.exec_block(&function.body)? {
        Flow::Return(value) => value,
        Flow::Normal => Value::Null,
    };
    match &function.return_type {
        Some(ty) => convert(class, result, class.resolved(ty)?),
        None => Ok(Value::Null),
    }
}

/// Evaluate a field initializer.
pub(super) fn eval_initializer(this: &Arc<Instance>, expr: &IrExpr) -> VmResult<Value> {
    let mut frame = Frame {
        this,
        class: this.generated_type(),
        locals: Vec::new(),
    };
    frame.eval(expr)
}

pub(super) fn invoke_public(this: &Arc<Instance>, name: &str, args: &[Value]) -> VmResult<Value> {
    invoke_method(this, name, args, false)
}

pub(super) fn get_public_property(this: &Arc<Instance>, name: &str) -> VmResult<Value> {
    get_property(this, name, false)
}

pub(super) fn set_public_property(this: &Arc<Instance>, name: &str, value: Value) -> VmResult<()> {
    set_property(this, name, value, false)
}

/// Call a method by name and arity, falling back to the base object.
fn invoke_method(this: &Arc<Instance>, name: &str, args: &[Value], internal: bool) -> VmResult<Value> {
    let class = this.generated_type();
    if let Some(method) = class.method(name, args.len()).filter(|m| internal || m.public) {
        return call_function(this, method, args);
    }
    match this.base_object() {
        Some(base) => Ok(base.invoke(name, args)?),
        None => Err(missing(class, name)),
    }
}

fn get_property(this: &Arc<Instance>, name: &str, internal: bool) -> VmResult<Value> {
    let class = this.generated_type();
    if let Some(prop) = class.property(name).filter(|p| internal || p.public) {
        return match &prop.getter {
            Some(IrAccessor::Auto { slot }) => this.load_slot(*slot),
            Some(IrAccessor::Body(getter)) => call_function(this, getter, &[]),
            None => Err(missing(class, name)),
        };
    }
    if internal {
        if let Some(field) = class.class.find_field(name) {
            return this.load_slot(field.slot);
        }
    }
    match this.base_object() {
        Some(base) => Ok(base.get_property(name)?),
        None => Err(missing(class, name)),
    }
}

fn set_property(this: &Arc<Instance>, name: &str, value: Value, internal: bool) -> VmResult<()> {
    let class = this.generated_type();
    if let Some(prop) = class.property(name).filter(|p| internal || p.public) {
        return match &prop.setter {
            Some(IrAccessor::Auto { slot }) => this.store_slot(*slot, value).map(drop),
            Some(IrAccessor::Body(setter)) => call_function(this, setter, &[value]).map(drop),
            None => Err(HostError::ReadOnly(name.to_string()).into()),
        };
    }
    if internal {
        if let Some(field) = class.class.find_field(name) {
            return this.store_slot(field.slot, value).map(drop);
        }
    }
    match this.base_object() {
        Some(base) => Ok(base.set_property(name, value)?),
        None => Err(missing(class, name)),
    }
}

fn missing(class: &GeneratedType, member: &str) -> VmError {
    VmError::MissingMember {
        type_name: class.full_name(),
        member: member.to_string(),
    }
}

/// Convert `value` to a declared type, failing when it does not fit.
pub(super) fn convert(class: &GeneratedType, value: Value, ty: &ResolvedType) -> VmResult<Value> {
    let fits = match ty {
        ResolvedType::Own => match &value {
            Value::Null => true,
            Value::Object(obj) => obj.type_descriptor().is_assignable_to(&class.descriptor),
            _ => false,
        },
        ResolvedType::Host(target) => match target.kind() {
            TypeKind::Primitive(PrimitiveKind::Int32) => {
                matches!(value, Value::Int(i) if i32::try_from(i).is_ok())
            }
            TypeKind::Primitive(PrimitiveKind::Int64) => matches!(value, Value::Int(_)),
            TypeKind::Primitive(PrimitiveKind::Double) => {
                return match value {
                    Value::Float(_) => Ok(value),
                    Value::Int(i) => Ok(Value::Float(i as f64)),
                    other => Err(cannot_convert(&other, &target.to_string())),
                };
            }
            TypeKind::Primitive(PrimitiveKind::Boolean) => matches!(value, Value::Bool(_)),
            TypeKind::Primitive(PrimitiveKind::String) => matches!(value, Value::Str(_) | Value::Null),
            TypeKind::Primitive(PrimitiveKind::List) => matches!(value, Value::List(_) | Value::Null),
            TypeKind::Primitive(PrimitiveKind::Object) | TypeKind::Runtime | TypeKind::GenericParameter => true,
            TypeKind::Void => return Ok(Value::Null),
            TypeKind::Class | TypeKind::Interface => match &value {
                Value::Null => true,
                Value::Object(obj) => obj.type_descriptor().is_assignable_to(target),
                Value::Method(_) => target.key() == core_types().method_info.key(),
                _ => false,
            },
        },
    };
    if fits {
        Ok(value)
    } else {
        let name = match ty {
            ResolvedType::Own => class.full_name(),
            ResolvedType::Host(target) => target.to_string(),
        };
        Err(cannot_convert(&value, &name))
    }
}

fn cannot_convert(value: &Value, target: &str) -> VmError {
    VmError::TypeError(format!("Cannot convert {} to {}", value.type_name(), target))
}

struct Frame<'a> {
    this: &'a Arc<Instance>,
    class: &'a GeneratedType,
    locals: Vec<Value>,
}

impl Frame<'_> {
    fn exec_block(&mut self, stmts: &[IrStmt]) -> VmResult<Flow> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &IrStmt) -> VmResult<Flow> {
        match stmt {
            IrStmt::Let { local, value } => {
                let value = self.eval(value)?;
                self.store_local(*local, value)?;
                Ok(Flow::Normal)
            }
            IrStmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            IrStmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            IrStmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_bool(condition)? {
                    self.exec_block(then_branch)
                } else {
                    self.exec_block(else_branch)
                }
            }
            IrStmt::Block(stmts) => self.exec_block(stmts),
        }
    }

    fn store_local(&mut self, index: usize, value: Value) -> VmResult<()> {
        let slot = self
            .locals
            .get_mut(index)
            .ok_or_else(|| VmError::TypeError(format!("Local {} out of range", index)))?;
        *slot = value;
        Ok(())
    }

    fn eval_bool(&mut self, expr: &IrExpr) -> VmResult<bool> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(cannot_convert(&other, "core.Boolean")),
        }
    }

    fn eval_args(&mut self, args: &[IrExpr]) -> VmResult<Vec<Value>> {
        args.iter().map(|a| self.eval(a)).collect()
    }

    fn base(&self) -> VmResult<&ObjectRef> {
        self.this
            .base_object()
            .ok_or_else(|| VmError::TypeError(format!("'{}' has no base type", self.class.full_name())))
    }

    fn eval(&mut self, expr: &IrExpr) -> VmResult<Value> {
        match expr {
            IrExpr::Const(c) => Ok(match c {
                IrConst::Null => Value::Null,
                IrConst::Bool(b) => Value::Bool(*b),
                IrConst::Int(i) => Value::Int(*i),
                IrConst::Float(x) => Value::Float(*x),
                IrConst::Str(s) => Value::str(s),
            }),
            IrExpr::Local(index) => self
                .locals
                .get(*index)
                .cloned()
                .ok_or_else(|| VmError::TypeError(format!("Local {} out of range", index))),
            IrExpr::This => Ok(Value::Object(self.this.clone())),
            IrExpr::Slot(slot) => self.this.load_slot(*slot),
            IrExpr::SelfProperty(name) => get_property(self.this, name, true),
            IrExpr::BaseProperty(name) => Ok(self.base()?.get_property(name)?),
            IrExpr::GetMember { object, name } => {
                let object = self.eval(object)?;
                self.get_member(object, name)
            }
            IrExpr::CallSelf { name, args } => {
                let args = self.eval_args(args)?;
                invoke_method(self.this, name, &args, true)
            }
            IrExpr::CallBase { name, args } => {
                let args = self.eval_args(args)?;
                Ok(self.base()?.invoke(name, &args)?)
            }
            IrExpr::CallMember { object, name, args } => {
                let object = self.eval(object)?;
                let args = self.eval_args(args)?;
                self.call_member(object, name, &args)
            }
            IrExpr::Intrinsic { op, args } => {
                let args = self.eval_args(args)?;
                self.intrinsic(*op, &args)
            }
            IrExpr::New { ty, args } => {
                let args = self.eval_args(args)?;
                match self.class.resolved(ty)? {
                    ResolvedType::Own => Ok(Value::Object(self.class.create_instance(&args)?)),
                    ResolvedType::Host(target) => {
                        let activator = target
                            .activator()
                            .ok_or_else(|| HostError::NoActivator(target.full_name()))?;
                        Ok(Value::Object(activator(&args)?))
                    }
                }
            }
            IrExpr::Cast { value, ty } => {
                let value = self.eval(value)?;
                convert(self.class, value, self.class.resolved(ty)?)
            }
            IrExpr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Negate, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
                    (UnaryOp::Negate, Value::Float(x)) => Ok(Value::Float(-x)),
                    (UnaryOp::Not, other) => Err(cannot_convert(&other, "core.Boolean")),
                    (UnaryOp::Negate, other) => Err(VmError::TypeError(format!(
                        "Operator '-' cannot be applied to {}",
                        other.type_name()
                    ))),
                }
            }
            IrExpr::Binary { op, left, right } => self.binary(*op, left, right),
            IrExpr::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value)
            }
        }
    }

    fn assign(&mut self, target: &IrPlace, value: Value) -> VmResult<Value> {
        match target {
            IrPlace::Local(index) => {
                self.store_local(*index, value.clone())?;
                Ok(value)
            }
            IrPlace::Slot(slot) => self.this.store_slot(*slot, value),
            IrPlace::SelfProperty(name) => {
                set_property(self.this, name, value.clone(), true)?;
                Ok(value)
            }
            IrPlace::BaseProperty(name) => {
                self.base()?.set_property(name, value.clone())?;
                Ok(value)
            }
            IrPlace::Member { object, name } => {
                let object = self.eval(object)?;
                match object {
                    Value::Object(obj) => {
                        match self.same_class(&obj)? {
                            Some(inst) => set_property(&inst, name, value.clone(), true)?,
                            None => obj.set_property(name, value.clone())?,
                        }
                        Ok(value)
                    }
                    Value::Null => Err(VmError::NullReference(format!("cannot set '{}' on null", name))),
                    other => Err(VmError::MissingMember {
                        type_name: other.type_name().to_string(),
                        member: name.clone(),
                    }),
                }
            }
        }
    }

    /// `obj` as an instance of the executing class, which grants access to
    /// its private members.
    fn same_class(&self, obj: &ObjectRef) -> VmResult<Option<Arc<Instance>>> {
        match obj.as_any().downcast_ref::<Instance>() {
            Some(inst) if Arc::ptr_eq(inst.generated_type(), self.this.generated_type()) => Ok(Some(inst.strong()?)),
            _ => Ok(None),
        }
    }

    fn get_member(&self, object: Value, name: &str) -> VmResult<Value> {
        match (&object, name) {
            (Value::Null, _) => Err(VmError::NullReference(format!("cannot read '{}' of null", name))),
            (Value::Str(s), "Length") => Ok(Value::Int(s.chars().count() as i64)),
            (Value::List(items), "Count") => Ok(Value::Int(items.len() as i64)),
            (Value::Method(method), "Name") => Ok(Value::str(&method.name)),
            (Value::Object(obj), _) => match self.same_class(obj)? {
                Some(inst) => get_property(&inst, name, true),
                None => Ok(obj.get_property(name)?),
            },
            _ => Err(VmError::MissingMember {
                type_name: object.type_name().to_string(),
                member: name.to_string(),
            }),
        }
    }

    fn call_member(&self, object: Value, name: &str, args: &[Value]) -> VmResult<Value> {
        match (&object, name) {
            (Value::Null, _) => Err(VmError::NullReference(format!("cannot call '{}' on null", name))),
            (Value::Callable(callable), "invoke") => Ok(callable.invoke(args)?),
            (Value::Hook(hook), "invoke") => {
                hook.invoke(args)?;
                Ok(Value::Null)
            }
            (Value::Object(obj), _) => match self.same_class(obj)? {
                Some(inst) => invoke_method(&inst, name, args, true),
                None => Ok(obj.invoke(name, args)?),
            },
            _ => Err(VmError::MissingMember {
                type_name: object.type_name().to_string(),
                member: name.to_string(),
            }),
        }
    }

    fn intrinsic(&self, op: Intrinsic, args: &[Value]) -> VmResult<Value> {
        match op {
            Intrinsic::CacheCallable | Intrinsic::CacheInstance | Intrinsic::CacheHook => {
                let id = cache_id(args.first().unwrap_or(&Value::Null))?;
                let cached = self.class.source.lookup(&id)?;
                match (op, cached) {
                    (Intrinsic::CacheCallable, CachedValue::Callable(callable)) => Ok(Value::Callable(callable)),
                    (Intrinsic::CacheInstance, CachedValue::Instance(obj)) => Ok(Value::Object(obj)),
                    (Intrinsic::CacheInstance, CachedValue::Factory(activator)) => Ok(Value::Object(activator(&[])?)),
                    (Intrinsic::CacheHook, CachedValue::Hook(hook)) => Ok(Value::Hook(hook)),
                    (_, other) => Err(VmError::TypeError(format!(
                        "Cached value {} is a {}, not a {}",
                        id,
                        other.kind(),
                        match op {
                            Intrinsic::CacheCallable => "callable",
                            Intrinsic::CacheHook => "hook",
                            _ => "instance",
                        }
                    ))),
                }
            }
            Intrinsic::ReflectMethod => match args {
                [Value::Object(target), Value::Str(name)] => {
                    let descriptor = target.type_descriptor();
                    let method = descriptor.find_method_named(name).ok_or_else(|| VmError::MissingMember {
                        type_name: descriptor.full_name(),
                        member: name.to_string(),
                    })?;
                    Ok(Value::Method(Arc::new(method.clone())))
                }
                [Value::Null, _] => Err(VmError::NullReference("cannot reflect on null".to_string())),
                _ => Err(VmError::TypeError("Reflect.method expects (object, string)".to_string())),
            },
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &IrExpr, right: &IrExpr) -> VmResult<Value> {
        match op {
            BinaryOp::And => {
                let result = self.eval_bool(left)? && self.eval_bool(right)?;
                return Ok(Value::Bool(result));
            }
            BinaryOp::Or => {
                let result = self.eval_bool(left)? || self.eval_bool(right)?;
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        let l = self.eval(left)?;
        let r = self.eval(right)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(l == r)),
            BinaryOp::Ne => Ok(Value::Bool(l != r)),
            BinaryOp::Add if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) => {
                Ok(Value::from(format!("{}{}", concat_text(&l), concat_text(&r))))
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let (a, b) = match (&l, &r) {
                    (Value::Int(a), Value::Int(b)) => return Ok(Value::Bool(compare(op, a, b))),
                    _ => (numeric(&l, op)?, numeric(&r, op)?),
                };
                Ok(Value::Bool(compare(op, &a, &b)))
            }
            _ => arithmetic(op, l, r),
        }
    }
}

fn cache_id(value: &Value) -> VmResult<Uuid> {
    let text = value
        .as_str()
        .ok_or_else(|| VmError::TypeError(format!("Cache identifier must be a string, got {}", value.type_name())))?;
    Uuid::parse_str(text).map_err(|_| VmError::TypeError(format!("Invalid cache identifier '{}'", text)))
}

fn concat_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn compare<T: PartialOrd>(op: BinaryOp, a: &T, b: &T) -> bool {
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

fn numeric(value: &Value, op: BinaryOp) -> VmResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| VmError::TypeError(format!("Operator '{:?}' cannot be applied to {}", op, value.type_name())))
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> VmResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        return Ok(Value::Int(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div if b == 0 => return Err(VmError::DivideByZero),
            BinaryOp::Div => a.wrapping_div(b),
            BinaryOp::Rem if b == 0 => return Err(VmError::DivideByZero),
            BinaryOp::Rem => a.wrapping_rem(b),
            _ => return Err(VmError::TypeError(format!("Unsupported operator {:?}", op))),
        }));
    }
    let (a, b) = (numeric(&l, op)?, numeric(&r, op)?);
    Ok(Value::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => return Err(VmError::TypeError(format!("Unsupported operator {:?}", op))),
    }))
}
