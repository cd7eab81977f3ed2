//! Lowered class representation
//!
//! The lowerer turns a checked AST into this form. Names are resolved to
//! local indices, instance slots, or member names, and every type reference
//! points at the unit that declares it. The whole tree is serialized into the
//! module payload and interpreted after loading.

use serde::{Deserialize, Serialize};

pub use crate::parser::ast::{BinaryOp, UnaryOp};

/// Reference to a type declared in some unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IrType {
    /// Declaring unit name
    pub unit: String,
    /// Full name including the arity marker (``core.List`1``)
    pub name: String,
    /// Generic arguments for constructed types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<IrType>,
}

impl IrType {
    pub fn new(unit: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            name: name.into(),
            args: Vec::new(),
        }
    }
}

impl std::fmt::Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "[")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// The single class a module defines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrClass {
    pub namespace: String,
    pub name: String,
    pub public: bool,
    pub base: Option<IrType>,
    pub interfaces: Vec<IrType>,
    /// Number of instance slots (fields plus auto property backing stores)
    pub slots: usize,
    pub fields: Vec<IrField>,
    pub properties: Vec<IrProperty>,
    pub constructors: Vec<IrFunction>,
    pub methods: Vec<IrFunction>,
}

impl IrClass {
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn find_method(&self, name: &str, arity: usize) -> Option<&IrFunction> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.params.len() == arity)
    }

    pub fn find_constructor(&self, arity: usize) -> Option<&IrFunction> {
        self.constructors.iter().find(|c| c.params.len() == arity)
    }

    pub fn find_property(&self, name: &str) -> Option<&IrProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn find_field(&self, name: &str) -> Option<&IrField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrField {
    pub name: String,
    pub ty: IrType,
    pub public: bool,
    pub slot: usize,
    /// Evaluated during construction, before any constructor body
    pub initializer: Option<IrExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrProperty {
    pub name: String,
    pub ty: IrType,
    pub public: bool,
    pub getter: Option<IrAccessor>,
    pub setter: Option<IrAccessor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrAccessor {
    /// Reads or writes a backing slot
    Auto { slot: usize },
    /// Accessor with a body. Setters receive `value` in local 0.
    Body(IrFunction),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrParam {
    pub name: String,
    pub ty: IrType,
}

/// A method, constructor or accessor body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrFunction {
    pub name: String,
    pub public: bool,
    pub params: Vec<IrParam>,
    /// `None` for void
    pub return_type: Option<IrType>,
    /// Total local slots, parameters first
    pub locals: usize,
    pub body: Vec<IrStmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrStmt {
    Let { local: usize, value: IrExpr },
    Expr(IrExpr),
    Return(Option<IrExpr>),
    If {
        condition: IrExpr,
        then_branch: Vec<IrStmt>,
        else_branch: Vec<IrStmt>,
    },
    Block(Vec<IrStmt>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrConst {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Static members of the core runtime types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intrinsic {
    /// `core.ValueCache.callable(id)`
    CacheCallable,
    /// `core.ValueCache.instance(id)`
    CacheInstance,
    /// `core.ValueCache.hook(id)`
    CacheHook,
    /// `core.Reflect.method(target, name)`
    ReflectMethod,
}

impl Intrinsic {
    /// Map `Type.member` on a core runtime type.
    pub fn lookup(type_name: &str, member: &str) -> Option<Self> {
        match (type_name, member) {
            ("core.ValueCache", "callable") => Some(Intrinsic::CacheCallable),
            ("core.ValueCache", "instance") => Some(Intrinsic::CacheInstance),
            ("core.ValueCache", "hook") => Some(Intrinsic::CacheHook),
            ("core.Reflect", "method") => Some(Intrinsic::ReflectMethod),
            _ => None,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Intrinsic::ReflectMethod => 2,
            _ => 1,
        }
    }
}

/// Assignable locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrPlace {
    Local(usize),
    Slot(usize),
    /// Own property with a setter body
    SelfProperty(String),
    /// Property inherited from the base type
    BaseProperty(String),
    /// Property on an arbitrary object
    Member { object: Box<IrExpr>, name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrExpr {
    Const(IrConst),
    Local(usize),
    This,
    Slot(usize),
    /// Own property with a getter body
    SelfProperty(String),
    /// Property inherited from the base type
    BaseProperty(String),
    GetMember {
        object: Box<IrExpr>,
        name: String,
    },
    CallSelf {
        name: String,
        args: Vec<IrExpr>,
    },
    CallBase {
        name: String,
        args: Vec<IrExpr>,
    },
    CallMember {
        object: Box<IrExpr>,
        name: String,
        args: Vec<IrExpr>,
    },
    Intrinsic {
        op: Intrinsic,
        args: Vec<IrExpr>,
    },
    New {
        ty: IrType,
        args: Vec<IrExpr>,
    },
    /// Checked conversion, fails at run time when the value does not fit
    Cast {
        value: Box<IrExpr>,
        ty: IrType,
    },
    Unary {
        op: UnaryOp,
        operand: Box<IrExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<IrExpr>,
        right: Box<IrExpr>,
    },
    Assign {
        target: IrPlace,
        value: Box<IrExpr>,
    },
}

impl IrExpr {
    pub fn null() -> Self {
        IrExpr::Const(IrConst::Null)
    }
}
