//! Abstract syntax tree for Loom source.

use serde::{Deserialize, Serialize};

use super::token::Span;

/// A parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnit {
    pub imports: Vec<Import>,
    pub namespace: Option<QualifiedName>,
    pub classes: Vec<ClassDecl>,
    pub span: Span,
}

/// `import a.b.c;`
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: QualifiedName,
    pub span: Span,
}

/// Dotted name such as `App.Models`.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedName {
    pub parts: Vec<String>,
    pub span: Span,
}

impl QualifiedName {
    pub fn dotted(&self) -> String {
        self.parts.join(".")
    }
}

/// Reference to a type: a dotted path with optional generic arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub path: Vec<String>,
    pub args: Vec<TypeRef>,
    pub span: Span,
}

impl TypeRef {
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }

    pub fn is_void(&self) -> bool {
        self.args.is_empty() && self.path.len() == 1 && self.path[0] == "void"
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dotted())?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub visibility: Visibility,
    pub name: Identifier,
    /// Base class and interfaces, in declaration order
    pub supertypes: Vec<TypeRef>,
    pub members: Vec<Member>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(FieldDecl),
    Constructor(ConstructorDecl),
    Property(PropertyDecl),
    Method(MethodDecl),
}

impl Member {
    pub fn name(&self) -> &Identifier {
        match self {
            Member::Field(f) => &f.name,
            Member::Constructor(c) => &c.name,
            Member::Property(p) => &p.name,
            Member::Method(m) => &m.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub visibility: Visibility,
    pub ty: TypeRef,
    pub name: Identifier,
    pub initializer: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub ty: TypeRef,
    pub name: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    pub visibility: Visibility,
    pub name: Identifier,
    pub params: Vec<Parameter>,
    pub body: Block,
    pub span: Span,
}

/// `get;` (auto) or `get { ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub visibility: Visibility,
    pub ty: TypeRef,
    pub name: Identifier,
    pub getter: Option<Accessor>,
    pub setter: Option<Accessor>,
    pub span: Span,
}

impl PropertyDecl {
    /// Both accessors (where present) have no body.
    pub fn is_auto(&self) -> bool {
        self.getter.as_ref().map_or(true, |a| a.body.is_none())
            && self.setter.as_ref().map_or(true, |a| a.body.is_none())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub visibility: Visibility,
    pub return_type: TypeRef,
    pub name: Identifier,
    pub params: Vec<Parameter>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Var {
        name: Identifier,
        initializer: Expression,
        span: Span,
    },
    Return {
        value: Option<Expression>,
        span: Span,
    },
    If {
        condition: Expression,
        then_branch: Block,
        else_branch: Option<Block>,
        span: Span,
    },
    Expression(Expression),
    Block(Block),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Var { span, .. } | Statement::Return { span, .. } | Statement::If { span, .. } => *span,
            Statement::Expression(e) => e.span,
            Statement::Block(b) => b.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    This,
    Name(String),
    Member {
        object: Box<Expression>,
        name: Identifier,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    New {
        ty: TypeRef,
        args: Vec<Expression>,
    },
    As {
        expr: Box<Expression>,
        ty: TypeRef,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Assign {
        target: Box<Expression>,
        value: Box<Expression>,
    },
}

impl Expression {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Flatten `a.b.c` into `["a", "b", "c"]` when the expression is a pure name path.
    pub fn as_path(&self) -> Option<Vec<String>> {
        match &self.kind {
            ExprKind::Name(n) => Some(vec![n.clone()]),
            ExprKind::Member { object, name } => {
                let mut path = object.as_path()?;
                path.push(name.name.clone());
                Some(path)
            }
            _ => None,
        }
    }
}
