//! Query expression trees.
//!
//! An [`Expr`] is the inspectable form of a predicate or projection written
//! against native types. Every node knows its static [`Type`], which drives
//! converter resolution for literals and override lookup in the compiler.
//! Members, methods and constructors optionally carry a client-side
//! implementation used when a parameter-free subtree is folded locally.

use crate::error::{Error, Result};
use crate::native::{Native, RecordType, Type, Value};
use std::fmt;
use std::sync::Arc;

/// Client-side getter for a member; `None` target for static members.
pub type Getter = Arc<dyn Fn(Option<&Value>) -> Result<Value> + Send + Sync>;

/// Client-side implementation of a method or constructor.
pub type Invoke = Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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
    /// `list[i]`, `map[key]`
    Index,
    /// `option ?? fallback`
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Index => "[]",
            BinaryOp::Coalesce => "??",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
    Length,
}

/// A lambda parameter. Names identify parameters within one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

impl Parameter {
    pub fn new<S: Into<String>>(name: S, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// A parameter typed by a Rust type.
    pub fn of<T: Native, S: Into<String>>(name: S) -> Self {
        Self::new(name, T::native_type())
    }
}

/// A field or property. Record fields need no getter.
#[derive(Clone)]
pub struct Member {
    /// Declaring type; for static members the type they hang off.
    pub owner: Type,
    pub name: String,
    pub ty: Type,
    pub getter: Option<Getter>,
}

impl Member {
    pub fn new<S: Into<String>>(owner: Type, name: S, ty: Type) -> Self {
        Self {
            owner,
            name: name.into(),
            ty,
            getter: None,
        }
    }

    pub fn with_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(Option<&Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("getter", &self.getter.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct Method {
    pub owner: Type,
    pub name: String,
    pub ret: Type,
    pub invoke: Option<Invoke>,
}

impl Method {
    pub fn new<S: Into<String>>(owner: Type, name: S, ret: Type) -> Self {
        Self {
            owner,
            name: name.into(),
            ret,
            invoke: None,
        }
    }

    pub fn with_invoke<F>(mut self, invoke: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.invoke = Some(Arc::new(invoke));
        self
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("ret", &self.ret)
            .field("invoke", &self.invoke.is_some())
            .finish()
    }
}

/// A named constructor, e.g. `TimeDelta::minutes`.
#[derive(Clone)]
pub struct Constructor {
    pub ty: Type,
    pub name: String,
    pub invoke: Option<Invoke>,
}

impl Constructor {
    pub fn new<S: Into<String>>(ty: Type, name: S) -> Self {
        Self {
            ty,
            name: name.into(),
            invoke: None,
        }
    }

    pub fn with_invoke<F>(mut self, invoke: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.invoke = Some(Arc::new(invoke));
        self
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("ty", &self.ty)
            .field("name", &self.name)
            .field("invoke", &self.invoke.is_some())
            .finish()
    }
}

/// A zero-, one- or two-parameter function body.
#[derive(Debug, Clone)]
pub struct Lambda {
    pub params: Vec<Parameter>,
    pub body: Box<Expr>,
}

impl Lambda {
    pub fn new(params: Vec<Parameter>, body: Expr) -> Self {
        Self {
            params,
            body: Box::new(body),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Constant {
        value: Value,
        ty: Type,
    },
    Parameter(Parameter),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Member {
        target: Option<Box<Expr>>,
        member: Member,
    },
    Call {
        method: Method,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    New {
        ctor: Constructor,
        args: Vec<Expr>,
    },
    /// Record construction by field assignment.
    MemberInit {
        ty: Arc<RecordType>,
        bindings: Vec<(String, Expr)>,
    },
    NewArray {
        elem: Type,
        items: Vec<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// Type conversion or widening.
    Convert {
        operand: Box<Expr>,
        ty: Type,
    },
    Lambda(Lambda),
}

impl Expr {
    pub fn constant<T: Native>(value: T) -> Expr {
        Expr::Constant {
            value: value.to_value(),
            ty: T::native_type(),
        }
    }

    pub fn typed_constant(value: Value, ty: Type) -> Expr {
        Expr::Constant { value, ty }
    }

    pub fn param(param: &Parameter) -> Expr {
        Expr::Parameter(param.clone())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn add(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, left, right)
    }

    pub fn sub(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Mul, left, right)
    }

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, left, right)
    }

    pub fn ne(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Ne, left, right)
    }

    pub fn lt(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Lt, left, right)
    }

    pub fn gt(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Gt, left, right)
    }

    pub fn ge(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Ge, left, right)
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::And, left, right)
    }

    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Or, left, right)
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::unary(UnaryOp::Not, operand)
    }

    pub fn index(target: Expr, index: Expr) -> Expr {
        Expr::binary(BinaryOp::Index, target, index)
    }

    pub fn coalesce(option: Expr, fallback: Expr) -> Expr {
        Expr::binary(BinaryOp::Coalesce, option, fallback)
    }

    /// Access a declared field of this record-typed expression.
    pub fn field(self, name: &str) -> Result<Expr> {
        let owner = self.ty();
        let record = match &owner {
            Type::Record(r) => r.clone(),
            Type::Option(inner) => inner
                .as_record()
                .cloned()
                .ok_or_else(|| Error::InvalidArgument(format!("{} has no fields", owner)))?,
            other => return Err(Error::InvalidArgument(format!("{} has no fields", other))),
        };
        let field = record.field(name).ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no field '{}'", record.name, name))
        })?;
        let member = Member::new(owner.clone(), name, field.ty.clone());
        Ok(Expr::member(Some(self), member))
    }

    pub fn member(target: Option<Expr>, member: Member) -> Expr {
        Expr::Member {
            target: target.map(Box::new),
            member,
        }
    }

    /// Instance method call when `target` is set, static call otherwise.
    pub fn call(method: Method, target: Option<Expr>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            method,
            target: target.map(Box::new),
            args,
        }
    }

    pub fn new_object(ctor: Constructor, args: Vec<Expr>) -> Expr {
        Expr::New { ctor, args }
    }

    pub fn member_init<S: Into<String>>(ty: Arc<RecordType>, bindings: Vec<(S, Expr)>) -> Expr {
        Expr::MemberInit {
            ty,
            bindings: bindings.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn new_array(elem: Type, items: Vec<Expr>) -> Expr {
        Expr::NewArray { elem, items }
    }

    pub fn conditional(test: Expr, if_true: Expr, if_false: Expr) -> Expr {
        Expr::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    pub fn convert(operand: Expr, ty: Type) -> Expr {
        Expr::Convert {
            operand: Box::new(operand),
            ty,
        }
    }

    pub fn lambda(params: Vec<Parameter>, body: Expr) -> Expr {
        Expr::Lambda(Lambda::new(params, body))
    }

    /// Static type of the node.
    pub fn ty(&self) -> Type {
        match self {
            Expr::Constant { ty, .. } => ty.clone(),
            Expr::Parameter(p) => p.ty.clone(),
            Expr::Binary { op, left, right } => binary_type(*op, &left.ty(), &right.ty()),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => Type::Bool,
                UnaryOp::Negate => operand.ty(),
                UnaryOp::Length => Type::I64,
            },
            Expr::Member { member, .. } => member.ty.clone(),
            Expr::Call { method, .. } => method.ret.clone(),
            Expr::New { ctor, .. } => ctor.ty.clone(),
            Expr::MemberInit { ty, .. } => Type::Record(ty.clone()),
            Expr::NewArray { elem, .. } => Type::list(elem.clone()),
            Expr::Conditional { if_true, .. } => if_true.ty(),
            Expr::Convert { ty, .. } => ty.clone(),
            Expr::Lambda(_) => Type::Dynamic,
        }
    }

    /// First free parameter reference in this subtree. Parameters bound by a
    /// nested lambda inside the subtree do not count.
    pub fn first_parameter(&self) -> Option<&Parameter> {
        self.first_free_parameter(&[])
    }

    fn first_free_parameter<'a>(&'a self, bound: &[&'a Parameter]) -> Option<&'a Parameter> {
        let free = |e: &'a Expr| e.first_free_parameter(bound);
        match self {
            Expr::Parameter(p) if bound.contains(&p) => None,
            Expr::Parameter(p) => Some(p),
            Expr::Constant { .. } => None,
            Expr::Binary { left, right, .. } => free(left).or_else(|| free(right)),
            Expr::Unary { operand, .. } | Expr::Convert { operand, .. } => free(operand),
            Expr::Member { target, .. } => target.as_deref().and_then(free),
            Expr::Call { target, args, .. } => target
                .as_deref()
                .and_then(free)
                .or_else(|| args.iter().find_map(free)),
            Expr::New { args, .. } | Expr::NewArray { items: args, .. } => {
                args.iter().find_map(free)
            }
            Expr::MemberInit { bindings, .. } => bindings.iter().find_map(|(_, e)| free(e)),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => free(test)
                .or_else(|| free(if_true))
                .or_else(|| free(if_false)),
            Expr::Lambda(lambda) => {
                let mut inner = bound.to_vec();
                inner.extend(lambda.params.iter());
                lambda.body.first_free_parameter(&inner)
            }
        }
    }

    /// Whether any parameter is referenced; such subtrees never fold locally.
    pub fn references_parameters(&self) -> bool {
        self.first_parameter().is_some()
    }
}

/// Result type of a binary operator.
fn binary_type(op: BinaryOp, left: &Type, right: &Type) -> Type {
    if op.is_comparison() || op.is_logical() {
        return Type::Bool;
    }
    match op {
        BinaryOp::Index => match left {
            Type::List(elem) | Type::Map(elem) => (**elem).clone(),
            _ => Type::Dynamic,
        },
        BinaryOp::Coalesce => match left {
            Type::Option(inner) if right.is_nullable() => Type::option((**inner).clone()),
            Type::Option(inner) => (**inner).clone(),
            other => other.clone(),
        },
        _ => arithmetic_type(left, right),
    }
}

fn arithmetic_type(left: &Type, right: &Type) -> Type {
    match (left, right) {
        (Type::String, _) => Type::String,
        (Type::DateTime | Type::DateTimeOffset, Type::Duration) => left.clone(),
        (Type::DateTime, Type::DateTime) | (Type::DateTimeOffset, Type::DateTimeOffset) => {
            Type::Duration
        }
        (l, r) if l.is_float() || r.is_float() => {
            if *l == Type::F32 && (*r == Type::F32 || Type::F32.is_assignable_from(r)) {
                Type::F32
            } else if *r == Type::F32 && Type::F32.is_assignable_from(l) {
                Type::F32
            } else {
                Type::F64
            }
        }
        (l, r) if l.is_integer() && r.is_integer() => {
            if l.is_assignable_from(r) {
                l.clone()
            } else if r.is_assignable_from(l) {
                r.clone()
            } else {
                Type::I64
            }
        }
        (l, _) => l.clone(),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant { value, .. } => write!(f, "{}", value),
            Expr::Parameter(p) => write!(f, "{}", p.name),
            Expr::Binary { op, left, right } if *op == BinaryOp::Index => {
                write!(f, "{}[{}]", left, right)
            }
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!{}", operand),
                UnaryOp::Negate => write!(f, "-{}", operand),
                UnaryOp::Length => write!(f, "len({})", operand),
            },
            Expr::Member { target: Some(t), member } => write!(f, "{}.{}", t, member.name),
            Expr::Member { target: None, member } => write!(f, "{}::{}", member.owner, member.name),
            Expr::Call { method, target, args } => {
                match target {
                    Some(t) => write!(f, "{}.{}(", t, method.name)?,
                    None => write!(f, "{}::{}(", method.owner, method.name)?,
                }
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::New { ctor, args } => {
                write!(f, "{}::{}(", ctor.ty, ctor.name)?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::MemberInit { ty, bindings } => {
                write!(f, "{} {{ ", ty.name)?;
                for (i, (name, value)) in bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, " }}")
            }
            Expr::NewArray { items, .. } => {
                write!(f, "[")?;
                write_args(f, items)?;
                write!(f, "]")
            }
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "if {} {{ {} }} else {{ {} }}", test, if_true, if_false),
            Expr::Convert { operand, ty } => write!(f, "({} as {})", operand, ty),
            Expr::Lambda(lambda) => {
                let names: Vec<&str> = lambda.params.iter().map(|p| p.name.as_str()).collect();
                write!(f, "|{}| {}", names.join(", "), lambda.body)
            }
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::FieldDescriptor;

    fn person() -> Parameter {
        let ty = RecordType::declared(
            "Person",
            vec![
                FieldDescriptor::new("name", Type::String),
                FieldDescriptor::new("age", Type::I32),
            ],
        );
        Parameter::new("p", Type::Record(ty))
    }

    #[test]
    fn test_field_access_types() {
        let age = Expr::param(&person()).field("age").unwrap();
        assert_eq!(age.ty(), Type::I32);
        assert!(Expr::param(&person()).field("height").is_err());
        assert!(Expr::constant(1i32).field("age").is_err());
    }

    #[test]
    fn test_operator_types() {
        let age = Expr::param(&person()).field("age").unwrap();
        assert_eq!(Expr::gt(age.clone(), Expr::constant(18i32)).ty(), Type::Bool);
        assert_eq!(Expr::add(age.clone(), Expr::constant(1i64)).ty(), Type::I64);
        assert_eq!(Expr::mul(age, Expr::constant(0.5f64)).ty(), Type::F64);
        assert_eq!(
            Expr::coalesce(Expr::constant(Some(3i32)), Expr::constant(0i32)).ty(),
            Type::I32
        );
    }

    #[test]
    fn test_parameter_references() {
        let p = person();
        let body = Expr::and(
            Expr::constant(true),
            Expr::eq(Expr::param(&p).field("name").unwrap(), Expr::constant("Ann".to_string())),
        );
        assert_eq!(body.first_parameter().map(|p| p.name.as_str()), Some("p"));
        assert!(!Expr::add(Expr::constant(1i32), Expr::constant(2i32)).references_parameters());
    }

    #[test]
    fn test_lambda_own_parameters_are_not_free() {
        let p = person();
        let x = Parameter::new("x", Type::I64);
        let closed = Expr::lambda(vec![x.clone()], Expr::param(&x));
        assert!(closed.first_parameter().is_none());

        let captures = Expr::lambda(
            vec![x.clone()],
            Expr::add(Expr::param(&x), Expr::param(&p).field("age").unwrap()),
        );
        assert_eq!(captures.first_parameter().map(|p| p.name.as_str()), Some("p"));
    }

    #[test]
    fn test_display() {
        let p = person();
        let body = Expr::gt(Expr::param(&p).field("age").unwrap(), Expr::constant(18i32));
        assert_eq!(body.to_string(), "(p.age > 18)");
        assert_eq!(Expr::lambda(vec![p], body).to_string(), "|p| (p.age > 18)");
    }
}
