//! Expression-to-Term compiler.
//!
//! Lowers an [`Expr`] tree into the [`Term`] tree the server evaluates.
//!
//! # Dispatch
//!
//! Each node kind tries, in order:
//!
//! - **Operators**: a registered override for the operand types, then the
//!   built-in operator table
//! - **Members**: a registered override, a template, then a `GET_FIELD`
//!   through the owner's field name mapping
//! - **Calls**: a registered override, then a template
//! - **Constructors**: a registered override
//!
//! Anything left over is folded on the client when it references no
//! parameters, and embedded as a literal datum.
//!
//! # Example
//!
//! `|p| p.age > 18` over a `Person` record compiles to
//!
//! ```text
//! FUNC(MAKE_ARRAY(1), GT(GET_FIELD(VAR(1), "age"), 18))
//! ```

use super::defaults::register_defaults;
use super::eval::evaluate;
use super::expr::{BinaryOp, Expr, Lambda, UnaryOp};
use super::registry::ExpressionRegistry;
use super::scope::Scope;
use crate::convert::DatumEngine;
use crate::error::{Error, Result};
use crate::native::{Type, Value};
use crate::reql::{Datum, Term, TermType};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Compiles expressions against one [`DatumEngine`] and one registry.
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    engine: DatumEngine,
    registry: Arc<ExpressionRegistry>,
}

impl QueryCompiler {
    /// A compiler with only the built-in operator table.
    pub fn new(engine: DatumEngine) -> Self {
        Self {
            engine,
            registry: Arc::new(ExpressionRegistry::new()),
        }
    }

    /// A compiler with the default member, method and constructor mappings.
    pub fn with_defaults(engine: DatumEngine) -> Self {
        let registry = ExpressionRegistry::new();
        register_defaults(&registry);
        Self::with_registry(engine, Arc::new(registry))
    }

    pub fn with_registry(engine: DatumEngine, registry: Arc<ExpressionRegistry>) -> Self {
        Self { engine, registry }
    }

    pub fn engine(&self) -> &DatumEngine {
        &self.engine
    }

    pub fn registry(&self) -> &ExpressionRegistry {
        &self.registry
    }

    /// Compile a body whose parameters are already bound in `scope`.
    #[instrument(skip_all, fields(expr = %expr))]
    pub fn compile(&self, expr: &Expr, scope: &Scope) -> Result<Term> {
        let mut lowering = Lowering {
            compiler: self,
            scope: scope.clone(),
        };
        lowering.lower_body(expr)
    }

    /// Compile a lambda into `FUNC(MAKE_ARRAY(slots...), body)`.
    #[instrument(skip_all, fields(arity = lambda.params.len()))]
    pub fn compile_lambda(&self, lambda: &Lambda) -> Result<Term> {
        if lambda.params.len() > 2 {
            return Err(Error::TranslationUnsupported(format!(
                "lambdas take at most two parameters, got {}",
                lambda.params.len()
            )));
        }
        let mut lowering = Lowering {
            compiler: self,
            scope: Scope::new(),
        };
        lowering.lower_lambda(lambda)
    }
}

/// State of one compilation; handed to overrides so they can compile
/// their operands.
pub struct Lowering<'a> {
    compiler: &'a QueryCompiler,
    scope: Scope,
}

impl<'a> Lowering<'a> {
    pub fn engine(&self) -> &DatumEngine {
        &self.compiler.engine
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Compile a sub-expression.
    pub fn lower(&mut self, expr: &Expr) -> Result<Term> {
        self.lower_node(expr, false)
    }

    pub fn lower_all(&mut self, exprs: &[Expr]) -> Result<Vec<Term>> {
        exprs.iter().map(|e| self.lower(e)).collect()
    }

    /// Compile a lambda body, where record construction is allowed.
    pub fn lower_body(&mut self, expr: &Expr) -> Result<Term> {
        self.lower_node(expr, true)
    }

    /// Encode `value` as a literal through the engine's converter for `ty`.
    pub fn literal(&self, value: &Value, ty: &Type) -> Result<Term> {
        self.engine().encode_value(ty, value).map(Term::datum)
    }

    fn lower_lambda(&mut self, lambda: &Lambda) -> Result<Term> {
        let slots = self.scope.bind(&lambda.params)?;
        let body = self.lower_body(&lambda.body);
        self.scope.unbind(lambda.params.len());
        let body = body?;
        debug!(?slots, "compiled lambda");
        Ok(Term::func(&slots, body))
    }

    fn lower_node(&mut self, expr: &Expr, allow_records: bool) -> Result<Term> {
        match expr {
            Expr::Constant { value, ty } => self.literal(value, ty),
            Expr::Parameter(param) => Ok(Term::var(self.scope.slot_of(param)?)),
            Expr::Binary { op, left, right } => self.lower_binary(expr, *op, left, right),
            Expr::Unary { op, operand } => self.lower_unary(*op, operand),
            Expr::Member { target, member } => {
                let owner = member.owner.key();
                if let Some(f) = self.compiler.registry.member(&owner, &member.name) {
                    return f(self, target.as_deref());
                }
                if let Some(template) = self.compiler.registry.template(&owner, &member.name, None) {
                    let target = target.as_deref().map(|t| self.lower(t)).transpose()?;
                    return template.instantiate(target.as_ref(), &[]);
                }
                match target.as_deref() {
                    Some(t) if !matches!(t, Expr::Constant { .. }) => {
                        match self.wire_field_name(&t.ty(), &member.name)? {
                            Some(wire) => Ok(Term::get_field(self.lower(t)?, wire)),
                            None => self.fold(expr),
                        }
                    }
                    _ => self.fold(expr),
                }
            }
            Expr::Call {
                method,
                target,
                args,
            } => {
                let owner = method.owner.key();
                if let Some(f) = self.compiler.registry.method(&owner, &method.name) {
                    return f(self, target.as_deref(), args);
                }
                let first_arg = args.first().map(|a| a.ty().key());
                if let Some(template) =
                    self.compiler
                        .registry
                        .template(&owner, &method.name, first_arg.as_ref())
                {
                    template.check_arity(expr, args.len())?;
                    let target = target.as_deref().map(|t| self.lower(t)).transpose()?;
                    let args = self.lower_all(args)?;
                    return template.instantiate(target.as_ref(), &args);
                }
                self.fold(expr)
            }
            Expr::New { ctor, args } => {
                match self.compiler.registry.constructor(&ctor.ty.key(), &ctor.name) {
                    Some(f) => f(self, args),
                    None => self.fold(expr),
                }
            }
            Expr::MemberInit { ty, bindings } if allow_records => {
                let record = Type::Record(ty.clone());
                let mut members = Vec::with_capacity(bindings.len());
                for (name, value) in bindings {
                    let wire = self.engine().field_name_of(&record, name).map_err(|e| {
                        Error::TranslationUnsupported(format!("{}: {}", expr, e))
                    })?;
                    members.push((wire, self.lower_node(value, true)?));
                }
                Ok(Term::make_obj(members))
            }
            Expr::MemberInit { .. } => self.fold(expr),
            Expr::NewArray { items, .. } => Ok(Term::make_array(self.lower_all(items)?)),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => Ok(Term::branch(
                self.lower(test)?,
                self.lower_node(if_true, true)?,
                self.lower_node(if_false, true)?,
            )),
            Expr::Convert { operand, ty } => {
                if let Expr::Parameter(param) = operand.as_ref() {
                    if !ty.is_assignable_from(&param.ty) {
                        return Err(Error::TranslationUnsupported(format!(
                            "parameter '{}' of type {} cannot be converted to {}",
                            param.name, param.ty, ty
                        )));
                    }
                }
                self.lower_node(operand, allow_records)
            }
            Expr::Lambda(lambda) => self.lower_lambda(lambda),
        }
    }

    fn lower_binary(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Term> {
        let (lk, rk) = (left.ty().key(), right.ty().key());
        if let Some(f) = self.compiler.registry.binary(&lk, &rk, op) {
            return f(self, left, right);
        }
        match operator_term(op) {
            Some(term_type) => Ok(Term::new(term_type)
                .with_arg(self.lower(left)?)
                .with_arg(self.lower(right)?)),
            None => self.fold(expr),
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<Term> {
        if let Some(f) = self.compiler.registry.unary(&operand.ty().key(), op) {
            return f(self, operand);
        }
        let inner = self.lower(operand)?;
        Ok(match op {
            UnaryOp::Not => Term::not(inner),
            UnaryOp::Negate => Term::sub(vec![Term::datum(Datum::from(0)), inner]),
            UnaryOp::Length => Term::count(inner),
        })
    }

    /// Wire name of `member` on `ty`, when `ty` has a field name mapping.
    fn wire_field_name(&self, ty: &Type, member: &str) -> Result<Option<String>> {
        let ty = match ty {
            Type::Option(inner) => inner.as_ref(),
            other => other,
        };
        let converter = self.engine().resolve(ty)?;
        Ok(converter
            .field_names()
            .and_then(|names| names.datum_field_name(member))
            .map(str::to_string))
    }

    /// Client-side fallback for a subtree with no structural mapping.
    fn fold(&self, expr: &Expr) -> Result<Term> {
        if let Some(param) = expr.first_parameter() {
            return Err(Error::ServerVariableLeak(format!(
                "'{}' in {}",
                param.name, expr
            )));
        }
        if !self.engine().config().client_side_evaluation {
            return Err(Error::TranslationUnsupported(format!(
                "{} has no server-side mapping and client-side evaluation is disabled",
                expr
            )));
        }
        trace!(%expr, "folding on the client");
        let value = evaluate(expr)?;
        debug!(%expr, %value, "client-side evaluation");
        self.literal(&value, &expr.ty())
    }
}

/// Built-in operator table.
fn operator_term(op: BinaryOp) -> Option<TermType> {
    Some(match op {
        BinaryOp::Add => TermType::Add,
        BinaryOp::Sub => TermType::Sub,
        BinaryOp::Mul => TermType::Mul,
        BinaryOp::Div => TermType::Div,
        BinaryOp::Rem => TermType::Mod,
        BinaryOp::Eq => TermType::Eq,
        BinaryOp::Ne => TermType::Ne,
        BinaryOp::Lt => TermType::Lt,
        BinaryOp::Le => TermType::Le,
        BinaryOp::Gt => TermType::Gt,
        BinaryOp::Ge => TermType::Ge,
        BinaryOp::And => TermType::And,
        BinaryOp::Or => TermType::Or,
        BinaryOp::Index => TermType::Bracket,
        BinaryOp::Coalesce => TermType::Default,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::native::{FieldDescriptor, RecordType};
    use crate::query::expr::{Constructor, Method, Parameter};

    fn person_type() -> Arc<RecordType> {
        RecordType::declared(
            "Person",
            vec![
                FieldDescriptor::new("name", Type::String),
                FieldDescriptor::new("age", Type::I32).omit_default(),
                FieldDescriptor::new("email", Type::option(Type::String)).wire_name("mail"),
            ],
        )
    }

    fn person() -> Parameter {
        Parameter::new("p", Type::Record(person_type()))
    }

    fn compiler() -> QueryCompiler {
        QueryCompiler::new(DatumEngine::default())
    }

    #[test]
    fn test_field_access_uses_wire_name() {
        let p = person();
        let lambda = Lambda::new(vec![p.clone()], Expr::param(&p).field("email").unwrap());
        let term = compiler().compile_lambda(&lambda).unwrap();
        assert_eq!(
            term.to_compact_string(),
            "FUNC(MAKE_ARRAY(1), GET_FIELD(VAR(1), \"mail\"))"
        );
    }

    #[test]
    fn test_constant_folding_of_unmapped_call() {
        let p = person();
        let len = Method::new(Type::String, "char_count", Type::I64).with_invoke(|target, _| {
            Ok(Value::I64(
                target.and_then(Value::as_str).map_or(0, |s| s.chars().count() as i64),
            ))
        });
        let body = Expr::gt(
            Expr::param(&p).field("age").unwrap(),
            Expr::call(len, Some(Expr::constant("abc".to_string())), vec![]),
        );
        let term = compiler().compile_lambda(&Lambda::new(vec![p], body)).unwrap();
        assert_eq!(
            term.to_compact_string(),
            "FUNC(MAKE_ARRAY(1), GT(GET_FIELD(VAR(1), \"age\"), 3))"
        );
    }

    #[test]
    fn test_unmapped_call_on_parameter_leaks() {
        let p = person();
        let trim = Method::new(Type::String, "trim", Type::String)
            .with_invoke(|target, _| Ok(target.cloned().unwrap_or_default()));
        let body = Expr::call(trim, Some(Expr::param(&p).field("name").unwrap()), vec![]);
        let err = compiler()
            .compile_lambda(&Lambda::new(vec![p], body))
            .unwrap_err();
        assert!(matches!(err, Error::ServerVariableLeak(_)), "{}", err);
    }

    #[test]
    fn test_strict_mode_refuses_to_fold() {
        let engine = DatumEngine::new(EngineConfig::default().with_client_side_evaluation(false));
        let ctor = Constructor::new(Type::I32, "answer").with_invoke(|_, _| Ok(Value::I32(42)));
        let expr = Expr::new_object(ctor, vec![]);
        assert!(matches!(
            QueryCompiler::new(engine).compile(&expr, &Scope::new()),
            Err(Error::TranslationUnsupported(_))
        ));
    }

    #[test]
    fn test_record_construction_and_conditional() {
        let p = person();
        let summary = RecordType::anonymous(vec![("who", Type::String), ("adult", Type::Bool)]);
        let body = Expr::member_init(
            summary,
            vec![
                ("who", Expr::param(&p).field("name").unwrap()),
                (
                    "adult",
                    Expr::conditional(
                        Expr::ge(Expr::param(&p).field("age").unwrap(), Expr::constant(18i32)),
                        Expr::constant(true),
                        Expr::constant(false),
                    ),
                ),
            ],
        );
        let term = compiler().compile_lambda(&Lambda::new(vec![p], body)).unwrap();
        assert_eq!(
            term.to_compact_string(),
            "FUNC(MAKE_ARRAY(1), MAKE_OBJ(who=GET_FIELD(VAR(1), \"name\"), \
             adult=BRANCH(GE(GET_FIELD(VAR(1), \"age\"), 18), true, false)))"
        );
    }

    #[test]
    fn test_record_construction_inside_operator_is_folded() {
        let point = RecordType::anonymous(vec![("x", Type::I32)]);
        let expr = Expr::eq(
            Expr::member_init(point.clone(), vec![("x", Expr::constant(1i32))]),
            Expr::member_init(point, vec![("x", Expr::constant(1i32))]),
        );
        let term = compiler().compile(&expr, &Scope::new()).unwrap();
        assert_eq!(term.to_compact_string(), "EQ({\"x\": 1}, {\"x\": 1})");
    }

    #[test]
    fn test_convert_on_parameter_is_checked() {
        let n = Parameter::new("n", Type::I32);
        let widened = Lambda::new(vec![n.clone()], Expr::convert(Expr::param(&n), Type::I64));
        assert_eq!(
            compiler().compile_lambda(&widened).unwrap().to_compact_string(),
            "FUNC(MAKE_ARRAY(1), VAR(1))"
        );

        let narrowed = Lambda::new(vec![n.clone()], Expr::convert(Expr::param(&n), Type::U8));
        assert!(matches!(
            compiler().compile_lambda(&narrowed),
            Err(Error::TranslationUnsupported(_))
        ));
    }

    #[test]
    fn test_nested_lambda_slots_and_shadowing() {
        let row = Parameter::new("row", Type::list(Type::I32));
        let x = Parameter::new("x", Type::I32);
        let inner = Expr::lambda(vec![x.clone()], Expr::gt(Expr::param(&x), Expr::constant(0i32)));
        let filter = Method::new(Type::list(Type::I32), "filter", Type::list(Type::I32));
        let body = Expr::call(filter.clone(), Some(Expr::param(&row)), vec![inner]);

        let compiler = QueryCompiler::with_defaults(DatumEngine::default());
        let term = compiler
            .compile_lambda(&Lambda::new(vec![row.clone()], body))
            .unwrap();
        assert_eq!(
            term.to_compact_string(),
            "FUNC(MAKE_ARRAY(1), FILTER(VAR(1), FUNC(MAKE_ARRAY(2), GT(VAR(2), 0))))"
        );

        let shadow = Expr::lambda(
            vec![Parameter::new("row", Type::I32)],
            Expr::constant(true),
        );
        let body = Expr::call(filter, Some(Expr::param(&row)), vec![shadow]);
        assert!(matches!(
            compiler.compile_lambda(&Lambda::new(vec![row], body)),
            Err(Error::TranslationUnsupported(_))
        ));
    }

    #[test]
    fn test_template_argument_count_must_match() {
        let tags = Parameter::new("tags", Type::list(Type::String));
        let contains = Method::new(Type::list(Type::String), "contains", Type::Bool);
        let body = Expr::call(
            contains,
            Some(Expr::param(&tags)),
            vec![Expr::constant("a".to_string()), Expr::constant("b".to_string())],
        );
        let compiler = QueryCompiler::with_defaults(DatumEngine::default());
        assert!(matches!(
            compiler.compile_lambda(&Lambda::new(vec![tags], body)),
            Err(Error::TranslationUnsupported(_))
        ));

        let minutes = Constructor::new(Type::Duration, "minutes");
        let expr = Expr::new_object(minutes, vec![Expr::constant(5i32), Expr::constant(6i32)]);
        assert!(matches!(
            compiler.compile(&expr, &Scope::new()),
            Err(Error::TranslationUnsupported(_))
        ));
    }

    #[test]
    fn test_too_many_parameters() {
        let params = (0..3)
            .map(|i| Parameter::new(format!("p{}", i), Type::I32))
            .collect();
        let lambda = Lambda::new(params, Expr::constant(true));
        assert!(compiler().compile_lambda(&lambda).is_err());
    }
}
