//! Override and template registrations consulted by the compiler.
//!
//! Keys use [`TypeKey`], the unbound form of a type, so one registration on
//! `List` covers `Vec<i32>` and `Vec<String>` alike. Operator lookups fall
//! back to `TypeKey::Dynamic` as a wildcard operand.

use super::compiler::Lowering;
use super::expr::{BinaryOp, Expr, UnaryOp};
use super::template::TermTemplate;
use crate::error::Result;
use crate::native::TypeKey;
use crate::reql::Term;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub type BinaryOverride =
    Arc<dyn Fn(&mut Lowering<'_>, &Expr, &Expr) -> Result<Term> + Send + Sync>;
pub type UnaryOverride = Arc<dyn Fn(&mut Lowering<'_>, &Expr) -> Result<Term> + Send + Sync>;
/// Receives the member's target; `None` for static members.
pub type MemberOverride =
    Arc<dyn Fn(&mut Lowering<'_>, Option<&Expr>) -> Result<Term> + Send + Sync>;
pub type MethodOverride =
    Arc<dyn Fn(&mut Lowering<'_>, Option<&Expr>, &[Expr]) -> Result<Term> + Send + Sync>;
pub type ConstructorOverride =
    Arc<dyn Fn(&mut Lowering<'_>, &[Expr]) -> Result<Term> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryKey {
    pub left: TypeKey,
    pub right: TypeKey,
    pub op: BinaryOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnaryKey {
    pub operand: TypeKey,
    pub op: UnaryOp,
}

/// A member, method or constructor by declaring type and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub owner: TypeKey,
    pub name: String,
}

impl MemberKey {
    pub fn new<S: Into<String>>(owner: TypeKey, name: S) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }
}

/// Template key: a member or method, optionally narrowed by the type of its
/// first argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub member: MemberKey,
    pub arg: Option<TypeKey>,
}

#[derive(Default)]
pub struct ExpressionRegistry {
    binary: RwLock<HashMap<BinaryKey, BinaryOverride>>,
    unary: RwLock<HashMap<UnaryKey, UnaryOverride>>,
    members: RwLock<HashMap<MemberKey, MemberOverride>>,
    methods: RwLock<HashMap<MemberKey, MethodOverride>>,
    constructors: RwLock<HashMap<MemberKey, ConstructorOverride>>,
    templates: RwLock<HashMap<TemplateKey, TermTemplate>>,
}

impl ExpressionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_binary<F>(&self, left: TypeKey, right: TypeKey, op: BinaryOp, f: F)
    where
        F: Fn(&mut Lowering<'_>, &Expr, &Expr) -> Result<Term> + Send + Sync + 'static,
    {
        tracing::debug!(?left, ?right, ?op, "registering binary override");
        self.binary
            .write()
            .insert(BinaryKey { left, right, op }, Arc::new(f));
    }

    pub fn register_unary<F>(&self, operand: TypeKey, op: UnaryOp, f: F)
    where
        F: Fn(&mut Lowering<'_>, &Expr) -> Result<Term> + Send + Sync + 'static,
    {
        self.unary
            .write()
            .insert(UnaryKey { operand, op }, Arc::new(f));
    }

    pub fn register_member<F>(&self, owner: TypeKey, name: &str, f: F)
    where
        F: Fn(&mut Lowering<'_>, Option<&Expr>) -> Result<Term> + Send + Sync + 'static,
    {
        self.members
            .write()
            .insert(MemberKey::new(owner, name), Arc::new(f));
    }

    pub fn register_method<F>(&self, owner: TypeKey, name: &str, f: F)
    where
        F: Fn(&mut Lowering<'_>, Option<&Expr>, &[Expr]) -> Result<Term> + Send + Sync + 'static,
    {
        self.methods
            .write()
            .insert(MemberKey::new(owner, name), Arc::new(f));
    }

    pub fn register_constructor<F>(&self, ty: TypeKey, name: &str, f: F)
    where
        F: Fn(&mut Lowering<'_>, &[Expr]) -> Result<Term> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .insert(MemberKey::new(ty, name), Arc::new(f));
    }

    /// A constructor whose arguments are compiled and placed by `template`.
    pub fn register_constructor_template(&self, ty: TypeKey, name: &str, template: TermTemplate) {
        let call = format!("{:?}::{}", ty, name);
        self.register_constructor(ty, name, move |lowering, args| {
            template.check_arity(&call, args.len())?;
            let args = lowering.lower_all(args)?;
            template.instantiate(None, &args)
        });
    }

    /// Template for a member access or method call on `owner`.
    pub fn register_template(&self, owner: TypeKey, name: &str, template: TermTemplate) {
        self.register_template_for(owner, name, None, template);
    }

    /// Template that only applies when the first argument has type `arg`.
    pub fn register_template_for(
        &self,
        owner: TypeKey,
        name: &str,
        arg: Option<TypeKey>,
        template: TermTemplate,
    ) {
        let key = TemplateKey {
            member: MemberKey::new(owner, name),
            arg,
        };
        self.templates.write().insert(key, template);
    }

    pub fn binary(&self, left: &TypeKey, right: &TypeKey, op: BinaryOp) -> Option<BinaryOverride> {
        let map = self.binary.read();
        let candidates = [
            (left.clone(), right.clone()),
            (left.clone(), TypeKey::Dynamic),
            (TypeKey::Dynamic, right.clone()),
        ];
        candidates
            .into_iter()
            .find_map(|(left, right)| map.get(&BinaryKey { left, right, op }).cloned())
    }

    pub fn unary(&self, operand: &TypeKey, op: UnaryOp) -> Option<UnaryOverride> {
        let map = self.unary.read();
        map.get(&UnaryKey {
            operand: operand.clone(),
            op,
        })
        .or_else(|| {
            map.get(&UnaryKey {
                operand: TypeKey::Dynamic,
                op,
            })
        })
        .cloned()
    }

    pub fn member(&self, owner: &TypeKey, name: &str) -> Option<MemberOverride> {
        self.members
            .read()
            .get(&MemberKey::new(owner.clone(), name))
            .cloned()
    }

    pub fn method(&self, owner: &TypeKey, name: &str) -> Option<MethodOverride> {
        self.methods
            .read()
            .get(&MemberKey::new(owner.clone(), name))
            .cloned()
    }

    pub fn constructor(&self, ty: &TypeKey, name: &str) -> Option<ConstructorOverride> {
        self.constructors
            .read()
            .get(&MemberKey::new(ty.clone(), name))
            .cloned()
    }

    /// Most specific template: narrowed by `arg` first, then unnarrowed.
    pub fn template(&self, owner: &TypeKey, name: &str, arg: Option<&TypeKey>) -> Option<TermTemplate> {
        let map = self.templates.read();
        let member = MemberKey::new(owner.clone(), name);
        arg.and_then(|arg| {
            map.get(&TemplateKey {
                member: member.clone(),
                arg: Some(arg.clone()),
            })
        })
        .or_else(|| map.get(&TemplateKey { member, arg: None }))
        .cloned()
    }

    pub fn len(&self) -> usize {
        self.binary.read().len()
            + self.unary.read().len()
            + self.members.read().len()
            + self.methods.read().len()
            + self.constructors.read().len()
            + self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ExpressionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionRegistry")
            .field("binary", &self.binary.read().len())
            .field("unary", &self.unary.read().len())
            .field("members", &self.members.read().len())
            .field("methods", &self.methods.read().len())
            .field("constructors", &self.constructors.read().len())
            .field("templates", &self.templates.read().len())
            .finish()
    }
}
