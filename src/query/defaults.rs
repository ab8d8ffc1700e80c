//! Default mappings for std, chrono and collection idioms.

use super::compiler::Lowering;
use super::expr::{BinaryOp, Expr};
use super::registry::ExpressionRegistry;
use super::template::TermTemplate;
use crate::error::{Error, Result};
use crate::native::TypeKey;
use crate::reql::{Datum, Term, TermType};

use TermTemplate::{Arg, Target};

const TIME_ACCESSORS: [(&str, TermType); 10] = [
    ("year", TermType::Year),
    ("month", TermType::Month),
    ("day", TermType::Day),
    ("hour", TermType::Hours),
    ("minute", TermType::Minutes),
    ("second", TermType::Seconds),
    ("day_of_week", TermType::DayOfWeek),
    ("day_of_year", TermType::DayOfYear),
    ("date", TermType::Date),
    ("time_of_day", TermType::TimeOfDay),
];

/// Register every default mapping on `registry`.
pub fn register_defaults(registry: &ExpressionRegistry) {
    register_members(registry);
    register_list_templates(registry);
    register_string_templates(registry);
    register_map_templates(registry);
    register_constructors(registry);
    register_operators(registry);
    tracing::debug!(registrations = registry.len(), "default expression mappings registered");
}

/// `term_type(target)` for an instance member.
fn accessor(term_type: TermType) -> impl Fn(&mut Lowering<'_>, Option<&Expr>) -> Result<Term> {
    move |lowering, target| {
        let target = target.ok_or_else(|| {
            Error::TranslationUnsupported(format!("{} needs a receiver", term_type))
        })?;
        Ok(Term::new(term_type).with_arg(lowering.lower(target)?))
    }
}

fn register_members(registry: &ExpressionRegistry) {
    for owner in [TypeKey::DateTime, TypeKey::DateTimeOffset] {
        for (name, term_type) in TIME_ACCESSORS {
            registry.register_member(owner.clone(), name, accessor(term_type));
        }
        registry.register_template(owner, "now", TermTemplate::node(TermType::Now, []));
    }

    registry.register_member(TypeKey::Option, "value", |lowering, target| match target {
        Some(target) => lowering.lower(target),
        None => Err(Error::TranslationUnsupported(
            "Option::value needs a receiver".into(),
        )),
    });
    registry.register_template(
        TypeKey::Option,
        "is_some",
        TermTemplate::node(TermType::Ne, [Target, TermTemplate::Literal(Datum::Null)]),
    );
    registry.register_template(
        TypeKey::Option,
        "is_none",
        TermTemplate::node(TermType::Eq, [Target, TermTemplate::Literal(Datum::Null)]),
    );
}

fn register_list_templates(registry: &ExpressionRegistry) {
    let list = |name: &str, template: TermTemplate| {
        registry.register_template(TypeKey::List, name, template)
    };
    list("len", TermTemplate::unary(TermType::Count));
    list("is_empty", TermTemplate::unary(TermType::IsEmpty));
    list("contains", TermTemplate::with_arg(TermType::Contains));
    list("concat", TermTemplate::with_arg(TermType::Union));
    list("append", TermTemplate::with_arg(TermType::Append));
    list(
        "first",
        TermTemplate::node(TermType::Nth, [Target, TermTemplate::literal(0)]),
    );
    list(
        "slice",
        TermTemplate::node(TermType::Slice, [Target, Arg(0), Arg(1)]),
    );
    // Lambda arguments compile to nested FUNC terms.
    list("any", TermTemplate::with_arg(TermType::Contains));
    list("filter", TermTemplate::with_arg(TermType::Filter));
    list("map", TermTemplate::with_arg(TermType::Map));
}

fn register_string_templates(registry: &ExpressionRegistry) {
    let string = |name: &str, template: TermTemplate| {
        registry.register_template(TypeKey::String, name, template)
    };
    string("len", TermTemplate::unary(TermType::Count));
    string("to_uppercase", TermTemplate::unary(TermType::Upcase));
    string("to_lowercase", TermTemplate::unary(TermType::Downcase));
    string("split", TermTemplate::with_arg(TermType::Split));
    string(
        "matches",
        TermTemplate::node(
            TermType::Ne,
            [
                TermTemplate::with_arg(TermType::Match),
                TermTemplate::Literal(Datum::Null),
            ],
        ),
    );
    string(
        "is_empty",
        TermTemplate::node(TermType::Eq, [Target, TermTemplate::literal("")]),
    );
}

fn register_map_templates(registry: &ExpressionRegistry) {
    let map = |name: &str, template: TermTemplate| {
        registry.register_template(TypeKey::Map, name, template)
    };
    map("len", TermTemplate::unary(TermType::Count));
    map("keys", TermTemplate::unary(TermType::Keys));
    map("values", TermTemplate::unary(TermType::Values));
    map("contains_key", TermTemplate::with_arg(TermType::HasFields));
    map("get", TermTemplate::with_arg(TermType::GetField));
}

fn register_constructors(registry: &ExpressionRegistry) {
    let scaled = |factor: i32| {
        TermTemplate::node(TermType::Mul, [Arg(0), TermTemplate::literal(factor)])
    };
    let duration = |name: &str, template: TermTemplate| {
        registry.register_constructor_template(TypeKey::Duration, name, template)
    };
    duration("seconds", Arg(0));
    duration("minutes", scaled(60));
    duration("hours", scaled(3_600));
    duration("days", scaled(86_400));
    duration(
        "milliseconds",
        TermTemplate::node(TermType::Div, [Arg(0), TermTemplate::literal(1_000)]),
    );
    duration(
        "new",
        TermTemplate::node(
            TermType::Add,
            [
                TermTemplate::node(TermType::Mul, [Arg(0), TermTemplate::literal(3_600)]),
                TermTemplate::node(TermType::Mul, [Arg(1), TermTemplate::literal(60)]),
                Arg(2),
            ],
        ),
    );

    for owner in [TypeKey::DateTime, TypeKey::DateTimeOffset] {
        registry.register_constructor_template(
            owner.clone(),
            "from_ymd",
            TermTemplate::node(
                TermType::Time,
                [Arg(0), Arg(1), Arg(2), TermTemplate::literal("Z")],
            ),
        );
        registry.register_constructor_template(
            owner,
            "from_ymd_hms",
            TermTemplate::node(
                TermType::Time,
                [
                    Arg(0),
                    Arg(1),
                    Arg(2),
                    Arg(3),
                    Arg(4),
                    Arg(5),
                    TermTemplate::literal("Z"),
                ],
            ),
        );
    }
}

fn register_operators(registry: &ExpressionRegistry) {
    registry.register_binary(TypeKey::Map, TypeKey::String, BinaryOp::Index, |l, map, key| {
        Ok(Term::new(TermType::GetField)
            .with_arg(l.lower(map)?)
            .with_arg(l.lower(key)?))
    });
    registry.register_binary(TypeKey::List, TypeKey::Dynamic, BinaryOp::Index, |l, list, i| {
        Ok(Term::new(TermType::Nth)
            .with_arg(l.lower(list)?)
            .with_arg(l.lower(i)?))
    });
    registry.register_binary(
        TypeKey::Option,
        TypeKey::Dynamic,
        BinaryOp::Coalesce,
        |l, option, fallback| {
            Ok(Term::new(TermType::Default)
                .with_arg(l.lower(option)?)
                .with_arg(l.lower(fallback)?))
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::DatumEngine;
    use crate::native::Type;
    use crate::query::expr::{Constructor, Member, Method, Parameter};
    use crate::query::{Lambda, QueryCompiler, Scope};

    fn compile(param: &Parameter, body: Expr) -> String {
        QueryCompiler::with_defaults(DatumEngine::default())
            .compile_lambda(&Lambda::new(vec![param.clone()], body))
            .unwrap()
            .to_compact_string()
    }

    #[test]
    fn test_list_templates() {
        let tags = Parameter::new("tags", Type::list(Type::String));
        let contains = Method::new(Type::list(Type::String), "contains", Type::Bool);
        let body = Expr::call(contains, Some(Expr::param(&tags)), vec![Expr::constant("vip".to_string())]);
        assert_eq!(
            compile(&tags, body),
            "FUNC(MAKE_ARRAY(1), CONTAINS(VAR(1), \"vip\"))"
        );

        let len = Member::new(Type::list(Type::String), "len", Type::I64);
        assert_eq!(
            compile(&tags, Expr::member(Some(Expr::param(&tags)), len)),
            "FUNC(MAKE_ARRAY(1), COUNT(VAR(1)))"
        );
    }

    #[test]
    fn test_time_accessor_and_now() {
        let at = Parameter::new("at", Type::DateTime);
        let year = Member::new(Type::DateTime, "year", Type::I32);
        let now = Member::new(Type::DateTime, "now", Type::DateTime);
        let body = Expr::and(
            Expr::gt(Expr::member(Some(Expr::param(&at)), year), Expr::constant(2000i32)),
            Expr::lt(Expr::param(&at), Expr::member(None, now)),
        );
        assert_eq!(
            compile(&at, body),
            "FUNC(MAKE_ARRAY(1), AND(GT(YEAR(VAR(1)), 2000), LT(VAR(1), NOW())))"
        );
    }

    #[test]
    fn test_duration_constructor_desugars() {
        let minutes = Constructor::new(Type::Duration, "minutes");
        let expr = Expr::new_object(minutes, vec![Expr::constant(5i32)]);
        let term = QueryCompiler::with_defaults(DatumEngine::default())
            .compile(&expr, &Scope::new())
            .unwrap();
        assert_eq!(term.to_compact_string(), "MUL(5, 60)");
    }

    #[test]
    fn test_map_index_and_coalesce() {
        let attrs = Parameter::new("attrs", Type::map(Type::option(Type::I64)));
        let body = Expr::coalesce(
            Expr::index(Expr::param(&attrs), Expr::constant("score".to_string())),
            Expr::constant(0i64),
        );
        assert_eq!(
            compile(&attrs, body),
            "FUNC(MAKE_ARRAY(1), DEFAULT(GET_FIELD(VAR(1), \"score\"), 0))"
        );
    }

    #[test]
    fn test_option_members() {
        let nick = Parameter::new("nick", Type::option(Type::String));
        let is_some = Member::new(Type::option(Type::String), "is_some", Type::Bool);
        assert_eq!(
            compile(&nick, Expr::member(Some(Expr::param(&nick)), is_some)),
            "FUNC(MAKE_ARRAY(1), NE(VAR(1), null))"
        );
    }
}
