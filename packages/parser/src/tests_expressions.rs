//! Expression shapes seen in real directive bindings

use crate::*;

fn single(source: &str) -> Expression {
    let program = parse_program(source).unwrap_or_else(|e| panic!("{}", format_error(source, &e)));
    program
        .as_single_expression()
        .cloned()
        .unwrap_or_else(|| panic!("Expected a single expression in {:?}", source))
}

#[test]
fn test_component_data_object() {
    let expr = single(
        r#"{
            open: false,
            items: ['a', 'b'],
            'quoted-key': 1,
            [computed]: 2,
            ...defaults,
            toggle() { this.open = !this.open },
            get isEmpty() { return this.items.length === 0 },
        }"#,
    );
    let Expression::Object { properties, .. } = expr else {
        panic!("Expected object");
    };
    assert_eq!(properties.len(), 7);
    assert!(matches!(&properties[2], Property::KeyValue { key: PropertyKey::Named(k), .. } if k == "quoted-key"));
    assert!(matches!(&properties[3], Property::KeyValue { key: PropertyKey::Computed(_), .. }));
    assert!(matches!(&properties[4], Property::Spread(_)));
}

#[test]
fn test_getter_named_get_is_plain_key() {
    let expr = single("{ get: 1 }");
    let Expression::Object { properties, .. } = expr else {
        panic!("Expected object");
    };
    assert!(matches!(&properties[0], Property::KeyValue { key: PropertyKey::Named(k), .. } if k == "get"));
}

#[test]
fn test_event_handler_statements() {
    let program = parse_program("count++; $dispatch('changed', { count })").unwrap();
    assert_eq!(program.body.len(), 2);

    let program = parse_program("if (open) { open = false } else open = true").unwrap();
    assert!(matches!(program.body[0], Statement::If { alternate: Some(_), .. }));
}

#[test]
fn test_nullish_and_logical_assignment() {
    assert!(matches!(
        single("name ?? 'anon'"),
        Expression::Logical { operator: LogicalOp::Nullish, .. }
    ));
    assert!(matches!(
        single("cache ||= []"),
        Expression::Assignment { operator: AssignOp::Or, .. }
    ));
}

#[test]
fn test_assignment_is_right_associative() {
    let Expression::Assignment { value, .. } = single("a = b = 1") else {
        panic!("Expected assignment");
    };
    assert!(matches!(*value, Expression::Assignment { .. }));
}

#[test]
fn test_conditional_nests_in_alternate() {
    let Expression::Conditional { alternate, .. } = single("a ? 1 : b ? 2 : 3") else {
        panic!("Expected conditional");
    };
    assert!(matches!(*alternate, Expression::Conditional { .. }));
}

#[test]
fn test_keyword_member_names() {
    let Expression::Member { property, .. } = single("$refs.if") else {
        panic!("Expected member access");
    };
    assert_eq!(property, MemberProperty::Named("if".to_string()));
}

#[test]
fn test_callback_arguments() {
    let Expression::Call { arguments, .. } = single("items.filter(i => i.done).map((i, n) => n)") else {
        panic!("Expected call");
    };
    assert!(matches!(&arguments[0], Element::Item(Expression::Function(f)) if f.params.len() == 2));
}

#[test]
fn test_spread_arguments_and_arrays() {
    let Expression::Array { elements, .. } = single("[...a, b]") else {
        panic!("Expected array");
    };
    assert!(matches!(elements[0], Element::Spread(_)));
    assert!(matches!(elements[1], Element::Item(_)));
}

#[test]
fn test_string_escapes() {
    assert_eq!(
        single(r#""line\nbreak""#),
        Expression::Literal {
            value: Literal::String("line\nbreak".to_string()),
            span: Span::new(0, 13),
        }
    );
}

#[test]
fn test_unterminated_call_is_eof_error() {
    let err = parse_program("save(").unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedEof { .. }));
}

#[test]
fn test_trailing_tokens_rejected_by_parse_expression() {
    assert!(parse_expression("a b").is_err());
    assert!(parse_program("a b").is_ok());
}
