use super::*;
use csl_tokenizer::lex;

fn parse_source(source: &str) -> (ParseOutput, Vec<Diagnostic>) {
    let lexed = lex(source, false);
    let parsed = parse(&lexed.tokens);
    (parsed, lexed.errors)
}

fn parse_clean(source: &str) -> ParseOutput {
    let (parsed, lex_errors) = parse_source(source);
    assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
    assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
    parsed
}

fn find_identifier_indices(source: &str, name: &str) -> Vec<usize> {
    let lexed = lex(source, false);
    lexed
        .tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.kind == TokenKind::Identifier && t.value == name)
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn test_minimal_valid_schema() {
    let parsed = parse_clean("config A { x: string; }");
    assert_eq!(parsed.ast.schema_count(), 1);

    let (_, schema) = parsed.ast.schemas().next().unwrap();
    assert_eq!(schema.name, "A");
    let root = parsed.ast.root_table(schema);
    assert_eq!(root.explicit_keys.len(), 1);
    assert!(root.wildcard_key.is_none());
    assert!(root.constraints.is_empty());

    let key = parsed.ast.key(root.explicit_keys[0]);
    assert_eq!(key.name, "x");
    assert!(!key.is_optional);
    let prim = parsed.ast.ty(key.ty).as_primitive().expect("primitive");
    assert_eq!(prim.primitive, Primitive::String);
    assert!(prim.allowed_values.is_empty());
    assert!(parsed.warnings.is_empty());
}

#[test]
fn test_enum_with_default_and_optionality() {
    let parsed = parse_clean("config A { env?: \"dev\" | \"prod\" = \"dev\"; }");
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let key = parsed.ast.key(root.explicit_keys[0]);

    assert_eq!(key.name, "env");
    assert!(key.is_optional);

    let CslType::Union { members, .. } = parsed.ast.ty(key.ty) else {
        panic!("expected union, got {:?}", parsed.ast.ty(key.ty));
    };
    assert_eq!(members.len(), 2);
    for (&member, literal) in members.iter().zip(["\"dev\"", "\"prod\""]) {
        let prim = parsed.ast.ty(member).as_primitive().expect("primitive");
        assert_eq!(prim.primitive, Primitive::String);
        assert_eq!(prim.allowed_values.len(), 1);
        assert_eq!(prim.allowed_values[0].0, literal);
        assert!(prim.allowed_values[0].1.is_string());
    }

    let (value, desc) = key.default_value.as_ref().expect("default");
    assert_eq!(value, "\"dev\"");
    assert_eq!(
        *desc,
        TypeDescriptor::String(csl_tokenizer::StringKind::Basic)
    );
}

#[test]
fn test_union_cannot_mix_primitive_with_its_literal() {
    let (parsed, lex_errors) = parse_source("config A { x: string | \"dev\"; }");
    assert!(lex_errors.is_empty());
    assert_eq!(parsed.ast.schema_count(), 1);
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message == "Union type cannot mix a primitive type with its literal"),
        "{:?}",
        parsed.errors
    );
}

#[test]
fn test_number_union_mixing() {
    let (parsed, _) = parse_source("config A { x: number | 3; }");
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message.contains("cannot mix a primitive type")),
        "{:?}",
        parsed.errors
    );

    // Literals alone are fine
    let parsed = parse_clean("config A { x: 1 | 2 | 3; }");
    assert_eq!(parsed.ast.schema_count(), 1);
}

#[test]
fn test_dotted_reference_in_constraint() {
    let source = "config A {\n  db: { ssl: boolean; };\n  insecure: boolean;\n  constraints { conflicts db.ssl with insecure; }\n}";
    let parsed = parse_clean(source);

    // The constraint's `db`, `ssl`, and `insecure` tokens map to their
    // definitions.
    let db_indices = find_identifier_indices(source, "db");
    let ssl_indices = find_identifier_indices(source, "ssl");
    let insecure_indices = find_identifier_indices(source, "insecure");

    // declaration + usage for each
    assert_eq!(db_indices.len(), 2);
    assert_eq!(ssl_indices.len(), 2);
    assert_eq!(insecure_indices.len(), 2);

    for indices in [&db_indices, &ssl_indices, &insecure_indices] {
        let defs: Vec<_> = indices
            .iter()
            .map(|i| parsed.definitions.get(i).copied())
            .collect();
        assert!(
            defs.iter().all(|d| d.is_some()),
            "unmapped identifier token: {:?}",
            defs
        );
        // declaration and usage resolve to the same definition
        assert_eq!(defs[0], defs[1]);
    }

    // ssl resolves to the key inside db's table, not a root key
    let ssl_def = parsed.definitions[&ssl_indices[1]];
    let DefRef::Key(key) = ssl_def else {
        panic!("expected key def");
    };
    assert_eq!(parsed.ast.key(key).name, "ssl");
}

#[test]
fn test_wildcard_with_explicit_override() {
    let source =
        "config T { target: { x86: { lib: string; }; *: { lib: string; bin: string; }; }; }";
    let parsed = parse_clean(source);
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let target = parsed.ast.key(root.explicit_keys[0]);
    let target_table = parsed.ast.ty(target.ty).as_table().expect("table");

    assert_eq!(target_table.explicit_keys.len(), 1);
    assert_eq!(parsed.ast.key(target_table.explicit_keys[0]).name, "x86");
    let wildcard = target_table.wildcard_key.expect("wildcard");
    assert!(parsed.ast.key(wildcard).is_wildcard);

    let x86_table = parsed
        .ast
        .ty(parsed.ast.key(target_table.explicit_keys[0]).ty)
        .as_table()
        .expect("x86 table");
    assert_eq!(x86_table.explicit_keys.len(), 1);
    assert_eq!(parsed.ast.key(x86_table.explicit_keys[0]).name, "lib");
}

#[test]
fn test_unterminated_string_recovery() {
    let source = "config A { x: string = \"abc\n; y: number; }";
    let (parsed, lex_errors) = parse_source(source);
    assert!(
        lex_errors
            .iter()
            .any(|e| e.message == "String literal or quoted identifier is not closed."),
        "{:?}",
        lex_errors
    );
    // Parsing continues and still produces a schema.
    assert_eq!(parsed.ast.schema_count(), 1);
}

#[test]
fn test_duplicate_constraints_block() {
    let (parsed, _) = parse_source(
        "config A { a: boolean; constraints { validate a; } constraints { validate a; } }",
    );
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message == "Duplicate constraints block"),
        "{:?}",
        parsed.errors
    );
}

#[test]
fn test_default_type_mismatch() {
    let (parsed, _) = parse_source("config A { x: number = \"nope\"; }");
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message == "Default value type does not match declared type"),
        "{:?}",
        parsed.errors
    );
}

#[test]
fn test_inferred_default_primitive() {
    let parsed = parse_clean("config A { a = 5; b = \"x\"; c = true; d = 5s; }");
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let primitives: Vec<Primitive> = root
        .explicit_keys
        .iter()
        .map(|&k| {
            parsed
                .ast
                .ty(parsed.ast.key(k).ty)
                .as_primitive()
                .expect("primitive")
                .primitive
        })
        .collect();
    assert_eq!(
        primitives,
        vec![
            Primitive::Number,
            Primitive::String,
            Primitive::Boolean,
            Primitive::Duration,
        ]
    );
}

#[test]
fn test_signed_default() {
    let parsed = parse_clean("config A { x: number = -5; y: number = +2.5; }");
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    assert_eq!(
        parsed.ast.key(root.explicit_keys[0]).default_value,
        Some(("-5".to_string(), TypeDescriptor::Integer))
    );
    assert_eq!(
        parsed.ast.key(root.explicit_keys[1]).default_value,
        Some(("+2.5".to_string(), TypeDescriptor::Float))
    );
}

#[test]
fn test_signed_non_decimal_default_is_error() {
    let (parsed, _) = parse_source("config A { x: number = -0x10; }");
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message.contains("cannot have a positive or negative sign")),
        "{:?}",
        parsed.errors
    );
}

#[test]
fn test_annotation_kind_mismatch() {
    let (parsed, _) = parse_source("config A { s: string @min(1); n: number @regex(\"a\"); }");
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message == "Numeric annotation '@min' is not allowed on string"),
        "{:?}",
        parsed.errors
    );
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message == "String annotation '@regex' is not allowed on number"),
        "{:?}",
        parsed.errors
    );
}

#[test]
fn test_global_annotation_attaches_to_key() {
    let parsed = parse_clean("config A { x: string @deprecated; }");
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let key = parsed.ast.key(root.explicit_keys[0]);
    assert_eq!(key.annotations.len(), 1);
    assert_eq!(key.annotations[0].name, "deprecated");
    // and the type has no annotations
    let prim = parsed.ast.ty(key.ty).as_primitive().unwrap();
    assert!(prim.annotations.is_empty());
}

#[test]
fn test_unknown_identifier_in_constraint() {
    let (parsed, _) = parse_source("config A { a: boolean; constraints { validate missing; } }");
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message == "Unknown identifier in current context: missing"),
        "{:?}",
        parsed.errors
    );
}

#[test]
fn test_dependency_missing_key() {
    let (parsed, _) = parse_source("config A { a: boolean; constraints { requires a => b; } }");
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message == "Dependency references missing key: b"),
        "{:?}",
        parsed.errors
    );
}

#[test]
fn test_subset_requires_table_arrays() {
    let good = "config A { xs: { id: number; }[]; ys: { id: number; }[]; constraints { validate subset(xs, ys, [id]); } }";
    let parsed = parse_clean(good);
    assert_eq!(parsed.ast.schema_count(), 1);

    let bad = "config A { xs: number; ys: { id: number; }[]; constraints { validate subset(xs, ys, [id]); } }";
    let (parsed, _) = parse_source(bad);
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message == "subset with property list requires table arrays"),
        "{:?}",
        parsed.errors
    );
}

#[test]
fn test_missing_semicolon_tolerated_before_new_key() {
    let parsed = parse_clean("config A { a: string\n  b: number; }");
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    assert_eq!(root.explicit_keys.len(), 2);
}

#[test]
fn test_number_key_name_is_error() {
    let (parsed, _) = parse_source("config A { 5: string; }");
    assert!(
        parsed
            .errors
            .iter()
            .any(|e| e.message == "Key name must be an identifier"),
        "{:?}",
        parsed.errors
    );
}

#[test]
fn test_parse_never_aborts_on_garbage() {
    let (parsed, _) = parse_source("config A { :::: ~~~ }} config B { x: string; }");
    // B still parses
    assert!(parsed.ast.schemas().any(|(_, s)| s.name == "B"));
}

#[test]
fn test_operator_precedence_shape() {
    let parsed = parse_clean("config A { a: number; b: number; c: number; constraints { validate a = b + c * a; } }");
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let Constraint::Validate { expr, .. } = &root.constraints[0] else {
        panic!("expected validate");
    };
    // `=` at the top, `+` below it, `*` innermost
    let Expr::Binary { op, rhs, .. } = parsed.ast.expr(*expr) else {
        panic!("expected binary");
    };
    assert_eq!(op, "=");
    let Expr::Binary { op, rhs, .. } = parsed.ast.expr(*rhs) else {
        panic!("expected binary rhs");
    };
    assert_eq!(op, "+");
    let Expr::Binary { op, .. } = parsed.ast.expr(*rhs) else {
        panic!("expected binary rhs rhs");
    };
    assert_eq!(op, "*");
}

#[test]
fn test_right_associative_assignment() {
    let parsed =
        parse_clean("config A { a: number; b: number; constraints { validate a = b = a; } }");
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let Constraint::Validate { expr, .. } = &root.constraints[0] else {
        panic!();
    };
    let Expr::Binary { op, lhs, rhs, .. } = parsed.ast.expr(*expr) else {
        panic!();
    };
    assert_eq!(op, "=");
    // right associative: lhs is the bare identifier, rhs the nested `=`
    assert!(matches!(parsed.ast.expr(*lhs), Expr::Identifier { .. }));
    assert!(matches!(parsed.ast.expr(*rhs), Expr::Binary { op, .. } if op == "="));
}

#[test]
fn test_ternary_expression() {
    let parsed = parse_clean(
        "config A { a: boolean; b: number; constraints { validate a ? b : b; } }",
    );
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let Constraint::Validate { expr, .. } = &root.constraints[0] else {
        panic!();
    };
    assert!(matches!(parsed.ast.expr(*expr), Expr::Ternary { .. }));
}

#[test]
fn test_unary_binds_tighter_than_multiplication() {
    let parsed =
        parse_clean("config A { a: number; constraints { validate -a * a < 0; } }");
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let Constraint::Validate { expr, .. } = &root.constraints[0] else {
        panic!();
    };
    // shape: (((-a) * a) < 0)
    let Expr::Binary { op, lhs, .. } = parsed.ast.expr(*expr) else {
        panic!();
    };
    assert_eq!(op, "<");
    let Expr::Binary { op, lhs, .. } = parsed.ast.expr(*lhs) else {
        panic!();
    };
    assert_eq!(op, "*");
    assert!(matches!(parsed.ast.expr(*lhs), Expr::Unary { .. }));
}

#[test]
fn test_function_call_with_list_argument() {
    let parsed = parse_clean(
        "config A { xs: { id: number; }[]; ys: { id: number; }[]; constraints { validate subset(xs, ys, [id]); } }",
    );
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let Constraint::Validate { expr, .. } = &root.constraints[0] else {
        panic!();
    };
    let Expr::FunctionCall { name, args, .. } = parsed.ast.expr(*expr) else {
        panic!("expected call, got {:?}", parsed.ast.expr(*expr));
    };
    assert_eq!(name, "subset");
    assert_eq!(args.len(), 3);
    assert!(matches!(
        parsed.ast.expr(args[2]),
        Expr::FunctionArg {
            value: FunctionArgValue::List(elems),
            ..
        } if elems.len() == 1
    ));
}

#[test]
fn test_multiple_schemas() {
    let parsed = parse_clean("config A { x: string; }\n\nconfig B { y: number; }");
    assert_eq!(parsed.ast.schema_count(), 2);
    let names: Vec<_> = parsed.ast.schemas().map(|(_, s)| s.name.clone()).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn test_schema_name_token_mapped() {
    let source = "config A { x: string; }";
    let parsed = parse_clean(source);
    let a_indices = find_identifier_indices(source, "A");
    assert_eq!(a_indices.len(), 1);
    assert!(matches!(
        parsed.definitions.get(&a_indices[0]),
        Some(DefRef::Schema(_))
    ));
}

#[test]
fn test_postfix_binds_tighter_than_union() {
    let parsed = parse_clean("config A { x: string | number[]; }");
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let key = parsed.ast.key(root.explicit_keys[0]);
    let CslType::Union { members, .. } = parsed.ast.ty(key.ty) else {
        panic!("expected union");
    };
    assert_eq!(members.len(), 2);
    assert!(matches!(parsed.ast.ty(members[0]), CslType::Primitive(_)));
    assert!(matches!(parsed.ast.ty(members[1]), CslType::Array { .. }));
}

#[test]
fn test_parenthesized_union_flattens() {
    let parsed = parse_clean("config A { x: boolean | (datetime | duration); }");
    let (_, schema) = parsed.ast.schemas().next().unwrap();
    let root = parsed.ast.root_table(schema);
    let key = parsed.ast.key(root.explicit_keys[0]);
    let CslType::Union { members, .. } = parsed.ast.ty(key.ty) else {
        panic!("expected union");
    };
    // no union directly inside a union
    assert_eq!(members.len(), 3);
    for &m in members {
        assert!(!matches!(parsed.ast.ty(m), CslType::Union { .. }));
    }
}
