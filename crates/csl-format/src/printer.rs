//! Canonical CSL text from the parsed representation.
//!
//! Output shape: 2-space indentation, explicit keys sorted by name, the
//! wildcard key after them, the constraints block last. Operators print as
//! `a op b`; annotation argument lists as `(a, b)`.

use std::fmt::Write;

use csl_repr::{
    Annotation, Ast, ConfigSchema, Constraint, CslType, Expr, ExprId, FunctionArgValue,
    KeyDefinition, TypeId,
};

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

/// Whether `name` can appear unquoted.
pub fn is_bare_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote `name` with backticks when it is not a bare identifier,
/// escaping backticks and backslashes.
pub fn quote_identifier(name: &str) -> String {
    if name == "*" || is_bare_identifier(name) {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for c in name.chars() {
        if c == '`' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('`');
    out
}

/// Render an expression as CSL text.
pub fn expr_to_string(ast: &Ast, expr: ExprId) -> String {
    let mut out = String::new();
    print_expr(ast, expr, &mut out);
    out
}

/// Render an annotation list as ` @name(args)` repeated.
pub fn annotations_to_string(ast: &Ast, annotations: &[Annotation]) -> String {
    let mut out = String::new();
    print_annotations(ast, annotations, &mut out);
    out
}

fn print_annotation_args(ast: &Ast, args: &[ExprId], out: &mut String) {
    for (i, &arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        print_expr(ast, arg, out);
    }
}

fn print_annotations(ast: &Ast, annotations: &[Annotation], out: &mut String) {
    for annotation in annotations {
        let _ = write!(out, " @{}(", annotation.name);
        print_annotation_args(ast, &annotation.args, out);
        out.push(')');
    }
}

fn print_expr(ast: &Ast, expr: ExprId, out: &mut String) {
    match ast.expr(expr) {
        Expr::Binary { op, lhs, rhs, .. } => {
            print_expr(ast, *lhs, out);
            let _ = write!(out, " {} ", op);
            print_expr(ast, *rhs, out);
        }
        Expr::Unary { op, operand, .. } => {
            out.push_str(op);
            print_expr(ast, *operand, out);
        }
        Expr::Ternary {
            condition,
            then_expr,
            else_expr,
            ..
        } => {
            print_expr(ast, *condition, out);
            out.push_str(" ? ");
            print_expr(ast, *then_expr, out);
            out.push_str(" : ");
            print_expr(ast, *else_expr, out);
        }
        Expr::Literal { value, .. } => out.push_str(value),
        Expr::Identifier { name, .. } => out.push_str(name),
        Expr::FunctionArg { value, .. } => match value {
            FunctionArgValue::Single(e) => print_expr(ast, *e, out),
            FunctionArgValue::List(elems) => {
                out.push('[');
                for (i, &e) in elems.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    print_expr(ast, e, out);
                }
                out.push(']');
            }
        },
        Expr::FunctionCall { name, args, .. } => {
            let _ = write!(out, "{}(", name);
            for (i, &arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_expr(ast, arg, out);
            }
            out.push(')');
        }
        Expr::Annotation {
            target, annotation, ..
        } => {
            print_expr(ast, *target, out);
            let _ = write!(out, " @{}(", annotation.name);
            print_annotation_args(ast, &annotation.args, out);
            out.push(')');
        }
    }
}

fn print_key_line(ast: &Ast, key: &KeyDefinition, level: usize, out: &mut String) {
    out.push_str(&indent(level));
    out.push_str(&quote_identifier(if key.is_wildcard { "*" } else { &key.name }));
    if key.is_optional {
        out.push('?');
    }
    out.push_str(": ");
    print_type(ast, key.ty, level, out);
    if let Some((literal, _)) = &key.default_value {
        let _ = write!(out, " = {}", literal);
    }
    print_annotations(ast, &key.annotations, out);
    out.push_str(";\n");
}

fn print_table_body(ast: &Ast, table: &csl_repr::TableType, level: usize, out: &mut String) {
    let mut keys: Vec<&KeyDefinition> = table
        .explicit_keys
        .iter()
        .map(|&k| ast.key(k))
        .collect();
    keys.sort_by(|a, b| a.name.cmp(&b.name));

    for key in keys {
        print_key_line(ast, key, level, out);
    }
    if let Some(wildcard) = table.wildcard_key {
        print_key_line(ast, ast.key(wildcard), level, out);
    }

    if !table.constraints.is_empty() {
        out.push_str(&indent(level));
        out.push_str("constraints {\n");
        for constraint in &table.constraints {
            out.push_str(&indent(level + 1));
            match constraint {
                Constraint::Conflict { first, second, .. } => {
                    out.push_str("conflicts ");
                    print_expr(ast, *first, out);
                    out.push_str(" with ");
                    print_expr(ast, *second, out);
                }
                Constraint::Dependency {
                    dependent,
                    condition,
                    ..
                } => {
                    out.push_str("requires ");
                    print_expr(ast, *dependent, out);
                    out.push_str(" => ");
                    print_expr(ast, *condition, out);
                }
                Constraint::Validate { expr, .. } => {
                    out.push_str("validate ");
                    print_expr(ast, *expr, out);
                }
            }
            out.push_str(";\n");
        }
        out.push_str(&indent(level));
        out.push_str("};\n");
    }
}

fn print_type(ast: &Ast, ty: TypeId, level: usize, out: &mut String) {
    match ast.ty(ty) {
        CslType::Primitive(p) => {
            if p.allowed_values.is_empty() {
                out.push_str(p.primitive.keyword());
            } else {
                for (i, (literal, _)) in p.allowed_values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" | ");
                    }
                    out.push_str(literal);
                }
            }
            print_annotations(ast, &p.annotations, out);
        }
        CslType::Table(table) => {
            out.push_str("{\n");
            print_table_body(ast, table, level + 1, out);
            out.push_str(&indent(level));
            out.push('}');
        }
        CslType::Array { element, .. } => {
            if let CslType::Table(table) = ast.ty(*element) {
                out.push_str("{\n");
                print_table_body(ast, table, level + 1, out);
                out.push_str(&indent(level));
                out.push_str("}[]");
            } else {
                print_type(ast, *element, level, out);
                out.push_str("[]");
            }
        }
        CslType::Union { members, .. } => {
            for (i, &member) in members.iter().enumerate() {
                if i > 0 {
                    out.push_str(" | ");
                }
                print_type(ast, member, level, out);
            }
        }
        CslType::AnyTable { .. } => out.push_str("any{}"),
        CslType::AnyArray { .. } => out.push_str("any[]"),
        CslType::Invalid { .. } => {}
    }
}

/// Print one schema as canonical CSL.
pub fn schema_to_csl(ast: &Ast, schema: &ConfigSchema) -> String {
    let mut out = String::new();
    let _ = write!(out, "config {} {{\n", quote_identifier(&schema.name));
    print_table_body(ast, ast.root_table(schema), 1, &mut out);
    out.push('}');
    out
}

/// Print every schema in the arena, separated by blank lines.
pub fn schemas_to_csl(ast: &Ast) -> String {
    let mut out = String::new();
    for (_, schema) in ast.schemas() {
        out.push_str(&schema_to_csl(ast, schema));
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use csl_parse::parse;
    use csl_tokenizer::lex;

    fn roundtrip(source: &str) -> String {
        let lexed = lex(source, false);
        assert!(lexed.errors.is_empty(), "lex errors: {:?}", lexed.errors);
        let parsed = parse(&lexed.tokens);
        assert!(
            parsed.errors.is_empty(),
            "parse errors: {:?}",
            parsed.errors
        );
        schemas_to_csl(&parsed.ast)
    }

    #[test]
    fn test_minimal_schema() {
        let out = roundtrip("config A { x: string; }");
        assert_eq!(out, "config A {\n  x: string;\n}\n\n");
    }

    #[test]
    fn test_keys_sorted_wildcard_last() {
        let out = roundtrip("config A { b: number; *: string; a: boolean; }");
        assert_eq!(
            out,
            "config A {\n  a: boolean;\n  b: number;\n  *: string;\n}\n\n"
        );
    }

    #[test]
    fn test_optional_enum_default() {
        let out = roundtrip("config A { env?: \"dev\" | \"prod\" = \"dev\"; }");
        assert_eq!(
            out,
            "config A {\n  env?: \"dev\" | \"prod\" = \"dev\";\n}\n\n"
        );
    }

    #[test]
    fn test_constraints_block() {
        let src = "config A { a: boolean; b: boolean; constraints { conflicts a with b; requires a => b; validate a == b; } }";
        let out = roundtrip(src);
        assert!(out.contains("  constraints {\n"));
        assert!(out.contains("    conflicts a with b;\n"));
        assert!(out.contains("    requires a => b;\n"));
        assert!(out.contains("    validate a == b;\n"));
        assert!(out.contains("  };\n"));
    }

    #[test]
    fn test_quoted_identifier_requoted() {
        let out = roundtrip("config A { `my key`: string; }");
        assert!(out.contains("`my key`: string;"));
    }

    #[test]
    fn test_nested_table_and_array() {
        let out = roundtrip("config A { svc: { port: number; }[]; raw: any{}; }");
        assert!(out.contains("svc: {\n    port: number;\n  }[];"));
        assert!(out.contains("raw: any{};"));
    }

    #[test]
    fn test_annotations_printed() {
        let out = roundtrip("config A { n: number @min(0) @max(10); s: string @regex(\"a+\"); }");
        assert!(out.contains("n: number @min(0) @max(10);"));
        assert!(out.contains("s: string @regex(\"a+\");"));
    }

    #[test]
    fn test_print_parse_idempotent() {
        let src = r#"config Svc {
  name: string;
  port?: number @min(1) @max(65535) = 8080;
  tags: string[];
  target: { lib: string; bin?: string; };
  mode: "fast" | "safe";
  constraints {
    conflicts port with tags;
    requires name => port;
    validate count_keys(target) > 0 ? true : false;
  }
}"#;
        let first = roundtrip(src);
        let second = roundtrip(&first);
        assert_eq!(first, second);
    }
}
