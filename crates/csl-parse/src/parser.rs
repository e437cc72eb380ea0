//! The parser proper.

use csl_repr::{
    Annotation, Ast, ConfigSchema, Constraint, CslType, DefRef, DefinitionMap, Expr, ExprId,
    FunctionArgValue, KeyDefinition, KeyId, Primitive, PrimitiveType, TableType, TypeId,
};
use csl_tokenizer::{Diagnostic, Position, Region, Token, TokenKind, TokenList, TypeDescriptor};
use tracing::debug;

/// Everything a parse produces.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub ast: Ast,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub definitions: DefinitionMap,
}

/// Parse a token stream into schemas.
pub fn parse(tokens: &TokenList) -> ParseOutput {
    let mut parser = Parser {
        tokens: tokens.tokens(),
        pos: 0,
        ast: Ast::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
        definitions: DefinitionMap::new(),
    };
    parser.parse_schemas();
    debug!(
        schemas = parser.ast.schema_count(),
        errors = parser.errors.len(),
        "parse finished"
    );
    ParseOutput {
        ast: parser.ast,
        errors: parser.errors,
        warnings: parser.warnings,
        definitions: parser.definitions,
    }
}

const BINARY_OPERATORS: &[&str] = &[
    ".", "@", "[", "(", "*", "/", "%", "+", "-", "<<", ">>", "<", "<=", ">", ">=", "==", "!=", "&",
    "^", "|", "&&", "||", "=",
];

const UNARY_OPERATORS: &[&str] = &["~", "!", "+", "-"];

const NUMERIC_ANNOTATIONS: &[&str] = &["min", "max", "range", "int", "float"];
const STRING_ANNOTATIONS: &[&str] = &[
    "regex",
    "start_with",
    "end_with",
    "contain",
    "min_length",
    "max_length",
    "length",
    "format",
];

fn binary_precedence(op: &str) -> usize {
    match op {
        "." | "@" => 1,
        "[" | "(" => 2,
        "*" | "/" | "%" => 5,
        "+" | "-" => 6,
        "<<" | ">>" => 7,
        "<" | "<=" | ">" | ">=" => 8,
        "==" | "!=" => 9,
        "&" => 10,
        "^" => 11,
        "|" => 12,
        "&&" => 13,
        "||" => 14,
        "=" => 15,
        _ => 17,
    }
}

/// 0 = left associative, 1 = right associative.
fn binary_associativity(op: &str) -> usize {
    usize::from(op == "=")
}

fn is_global_annotation(name: &str) -> bool {
    name == "deprecated"
}

fn is_literal_kind(kind: TokenKind) -> bool {
    kind.is_literal()
}

/// How a constraint's expression tree is checked for unknown identifiers.
#[derive(Clone, Copy, PartialEq)]
enum WalkMode {
    Conflict,
    Dependency,
    Validate,
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    ast: Ast,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    definitions: DefinitionMap,
}

impl<'t> Parser<'t> {
    // ---- cursor helpers -------------------------------------------------

    fn cur(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn next(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos + 1)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn cur_value(&self) -> &str {
        self.cur().map(|t| t.value.as_str()).unwrap_or("")
    }

    fn cur_is(&self, value: &str) -> bool {
        self.cur().is_some_and(|t| t.value == value)
    }

    fn cur_kind_is(&self, kind: TokenKind) -> bool {
        self.cur().is_some_and(|t| t.kind == kind)
    }

    /// End position of the most recently consumed token.
    fn prev_end(&self) -> Position {
        if self.pos == 0 {
            Position::default()
        } else {
            self.tokens[self.pos - 1].range.end
        }
    }

    /// Start position of the current token, or the last consumed end.
    fn cur_start(&self) -> Position {
        self.cur().map(|t| t.range.start).unwrap_or(self.prev_end())
    }

    fn advance(&mut self) {
        if self.at_end() {
            self.errors.push(Diagnostic::error(
                "Unexpected end of input.",
                Region::default(),
            ));
        } else {
            self.pos += 1;
        }
    }

    fn expect(&mut self, value: &str, msg: &str) {
        match self.cur() {
            None => self.errors.push(Diagnostic::error(
                format!("{}. Found end of input.", msg),
                Region::default(),
            )),
            Some(t) if t.value != value => self.errors.push(Diagnostic::error(
                format!("{}. Found: {}", msg, t.value),
                t.range,
            )),
            _ => {}
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, msg: &str) {
        match self.cur() {
            None => self.errors.push(Diagnostic::error(
                format!("{}. Found end of input.", msg),
                Region::default(),
            )),
            Some(t) if t.kind != kind => self.errors.push(Diagnostic::error(
                format!("{}. Found: {}", msg, t.value),
                t.range,
            )),
            _ => {}
        }
    }

    /// Placeholder node for a missing expression.
    fn missing_expr(&mut self) -> ExprId {
        self.ast.add_expr(Expr::Literal {
            value: String::new(),
            descriptor: TypeDescriptor::Invalid,
            region: Region::new(self.prev_end(), self.prev_end()),
        })
    }

    // ---- entry ----------------------------------------------------------

    fn parse_schemas(&mut self) {
        while !self.at_end() {
            if self.cur_is("config") {
                self.parse_config_schema();
            } else {
                self.advance();
            }
        }
    }

    fn parse_config_schema(&mut self) {
        let def_start = self.cur_start();
        self.advance(); // consume 'config'
        self.expect_kind(TokenKind::Identifier, "Expected schema name after 'config'");

        let name_index = self.pos;
        let named_by_identifier = self.cur_kind_is(TokenKind::Identifier);
        let name = self.cur().map(|t| t.value.clone()).unwrap_or_default();
        let name_region = self.cur().map(|t| t.range).unwrap_or_default();
        self.advance();

        let root = self.parse_table_type();
        let region = Region::new(def_start, self.prev_end());
        let id = self.ast.add_schema(ConfigSchema {
            name,
            root,
            region,
            name_region,
        });
        if named_by_identifier {
            self.definitions.insert(name_index, DefRef::Schema(id));
        }
    }

    // ---- tables and keys ------------------------------------------------

    fn parse_table_type(&mut self) -> TypeId {
        self.expect("{", "Expected '{' after schema name");
        let table_start = self.cur_start();
        self.advance();

        let mut explicit_keys: Vec<KeyId> = Vec::new();
        let mut wildcard_key: Option<KeyId> = None;
        let mut constraints: Vec<Constraint> = Vec::new();
        let mut constraints_block_seen = false;

        while !self.at_end() && !self.cur_is("}") {
            if self.cur_is("constraints") {
                if constraints_block_seen {
                    self.errors.push(Diagnostic::error(
                        "Duplicate constraints block",
                        self.cur().unwrap().range,
                    ));
                }
                constraints_block_seen = true;
                constraints.extend(self.parse_constraints());
            } else if self.cur_is("*") {
                wildcard_key = Some(self.parse_wildcard_key());
            } else if self.cur_kind_is(TokenKind::Identifier) {
                let key = self.parse_key_definition();
                explicit_keys.push(key);
            } else if self.cur_kind_is(TokenKind::Number) {
                self.errors.push(Diagnostic::error(
                    "Key name must be an identifier",
                    self.cur().unwrap().range,
                ));
                self.advance();
            } else {
                self.advance();
            }
        }

        self.expect("}", "Expected '}' after schema definition");
        let table_end = self.cur().map(|t| t.range.end).unwrap_or(self.prev_end());

        self.map_identifiers_in_constraints(&constraints, &explicit_keys);
        self.validate_constraints_semantics(&constraints, &explicit_keys);
        for &key in &explicit_keys {
            let annotations = self.ast.key(key).annotations.clone();
            let key_type = self.ast.key(key).ty;
            self.map_identifiers_in_annotations(&annotations, &explicit_keys);
            self.map_identifiers_in_type(key_type, &explicit_keys);
            self.validate_annotations_for_type(key_type);
            self.validate_default_for_key(key);
        }

        self.advance(); // consume '}'

        self.ast.add_type(CslType::Table(TableType {
            explicit_keys,
            wildcard_key,
            constraints,
            region: Region::new(table_start, table_end),
        }))
    }

    fn parse_key_definition(&mut self) -> KeyId {
        if !self.cur_kind_is(TokenKind::Identifier) {
            self.errors.push(Diagnostic::error(
                "Key name must be an identifier",
                self.cur().map(|t| t.range).unwrap_or_default(),
            ));
        }
        let name = self.cur().map(|t| t.value.clone()).unwrap_or_default();
        let name_index = self.pos;
        let named_by_identifier = self.cur_kind_is(TokenKind::Identifier);
        let name_region = self.cur().map(|t| t.range).unwrap_or_default();
        let mut is_optional = false;
        self.advance();

        if self.cur_is("?") {
            is_optional = true;
            self.advance();
        }

        let mut ty: Option<TypeId> = None;
        let mut default_value: Option<(String, TypeDescriptor)> = None;
        let mut annotations: Vec<Annotation> = Vec::new();

        if self.cur_is(":") {
            self.advance();
            ty = Some(self.parse_type());
            annotations = self.parse_annotations(true);
            if self.cur_is("=") {
                self.advance();
                if let Some((value, prop, _)) = self.take_default_literal() {
                    default_value = Some((value, prop));
                } else {
                    self.errors.push(Diagnostic::error(
                        "Expected literal default value after '='",
                        self.cur().map(|t| t.range).unwrap_or_default(),
                    ));
                }
            }
        } else if self.cur_is("=") {
            self.advance();
            if let Some((value, prop, literal_region)) = self.take_default_literal() {
                let primitive = Primitive::infer_from_descriptor(&prop);
                default_value = Some((value, prop));
                ty = Some(self.ast.add_type(CslType::Primitive(PrimitiveType {
                    primitive,
                    allowed_values: Vec::new(),
                    annotations: Vec::new(),
                    region: literal_region,
                })));
                annotations = self.parse_annotations(true);
            } else {
                self.errors.push(Diagnostic::error(
                    "Expected literal default value after '='",
                    self.cur().map(|t| t.range).unwrap_or_default(),
                ));
            }
        } else if self.cur_kind_is(TokenKind::Identifier) {
            // Missing ':' or '=': assume the next token starts a new key.
        } else {
            self.expect(":", "Expected ':' after key name");
            self.expect("=", "Expected '=' after key name");
            if !self.at_end() {
                self.advance();
            }
        }

        if self.cur_is(";") {
            self.advance();
        } else if self.at_end()
            || self.cur_kind_is(TokenKind::Identifier)
            || self.cur_is(":")
            || self.cur_is("*")
            || self.cur_is("constraints")
            || self.cur_is("}")
        {
            // Tolerate a missing ';' when the next token clearly starts a
            // new declaration or closes the block.
        } else {
            self.expect(";", "Expected ';' after key definition");
            if !self.at_end() {
                self.advance();
            }
        }

        let ty = ty.unwrap_or_else(|| {
            self.ast.add_type(CslType::Invalid {
                region: name_region,
            })
        });
        let id = self.ast.add_key(KeyDefinition {
            name,
            is_wildcard: false,
            is_optional,
            ty,
            annotations,
            default_value,
            name_region,
            definition_region: Region::new(name_region.start, self.prev_end()),
        });
        if named_by_identifier {
            self.definitions.insert(name_index, DefRef::Key(id));
        }
        id
    }

    /// Consume a literal default (optionally sign-prefixed for numbers).
    /// Returns the literal text, descriptor, and region.
    fn take_default_literal(&mut self) -> Option<(String, TypeDescriptor, Region)> {
        if let Some(t) = self.cur() {
            if is_literal_kind(t.kind) {
                let result = (
                    t.value.clone(),
                    t.prop.unwrap_or(TypeDescriptor::Invalid),
                    t.range,
                );
                self.advance();
                return Some(result);
            }
            if t.value == "+" || t.value == "-" {
                if let Some(num) = self.next() {
                    if num.kind == TokenKind::Number {
                        let value = format!("{}{}", t.value, num.value);
                        let prop = num.prop.unwrap_or(TypeDescriptor::Invalid);
                        let region = Region::new(t.range.start, num.range.end);
                        if num.value.starts_with("0x")
                            || num.value.starts_with("0o")
                            || num.value.starts_with("0b")
                        {
                            self.errors.push(Diagnostic::error(
                                "Number literal in hexadecimal, octal or binary cannot have a positive or negative sign.",
                                region,
                            ));
                        }
                        self.advance();
                        self.advance();
                        return Some((value, prop, region));
                    }
                }
            }
        }
        None
    }

    fn parse_wildcard_key(&mut self) -> KeyId {
        let def_region = self.cur().map(|t| t.range).unwrap_or_default();
        self.advance(); // consume '*'
        self.expect(":", "Expected ':' after wildcard");
        self.advance();

        let ty = self.parse_type();
        let annotations = self.parse_annotations(true);

        self.expect(";", "Expected ';' after wildcard key");
        self.advance();

        self.ast.add_key(KeyDefinition {
            name: "*".to_string(),
            is_wildcard: true,
            is_optional: false,
            ty,
            annotations,
            default_value: None,
            name_region: def_region,
            definition_region: Region::new(def_region.start, self.prev_end()),
        })
    }

    // ---- types ----------------------------------------------------------

    fn parse_type(&mut self) -> TypeId {
        let type_start = self.cur_start();
        let first = self.parse_postfix_type();

        if !self.cur_is("|") {
            return first;
        }

        let mut members = vec![first];
        while self.cur_is("|") {
            self.advance();
            members.push(self.parse_postfix_type());
        }

        // Flatten nested unions (from parenthesized members).
        let mut flat: Vec<TypeId> = Vec::new();
        for member in members {
            match self.ast.ty(member) {
                CslType::Union {
                    members: inner_members,
                    ..
                } => flat.extend(inner_members.iter().copied()),
                _ => flat.push(member),
            }
        }

        let region = Region::new(type_start, self.prev_end());
        self.check_union_mixing(&flat, region);
        self.ast.add_type(CslType::Union {
            members: flat,
            region,
        })
    }

    /// A union may not contain both an open primitive and a literal of the
    /// same primitive (checked for strings and numbers).
    fn check_union_mixing(&mut self, members: &[TypeId], region: Region) {
        let mut has_string_type = false;
        let mut has_string_literal = false;
        let mut has_number_type = false;
        let mut has_number_literal = false;
        for &member in members {
            if let CslType::Primitive(p) = self.ast.ty(member) {
                if let Some((_, desc)) = p.allowed_values.first() {
                    if desc.is_string() {
                        has_string_literal = true;
                    } else {
                        has_number_literal = true;
                    }
                } else {
                    match p.primitive {
                        Primitive::String => has_string_type = true,
                        Primitive::Number => has_number_type = true,
                        _ => {}
                    }
                }
            }
        }
        if (has_string_type && has_string_literal) || (has_number_type && has_number_literal) {
            self.errors.push(Diagnostic::error(
                "Union type cannot mix a primitive type with its literal",
                region,
            ));
        }
    }

    fn parse_postfix_type(&mut self) -> TypeId {
        let mut ty = self.parse_primary_type();
        while self.cur_is("[") {
            let type_start = self.cur_start();
            self.advance();
            self.expect("]", "Expected ']' after array type");
            let type_end = self.cur().map(|t| t.range.end).unwrap_or(self.prev_end());
            self.advance();
            ty = self.ast.add_type(CslType::Array {
                element: ty,
                region: Region::new(type_start, type_end),
            });
        }
        ty
    }

    fn parse_primary_type(&mut self) -> TypeId {
        let Some(t) = self.cur() else {
            self.errors.push(Diagnostic::error(
                "Unexpected end of input.",
                Region::default(),
            ));
            return self.ast.add_type(CslType::Invalid {
                region: Region::new(self.prev_end(), self.prev_end()),
            });
        };

        if is_literal_kind(t.kind) {
            return self.parse_literal_type();
        }

        let region = t.range;
        match t.value.as_str() {
            "string" | "number" | "boolean" | "datetime" | "duration" => {
                let primitive = match t.value.as_str() {
                    "string" => Primitive::String,
                    "number" => Primitive::Number,
                    "boolean" => Primitive::Boolean,
                    "datetime" => Primitive::Datetime,
                    _ => Primitive::Duration,
                };
                self.advance();
                let annotations = self.parse_annotations(false);
                self.ast.add_type(CslType::Primitive(PrimitiveType {
                    primitive,
                    allowed_values: Vec::new(),
                    annotations,
                    region,
                }))
            }
            "any{}" => {
                self.advance();
                self.ast.add_type(CslType::AnyTable { region })
            }
            "any[]" => {
                self.advance();
                self.ast.add_type(CslType::AnyArray { region })
            }
            "{" => self.parse_table_type(),
            "(" => {
                self.advance();
                let ty = self.parse_type();
                self.expect(")", "Expected ')' after parenthesized type");
                self.advance();
                ty
            }
            other => {
                self.errors.push(Diagnostic::error(
                    format!("Unexpected token in type: {}", other),
                    region,
                ));
                self.ast.add_type(CslType::Invalid { region })
            }
        }
    }

    fn parse_literal_type(&mut self) -> TypeId {
        let t = self.cur().expect("literal token");
        let primitive = match t.kind {
            TokenKind::Number => Primitive::Number,
            TokenKind::Boolean => Primitive::Boolean,
            TokenKind::String => Primitive::String,
            TokenKind::Datetime => Primitive::Datetime,
            _ => Primitive::Duration,
        };
        let allowed = vec![(t.value.clone(), t.prop.unwrap_or(TypeDescriptor::Invalid))];
        let region = t.range;
        self.advance();
        self.ast.add_type(CslType::Primitive(PrimitiveType {
            primitive,
            allowed_values: allowed,
            annotations: Vec::new(),
            region,
        }))
    }

    // ---- annotations ----------------------------------------------------

    fn parse_annotations(&mut self, parsing_global: bool) -> Vec<Annotation> {
        let mut annotations = Vec::new();
        while self.cur_is("@")
            && self
                .next()
                .is_some_and(|n| is_global_annotation(&n.value) == parsing_global)
        {
            annotations.push(self.parse_annotation(parsing_global));
        }
        annotations
    }

    fn parse_annotation(&mut self, parsing_global: bool) -> Annotation {
        let annotation_start = self.cur_start();
        self.advance(); // consume '@'

        let Some(t) = self.cur() else {
            self.errors.push(Diagnostic::error(
                "Expected annotation name after '@'. Found end of input.",
                Region::default(),
            ));
            return Annotation {
                name: String::new(),
                args: Vec::new(),
                region: Region::new(annotation_start, self.prev_end()),
            };
        };
        let name = t.value.clone();
        let name_region = t.range;
        if parsing_global {
            if !is_global_annotation(&name) {
                self.errors.push(Diagnostic::error(
                    format!(
                        "Found local annotation {} when parsing global annotations",
                        name
                    ),
                    name_region,
                ));
            }
        } else if is_global_annotation(&name) {
            self.errors.push(Diagnostic::error(
                format!(
                    "Found global annotation {} when parsing local annotations",
                    name
                ),
                name_region,
            ));
        }
        self.advance();

        let mut args = Vec::new();
        if self.cur_is("(") {
            self.advance();
            self.parse_delimited_annotation_args(&mut args);
            if !self.at_end() {
                self.advance(); // consume ')'
            }
        }

        Annotation {
            name,
            args,
            region: Region::new(annotation_start, self.prev_end()),
        }
    }

    fn parse_delimited_annotation_args(&mut self, args: &mut Vec<ExprId>) {
        while !self.at_end() && !self.cur_is(")") {
            args.push(self.parse_expression(17));
            if self.at_end() {
                break;
            }
            if self.cur_is(",") {
                self.advance();
            } else if !self.cur_is(")") {
                self.errors.push(Diagnostic::error(
                    "Expected ',' or ')' in annotation",
                    self.cur().unwrap().range,
                ));
                self.advance();
            }
        }
    }

    // ---- constraints ----------------------------------------------------

    fn parse_constraints(&mut self) -> Vec<Constraint> {
        let mut constraints = Vec::new();
        self.advance(); // consume 'constraints'
        self.expect("{", "Expected '{' after constraints");
        self.advance();

        while !self.at_end() && !self.cur_is("}") {
            match self.cur_value() {
                "conflicts" => constraints.push(self.parse_conflict_constraint()),
                "requires" => constraints.push(self.parse_dependency_constraint()),
                "validate" => constraints.push(self.parse_validate_constraint()),
                _ => self.advance(),
            }
        }

        self.advance(); // consume '}'
        if self.cur_is(";") {
            self.advance();
        }
        constraints
    }

    fn parse_conflict_constraint(&mut self) -> Constraint {
        let start = self.cur_start();
        self.advance(); // consume 'conflicts'
        let first = self.parse_expression(17);
        self.expect("with", "Expected 'with' in conflict constraint");
        self.advance();
        let second = self.parse_expression(17);
        self.expect(";", "Expected ';' after conflict");
        let end = self.cur().map(|t| t.range.end).unwrap_or(self.prev_end());
        self.advance();
        Constraint::Conflict {
            first,
            second,
            region: Region::new(start, end),
        }
    }

    fn parse_dependency_constraint(&mut self) -> Constraint {
        let start = self.cur_start();
        self.advance(); // consume 'requires'
        let dependent = self.parse_expression(17);
        self.expect("=>", "Expected '=>' in dependency");
        self.advance();
        let condition = self.parse_expression(17);
        self.expect(";", "Expected ';' after dependency");
        let end = self.cur().map(|t| t.range.end).unwrap_or(self.prev_end());
        self.advance();
        Constraint::Dependency {
            dependent,
            condition,
            region: Region::new(start, end),
        }
    }

    fn parse_validate_constraint(&mut self) -> Constraint {
        let start = self.cur_start();
        self.advance(); // consume 'validate'
        let expr = self.parse_expression(17);
        self.expect(";", "Expected ';' after validate");
        let end = self.cur().map(|t| t.range.end).unwrap_or(self.prev_end());
        self.advance();
        Constraint::Validate {
            expr,
            region: Region::new(start, end),
        }
    }

    // ---- expressions -----------------------------------------------------

    fn parse_expression(&mut self, min_precedence: usize) -> ExprId {
        let expression_start = self.cur_start();
        let mut lhs = self.parse_unary();

        loop {
            let Some(t) = self.cur() else { break };
            let op = t.value.clone();
            if !BINARY_OPERATORS.contains(&op.as_str()) {
                break;
            }
            if binary_precedence(&op) >= min_precedence + binary_associativity(&op) {
                break;
            }

            if op == "@" {
                let annotation = self.parse_annotation(false);
                let region = annotation.region;
                lhs = self.ast.add_expr(Expr::Annotation {
                    target: lhs,
                    annotation,
                    region,
                });
            } else {
                self.advance();
                let rhs = self.parse_expression(binary_precedence(&op));
                lhs = self.ast.add_expr(Expr::Binary {
                    op,
                    lhs,
                    rhs,
                    region: Region::new(expression_start, self.prev_end()),
                });
            }
        }

        if self.cur_is("?") {
            self.advance();
            let then_expr = self.parse_expression(17);
            self.expect(":", "Expected ':' in ternary");
            if !self.at_end() {
                self.advance();
            }
            let else_expr = self.parse_expression(17);
            lhs = self.ast.add_expr(Expr::Ternary {
                condition: lhs,
                then_expr,
                else_expr,
                region: Region::new(expression_start, self.prev_end()),
            });
        }

        lhs
    }

    fn parse_unary(&mut self) -> ExprId {
        let Some(t) = self.cur() else {
            return self.parse_primary();
        };
        if t.kind != TokenKind::Operator || !UNARY_OPERATORS.contains(&t.value.as_str()) {
            return self.parse_primary();
        }
        let op = t.value.clone();
        let expression_start = t.range.start;
        self.advance();
        let operand = self.parse_expression(3);
        self.ast.add_expr(Expr::Unary {
            op,
            operand,
            region: Region::new(expression_start, self.prev_end()),
        })
    }

    fn parse_primary(&mut self) -> ExprId {
        let Some(t) = self.cur() else {
            self.errors.push(Diagnostic::error(
                "Unexpected end of input.",
                Region::default(),
            ));
            return self.missing_expr();
        };

        if is_literal_kind(t.kind) {
            let expr = Expr::Literal {
                value: t.value.clone(),
                descriptor: t.prop.unwrap_or(TypeDescriptor::Invalid),
                region: t.range,
            };
            self.advance();
            return self.ast.add_expr(expr);
        }

        match t.kind {
            TokenKind::Identifier => {
                let expr = Expr::Identifier {
                    name: t.value.clone(),
                    region: t.range,
                };
                self.advance();
                self.ast.add_expr(expr)
            }
            TokenKind::Keyword => {
                let call_start = t.range.start;
                let name = t.value.clone();
                self.advance();
                self.expect("(", "Expected '(' after function name");
                if !self.at_end() {
                    self.advance();
                }
                let mut args = Vec::new();
                self.parse_delimited_args(&mut args, "function call", true);
                if !self.at_end() {
                    self.advance(); // consume ')'
                }
                self.ast.add_expr(Expr::FunctionCall {
                    name,
                    args,
                    region: Region::new(call_start, self.prev_end()),
                })
            }
            _ if t.value == "(" => {
                self.advance();
                let expr = self.parse_expression(17);
                self.expect(")", "Expected ')' after expression");
                self.advance();
                expr
            }
            _ => {
                self.errors.push(Diagnostic::error(
                    format!("Unexpected primary token: {}", t.value),
                    t.range,
                ));
                self.missing_expr()
            }
        }
    }

    fn parse_delimited_args(&mut self, args: &mut Vec<ExprId>, context: &str, allow_list: bool) {
        while !self.at_end() && !self.cur_is(")") {
            let arg = if allow_list && self.cur_is("[") {
                let arg_start = self.cur_start();
                self.advance();
                let mut elems = Vec::new();
                while !self.at_end() && !self.cur_is("]") {
                    elems.push(self.parse_expression(17));
                    if self.cur_is(",") {
                        self.advance();
                    }
                }
                if !self.at_end() {
                    self.advance(); // consume ']'
                }
                self.ast.add_expr(Expr::FunctionArg {
                    value: FunctionArgValue::List(elems),
                    region: Region::new(arg_start, self.prev_end()),
                })
            } else {
                let arg_start = self.cur_start();
                let value = self.parse_expression(17);
                self.ast.add_expr(Expr::FunctionArg {
                    value: FunctionArgValue::Single(value),
                    region: Region::new(arg_start, self.prev_end()),
                })
            };
            args.push(arg);

            if self.at_end() {
                break;
            }
            if self.cur_is(",") {
                self.advance();
            } else if !self.cur_is(")") {
                self.errors.push(Diagnostic::error(
                    format!("Expected ',' or ')' in {}", context),
                    self.cur().unwrap().range,
                ));
                self.advance();
            }
        }
    }

    // ---- identifier resolution ------------------------------------------

    /// Token index of the identifier token occupying exactly `region`.
    fn identifier_token_index(&self, region: Region) -> Option<usize> {
        self.tokens
            .iter()
            .position(|t| t.kind == TokenKind::Identifier && t.range == region)
    }

    fn key_exists(&self, keys: &[KeyId], name: &str) -> bool {
        keys.iter().any(|&k| self.ast.key(k).name == name)
    }

    fn find_key_by_name(&self, keys: &[KeyId], name: &str) -> Option<KeyId> {
        keys.iter().copied().find(|&k| self.ast.key(k).name == name)
    }

    /// Resolve an identifier or dotted path to the table behind the named
    /// key's type.
    fn resolve_table_from_expr(&self, expr: ExprId, keys: &[KeyId]) -> Option<TypeId> {
        match self.ast.expr(expr) {
            Expr::Identifier { name, .. } => {
                let key = self.find_key_by_name(keys, name)?;
                self.ast
                    .table_behind(self.ast.key(key).ty)
                    .map(|(id, _)| id)
            }
            Expr::Binary { op, lhs, rhs, .. } if op == "." => {
                let left_table = self.resolve_table_from_expr(*lhs, keys)?;
                let table = self.ast.ty(left_table).as_table()?;
                if let Expr::Identifier { name, .. } = self.ast.expr(*rhs) {
                    let key = self.ast.find_key(table, name)?;
                    self.ast
                        .table_behind(self.ast.key(key).ty)
                        .map(|(id, _)| id)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Resolve an identifier or dotted path to the named key's type.
    fn resolve_key_type_from_expr(&self, expr: ExprId, keys: &[KeyId]) -> Option<TypeId> {
        match self.ast.expr(expr) {
            Expr::Identifier { name, .. } => self
                .find_key_by_name(keys, name)
                .map(|k| self.ast.key(k).ty),
            Expr::Binary { op, lhs, rhs, .. } if op == "." => {
                let left_table = self.resolve_table_from_expr(*lhs, keys)?;
                let table = self.ast.ty(left_table).as_table()?;
                if let Expr::Identifier { name, .. } = self.ast.expr(*rhs) {
                    self.ast.find_key(table, name).map(|k| self.ast.key(k).ty)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn map_identifiers_in_expr(&mut self, expr: ExprId, keys: &[KeyId]) {
        match self.ast.expr(expr).clone() {
            Expr::Identifier { name, region } => {
                if let Some(key) = self.find_key_by_name(keys, &name) {
                    if let Some(idx) = self.identifier_token_index(region) {
                        self.definitions.insert(idx, DefRef::Key(key));
                    }
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                if op == "." {
                    if let Some(table_id) = self.resolve_table_from_expr(lhs, keys) {
                        let table = self.ast.ty(table_id).as_table().cloned();
                        if let (Some(table), Expr::Identifier { name, region }) =
                            (table, self.ast.expr(rhs).clone())
                        {
                            if let Some(key) = self.ast.find_key(&table, &name) {
                                if let Some(idx) = self.identifier_token_index(region) {
                                    self.definitions.insert(idx, DefRef::Key(key));
                                }
                            }
                        }
                    }
                }
                self.map_identifiers_in_expr(lhs, keys);
                self.map_identifiers_in_expr(rhs, keys);
            }
            Expr::Unary { operand, .. } => self.map_identifiers_in_expr(operand, keys),
            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                self.map_identifiers_in_expr(condition, keys);
                self.map_identifiers_in_expr(then_expr, keys);
                self.map_identifiers_in_expr(else_expr, keys);
            }
            Expr::FunctionCall { args, .. } => {
                for arg in args {
                    if let Expr::FunctionArg { value, .. } = self.ast.expr(arg).clone() {
                        match value {
                            FunctionArgValue::Single(e) => self.map_identifiers_in_expr(e, keys),
                            FunctionArgValue::List(elems) => {
                                for e in elems {
                                    self.map_identifiers_in_expr(e, keys);
                                }
                            }
                        }
                    }
                }
            }
            Expr::Annotation {
                target, annotation, ..
            } => {
                self.map_identifiers_in_expr(target, keys);
                for arg in annotation.args {
                    self.map_identifiers_in_expr(arg, keys);
                }
            }
            Expr::Literal { .. } | Expr::FunctionArg { .. } => {}
        }
    }

    fn map_identifiers_in_annotations(&mut self, annotations: &[Annotation], keys: &[KeyId]) {
        for annotation in annotations {
            for &arg in &annotation.args {
                self.map_identifiers_in_expr(arg, keys);
            }
        }
    }

    fn map_identifiers_in_type(&mut self, ty: TypeId, keys: &[KeyId]) {
        match self.ast.ty(ty).clone() {
            CslType::Primitive(p) => self.map_identifiers_in_annotations(&p.annotations, keys),
            CslType::Array { element, .. } => self.map_identifiers_in_type(element, keys),
            CslType::Union { members, .. } => {
                for member in members {
                    self.map_identifiers_in_type(member, keys);
                }
            }
            // Nested tables resolved their own keys when they were parsed.
            CslType::Table(_) => {}
            _ => {}
        }
    }

    fn map_identifiers_in_constraints(&mut self, constraints: &[Constraint], keys: &[KeyId]) {
        for constraint in constraints {
            match *constraint {
                Constraint::Conflict { first, second, .. } => {
                    self.map_identifiers_in_expr(first, keys);
                    self.map_identifiers_in_expr(second, keys);
                }
                Constraint::Dependency {
                    dependent,
                    condition,
                    ..
                } => {
                    self.map_identifiers_in_expr(dependent, keys);
                    self.map_identifiers_in_expr(condition, keys);
                }
                Constraint::Validate { expr, .. } => {
                    self.map_identifiers_in_expr(expr, keys);
                }
            }
        }
    }

    // ---- semantic validation --------------------------------------------

    fn validate_annotations_for_type(&mut self, ty: TypeId) {
        let CslType::Primitive(p) = self.ast.ty(ty) else {
            return;
        };
        let primitive = p.primitive;
        let checks: Vec<(String, Region)> = p
            .annotations
            .iter()
            .map(|a| (a.name.clone(), a.region))
            .collect();
        for (name, region) in checks {
            if NUMERIC_ANNOTATIONS.contains(&name.as_str()) && primitive != Primitive::Number {
                self.errors.push(Diagnostic::error(
                    format!(
                        "Numeric annotation '@{}' is not allowed on {}",
                        name,
                        primitive.keyword()
                    ),
                    region,
                ));
            }
            if STRING_ANNOTATIONS.contains(&name.as_str()) && primitive != Primitive::String {
                self.errors.push(Diagnostic::error(
                    format!(
                        "String annotation '@{}' is not allowed on {}",
                        name,
                        primitive.keyword()
                    ),
                    region,
                ));
            }
        }
    }

    fn validate_default_for_key(&mut self, key: KeyId) {
        let k = self.ast.key(key);
        let Some((_, descriptor)) = &k.default_value else {
            return;
        };
        let CslType::Primitive(p) = self.ast.ty(k.ty) else {
            return;
        };
        if !p.primitive.matches_descriptor(descriptor) {
            let region = k.name_region;
            self.errors.push(Diagnostic::error(
                "Default value type does not match declared type",
                region,
            ));
        }
    }

    fn validate_constraints_semantics(&mut self, constraints: &[Constraint], keys: &[KeyId]) {
        for constraint in constraints {
            match *constraint {
                Constraint::Dependency {
                    dependent,
                    condition,
                    ..
                } => {
                    if let Expr::Identifier { name, region } = self.ast.expr(condition).clone() {
                        if !self.key_exists(keys, &name) {
                            self.errors.push(Diagnostic::error(
                                format!("Dependency references missing key: {}", name),
                                region,
                            ));
                        }
                    }
                    self.walk_unknown_check(dependent, keys, WalkMode::Dependency);
                }
                Constraint::Validate { expr, .. } => {
                    self.walk_unknown_check(expr, keys, WalkMode::Validate);
                }
                Constraint::Conflict { first, second, .. } => {
                    self.walk_unknown_check(first, keys, WalkMode::Conflict);
                    self.walk_unknown_check(second, keys, WalkMode::Conflict);
                }
            }
        }
    }

    fn walk_unknown_check(&mut self, expr: ExprId, keys: &[KeyId], mode: WalkMode) {
        match self.ast.expr(expr).clone() {
            Expr::Identifier { name, region } => {
                let resolved_elsewhere = self
                    .identifier_token_index(region)
                    .is_some_and(|idx| self.definitions.contains_key(&idx));
                if !self.key_exists(keys, &name) && !resolved_elsewhere {
                    self.errors.push(Diagnostic::error(
                        format!("Unknown identifier in current context: {}", name),
                        region,
                    ));
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                if op == "." {
                    // The RHS is a property of the LHS; its resolution was
                    // handled by the mapping pass, so only the LHS is
                    // checked here.
                    self.walk_unknown_check(lhs, keys, mode);
                } else {
                    self.walk_unknown_check(lhs, keys, mode);
                    self.walk_unknown_check(rhs, keys, mode);
                }
            }
            Expr::Unary { operand, .. } => self.walk_unknown_check(operand, keys, mode),
            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                if mode != WalkMode::Conflict {
                    self.walk_unknown_check(condition, keys, mode);
                    self.walk_unknown_check(then_expr, keys, mode);
                    self.walk_unknown_check(else_expr, keys, mode);
                }
            }
            Expr::FunctionCall { name, args, region } => {
                if mode == WalkMode::Validate && name == "subset" && args.len() >= 3 {
                    let mut sides_ok = true;
                    for &arg in args.iter().take(2) {
                        let resolved = match self.ast.expr(arg) {
                            Expr::FunctionArg {
                                value: FunctionArgValue::Single(e),
                                ..
                            } => self.resolve_key_type_from_expr(*e, keys),
                            _ => None,
                        };
                        let is_table_array = resolved.is_some_and(|tid| {
                            matches!(self.ast.ty(tid), CslType::Array { element, .. }
                                if self.ast.table_behind(*element).is_some())
                        });
                        if !is_table_array {
                            sides_ok = false;
                        }
                    }
                    if !sides_ok {
                        self.errors.push(Diagnostic::error(
                            "subset with property list requires table arrays",
                            region,
                        ));
                    }
                }
                for arg in args {
                    if let Expr::FunctionArg { value, .. } = self.ast.expr(arg).clone() {
                        match value {
                            FunctionArgValue::Single(e) => self.walk_unknown_check(e, keys, mode),
                            FunctionArgValue::List(elems) => {
                                // Property lists in `subset` name table
                                // columns, not sibling keys.
                                let descend = match mode {
                                    WalkMode::Conflict => false,
                                    _ => name != "subset",
                                };
                                if descend {
                                    for e in elems {
                                        self.walk_unknown_check(e, keys, mode);
                                    }
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests;
