//! Representation of parsed CSL schemas.
//!
//! All nodes live in one [`Ast`] arena and refer to each other through
//! integer ids. The parser creates nodes; everything downstream (printer,
//! HTML generator, language server) reads them. Nodes are immutable once
//! the parse finishes.

use std::collections::HashMap;

pub use csl_tokenizer::{
    Diagnostic, Position, Region, Severity, StringKind, Token, TokenKind, TokenList,
    TypeDescriptor,
};

/// Id of a [`CslType`] in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

/// Id of a [`KeyDefinition`] in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId(pub u32);

/// Id of an [`Expr`] in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// Id of a [`ConfigSchema`] in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaId(pub u32);

/// A built-in scalar category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Datetime,
    Duration,
}

impl Primitive {
    /// The keyword spelling (`string`, `number`, ...).
    pub fn keyword(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::Datetime => "datetime",
            Primitive::Duration => "duration",
        }
    }

    /// Capitalized display name used in hovers.
    pub fn display(&self) -> &'static str {
        match self {
            Primitive::String => "String",
            Primitive::Number => "Number",
            Primitive::Boolean => "Boolean",
            Primitive::Datetime => "Datetime",
            Primitive::Duration => "Duration",
        }
    }

    /// Whether a literal with this descriptor belongs to this primitive.
    pub fn matches_descriptor(&self, desc: &TypeDescriptor) -> bool {
        match self {
            Primitive::String => desc.is_string(),
            Primitive::Number => desc.is_numeric(),
            Primitive::Boolean => matches!(desc, TypeDescriptor::Boolean),
            Primitive::Datetime => desc.is_datetime(),
            Primitive::Duration => matches!(desc, TypeDescriptor::Duration),
        }
    }

    /// The primitive a literal descriptor infers when no type is declared.
    pub fn infer_from_descriptor(desc: &TypeDescriptor) -> Primitive {
        match desc {
            TypeDescriptor::Boolean => Primitive::Boolean,
            TypeDescriptor::String(_) => Primitive::String,
            TypeDescriptor::DateTime(_) => Primitive::Datetime,
            TypeDescriptor::Duration => Primitive::Duration,
            _ => Primitive::Number,
        }
    }
}

/// `@name(args...)` attached to a type or key.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<ExprId>,
    pub region: Region,
}

/// A primitive type, possibly narrowed to an enum of literals.
///
/// `allowed_values` is empty for an open type (`string`) and non-empty
/// when the type is a literal enum (`"dev" | "prod"` contributes one
/// literal per member).
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveType {
    pub primitive: Primitive,
    pub allowed_values: Vec<(String, TypeDescriptor)>,
    pub annotations: Vec<Annotation>,
    pub region: Region,
}

/// A brace-enclosed table of key definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct TableType {
    pub explicit_keys: Vec<KeyId>,
    pub wildcard_key: Option<KeyId>,
    pub constraints: Vec<Constraint>,
    pub region: Region,
}

/// A CSL type.
#[derive(Debug, Clone, PartialEq)]
pub enum CslType {
    Primitive(PrimitiveType),
    Table(TableType),
    Array { element: TypeId, region: Region },
    Union { members: Vec<TypeId>, region: Region },
    AnyTable { region: Region },
    AnyArray { region: Region },
    Invalid { region: Region },
}

impl CslType {
    /// The source region this type was parsed from.
    pub fn region(&self) -> Region {
        match self {
            CslType::Primitive(p) => p.region,
            CslType::Table(t) => t.region,
            CslType::Array { region, .. }
            | CslType::Union { region, .. }
            | CslType::AnyTable { region }
            | CslType::AnyArray { region }
            | CslType::Invalid { region } => *region,
        }
    }

    pub fn as_table(&self) -> Option<&TableType> {
        match self {
            CslType::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveType> {
        match self {
            CslType::Primitive(p) => Some(p),
            _ => None,
        }
    }
}

/// One key in a table, explicit or wildcard.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyDefinition {
    pub name: String,
    pub is_wildcard: bool,
    pub is_optional: bool,
    pub ty: TypeId,
    pub annotations: Vec<Annotation>,
    pub default_value: Option<(String, TypeDescriptor)>,
    pub name_region: Region,
    pub definition_region: Region,
}

/// One rule in a `constraints { }` block.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Conflict {
        first: ExprId,
        second: ExprId,
        region: Region,
    },
    Dependency {
        dependent: ExprId,
        condition: ExprId,
        region: Region,
    },
    Validate {
        expr: ExprId,
        region: Region,
    },
}

impl Constraint {
    pub fn region(&self) -> Region {
        match self {
            Constraint::Conflict { region, .. }
            | Constraint::Dependency { region, .. }
            | Constraint::Validate { region, .. } => *region,
        }
    }
}

/// The payload of one function-call argument: a plain expression or a
/// bracketed list (used by `subset(a, b, [props])`).
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArgValue {
    Single(ExprId),
    List(Vec<ExprId>),
}

/// An expression in a constraint or annotation argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: String,
        descriptor: TypeDescriptor,
        region: Region,
    },
    Identifier {
        name: String,
        region: Region,
    },
    Unary {
        op: String,
        operand: ExprId,
        region: Region,
    },
    Binary {
        op: String,
        lhs: ExprId,
        rhs: ExprId,
        region: Region,
    },
    Ternary {
        condition: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
        region: Region,
    },
    FunctionCall {
        name: String,
        /// Each entry is a [`Expr::FunctionArg`] node.
        args: Vec<ExprId>,
        region: Region,
    },
    FunctionArg {
        value: FunctionArgValue,
        region: Region,
    },
    Annotation {
        target: ExprId,
        annotation: Annotation,
        region: Region,
    },
}

impl Expr {
    pub fn region(&self) -> Region {
        match self {
            Expr::Literal { region, .. }
            | Expr::Identifier { region, .. }
            | Expr::Unary { region, .. }
            | Expr::Binary { region, .. }
            | Expr::Ternary { region, .. }
            | Expr::FunctionCall { region, .. }
            | Expr::FunctionArg { region, .. }
            | Expr::Annotation { region, .. } => *region,
        }
    }
}

/// A named `config` block with its root table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSchema {
    pub name: String,
    /// Always points at a [`CslType::Table`].
    pub root: TypeId,
    pub region: Region,
    pub name_region: Region,
}

/// What a token refers to: a schema name or a key definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefRef {
    Schema(SchemaId),
    Key(KeyId),
}

/// Token index → definition, produced by the parser.
pub type DefinitionMap = HashMap<usize, DefRef>;

/// Arena owning every node of a parse result.
#[derive(Debug, Default)]
pub struct Ast {
    types: Vec<CslType>,
    keys: Vec<KeyDefinition>,
    exprs: Vec<Expr>,
    schemas: Vec<ConfigSchema>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, ty: CslType) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn add_key(&mut self, key: KeyDefinition) -> KeyId {
        let id = KeyId(self.keys.len() as u32);
        self.keys.push(key);
        id
    }

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn add_schema(&mut self, schema: ConfigSchema) -> SchemaId {
        let id = SchemaId(self.schemas.len() as u32);
        self.schemas.push(schema);
        id
    }

    pub fn ty(&self, id: TypeId) -> &CslType {
        &self.types[id.0 as usize]
    }

    pub fn key(&self, id: KeyId) -> &KeyDefinition {
        &self.keys[id.0 as usize]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn schema(&self, id: SchemaId) -> &ConfigSchema {
        &self.schemas[id.0 as usize]
    }

    pub fn schemas(&self) -> impl Iterator<Item = (SchemaId, &ConfigSchema)> {
        self.schemas
            .iter()
            .enumerate()
            .map(|(i, s)| (SchemaId(i as u32), s))
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// The root table of a schema.
    pub fn root_table(&self, schema: &ConfigSchema) -> &TableType {
        self.ty(schema.root)
            .as_table()
            .expect("schema root is a table")
    }

    /// Resolve a type to a table the way dotted-path navigation does:
    /// a table directly, the first table member of a union, or the table
    /// behind an array (including array-of-union).
    pub fn table_behind(&self, id: TypeId) -> Option<(TypeId, &TableType)> {
        match self.ty(id) {
            CslType::Table(t) => Some((id, t)),
            CslType::Union { members, .. } => members
                .iter()
                .find_map(|&m| self.ty(m).as_table().map(|t| (m, t))),
            CslType::Array { element, .. } => match self.ty(*element) {
                CslType::Table(t) => Some((*element, t)),
                CslType::Union { members, .. } => members
                    .iter()
                    .find_map(|&m| self.ty(m).as_table().map(|t| (m, t))),
                _ => None,
            },
            _ => None,
        }
    }

    /// Find a key of `table` by name.
    pub fn find_key(&self, table: &TableType, name: &str) -> Option<KeyId> {
        table
            .explicit_keys
            .iter()
            .copied()
            .find(|&k| self.key(k).name == name)
    }

    /// The region a [`DefRef`]'s name occupies.
    pub fn def_name_region(&self, def: DefRef) -> Region {
        match def {
            DefRef::Schema(id) => self.schema(id).name_region,
            DefRef::Key(id) => self.key(id).name_region,
        }
    }
}
