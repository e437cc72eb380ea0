//! Type descriptors carried by literal tokens.

/// Which kind of string literal a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    /// `"..."` on a single line
    Basic,
    /// `"..."` spanning multiple lines
    MultiLineBasic,
    /// `R"tag(...)tag"` on a single line
    Raw,
    /// `R"tag(...)tag"` spanning multiple lines
    MultiLineRaw,
}

/// Which kind of datetime literal a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateTimeKind {
    /// Date, time and UTC offset (or `Z`)
    OffsetDateTime,
    /// Date and time without offset
    LocalDateTime,
    /// Date only
    LocalDate,
    /// Time only
    LocalTime,
}

/// `nan` or `inf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialNumberKind {
    NaN,
    Infinity,
}

/// The literal class of a token, carried alongside its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Invalid,
    Boolean,
    Integer,
    Float,
    SpecialNumber(SpecialNumberKind),
    String(StringKind),
    DateTime(DateTimeKind),
    Duration,
}

impl TypeDescriptor {
    /// Whether this descriptor denotes a numeric literal.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeDescriptor::Integer | TypeDescriptor::Float | TypeDescriptor::SpecialNumber(_)
        )
    }

    /// Whether this descriptor denotes a string literal.
    pub fn is_string(&self) -> bool {
        matches!(self, TypeDescriptor::String(_))
    }

    /// Whether this descriptor denotes a datetime literal.
    pub fn is_datetime(&self) -> bool {
        matches!(self, TypeDescriptor::DateTime(_))
    }

    /// Stable display name, used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            TypeDescriptor::Invalid => "Invalid",
            TypeDescriptor::Boolean => "Boolean",
            TypeDescriptor::Integer => "Integer",
            TypeDescriptor::Float => "Float",
            TypeDescriptor::SpecialNumber(SpecialNumberKind::NaN) => "NaN",
            TypeDescriptor::SpecialNumber(SpecialNumberKind::Infinity) => "Infinity",
            TypeDescriptor::String(StringKind::Basic) => "Basic",
            TypeDescriptor::String(StringKind::MultiLineBasic) => "MultiLineBasic",
            TypeDescriptor::String(StringKind::Raw) => "Raw",
            TypeDescriptor::String(StringKind::MultiLineRaw) => "MultiLineRaw",
            TypeDescriptor::DateTime(DateTimeKind::OffsetDateTime) => "OffsetDateTime",
            TypeDescriptor::DateTime(DateTimeKind::LocalDateTime) => "LocalDateTime",
            TypeDescriptor::DateTime(DateTimeKind::LocalDate) => "LocalDate",
            TypeDescriptor::DateTime(DateTimeKind::LocalTime) => "LocalTime",
            TypeDescriptor::Duration => "Duration",
        }
    }
}

impl Default for TypeDescriptor {
    fn default() -> Self {
        TypeDescriptor::Invalid
    }
}
