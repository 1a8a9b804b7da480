//! Error types: catalogue construction (fatal), field binding (per line) and typed access.

/// Problems found while parsing or building a catalogue. These are schema bugs,
/// reported once at startup.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("Syntax: {0}")]
    Syntax(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Duplicate header: {0:?}")]
    DuplicateHeader(String),
    #[error("Duplicate enum name: {0}")]
    DuplicateEnum(String),
    #[error("Duplicate group name: {0}")]
    DuplicateGroup(String),
    #[error("{owner}: duplicate field {field}")]
    DuplicateField { owner: String, field: String },
    #[error("{owner}: field {field} has ordinal {found}, expected {expected}")]
    NonDenseOrdinal {
        owner: String,
        field: String,
        expected: usize,
        found: usize,
    },
    #[error("{owner}: required field {field} follows optional field {optional}")]
    RequiredAfterOptional {
        owner: String,
        field: String,
        optional: String,
    },
    #[error("{owner}: field {field} follows trailing text field {text}")]
    FieldAfterText {
        owner: String,
        field: String,
        text: String,
    },
    #[error("{owner}.{field}: count field {count}: {reason}")]
    BadCountField {
        owner: String,
        field: String,
        count: String,
        reason: &'static str,
    },
    #[error("{owner}: unknown enum {name}")]
    UnknownEnum { owner: String, name: String },
    #[error("{owner}: unknown group {name}")]
    UnknownGroup { owner: String, name: String },
    #[error("Group {0} has no fields")]
    EmptyGroup(String),
    #[error("Group {group}: field {field} must be a scalar or enum")]
    InvalidGroupField { group: String, field: String },
    #[error("Enum {name}: duplicate member {member}")]
    DuplicateEnumMember { name: String, member: String },
    #[error("{owner}.{field}: embedded header {target:?} is not registered")]
    UnknownEmbeddedTarget {
        owner: String,
        field: String,
        target: String,
    },
    #[error("Embedding cycle: {0}")]
    EmbeddingCycle(String),
    #[error("{owner}.{field}: constraint on non-numeric field")]
    ConstraintOnNonNumeric { owner: String, field: String },
    #[error("{owner}.{field}: invalid range {min}..{max}")]
    InvalidRange {
        owner: String,
        field: String,
        min: i64,
        max: i64,
    },
    #[error("{owner}.{field}: optional cannot wrap optional")]
    NestedOptional { owner: String, field: String },
}

/// Why a line could not be bound to its packet definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("field {field}: missing token")]
    MissingToken { field: String },
    #[error("field {field}: {raw:?} is not a valid {expected}")]
    InvalidToken {
        field: String,
        raw: String,
        expected: &'static str,
    },
    #[error("field {field}: {ordinal} is not a member of {enum_name}")]
    EnumOutOfRange {
        field: String,
        enum_name: String,
        ordinal: i64,
    },
    #[error("field {field}: count field {count_field} has no value")]
    MissingCount { field: String, count_field: String },
    #[error("field {field}: negative count {count}")]
    NegativeCount { field: String, count: i64 },
    #[error("field {field}: expected {expected} items, found {found}")]
    InsufficientItems {
        field: String,
        expected: usize,
        found: usize,
    },
}

/// Typed access to a decoded packet failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("no field named {0}")]
    UnknownField(String),
    #[error("field {0} is absent")]
    Absent(String),
    #[error("field {field}: expected {expected}")]
    TypeMismatch { field: String, expected: &'static str },
    #[error("field {field}: no mapping for {value}")]
    Unmapped { field: String, value: String },
}

impl AccessError {
    pub fn type_mismatch(field: &str, expected: &'static str) -> Self {
        AccessError::TypeMismatch { field: field.to_string(), expected }
    }
}
