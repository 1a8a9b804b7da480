//! Schema model for line-oriented packets: enums, groups and packet definitions.
//!
//! A [`Schema`] is plain data. It is produced by the DSL parser or assembled with
//! the builder methods below, then handed to [`Catalogue::build`](crate::Catalogue::build)
//! which checks it and freezes it for decoding.

/// Separator used between tokens when a packet declares none.
pub const DEFAULT_SEPARATOR: char = ' ';

/// Root schema: enumerations, reusable groups and packet definitions.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub enums: Vec<EnumDefinition>,
    pub groups: Vec<GroupDefinition>,
    pub packets: Vec<PacketDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enum(mut self, def: EnumDefinition) -> Self {
        self.enums.push(def);
        self
    }

    pub fn with_group(mut self, def: GroupDefinition) -> Self {
        self.groups.push(def);
        self
    }

    pub fn with_packet(mut self, def: PacketDefinition) -> Self {
        self.packets.push(def);
        self
    }
}

/// One packet kind, keyed by its header token.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketDefinition {
    pub name: String,
    pub header: String,
    /// Top-level separator; `None` means [`DEFAULT_SEPARATOR`].
    pub separator: Option<char>,
    pub fields: Vec<FieldDescriptor>,
}

impl PacketDefinition {
    pub fn new(name: impl Into<String>, header: impl Into<String>) -> Self {
        PacketDefinition {
            name: name.into(),
            header: header.into(),
            separator: None,
            fields: Vec::new(),
        }
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = Some(separator);
        self
    }

    /// Append a field at the next ordinal.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let index = self.fields.len();
        self.fields.push(FieldDescriptor::new(index, name, kind));
        self
    }

    /// Append a fully built descriptor; its ordinal is kept as given.
    pub fn descriptor(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    pub fn top_separator(&self) -> char {
        self.separator.unwrap_or(DEFAULT_SEPARATOR)
    }
}

/// Schema entry for one field: position, kind, separator and constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub index: usize,
    pub name: String,
    pub kind: FieldKind,
    /// For scalars: the character ending this field's token instead of the packet
    /// separator. For lists: the separator between items inside one token.
    pub separator: Option<char>,
    pub constraint: Option<Constraint>,
    /// Enum ordinals outside the member set fail binding instead of validation.
    pub strict: bool,
}

impl FieldDescriptor {
    pub fn new(index: usize, name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDescriptor {
            index,
            name: name.into(),
            kind,
            separator: None,
            constraint: None,
            strict: false,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// Field value kind. Matched exhaustively by the binder.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(PrimitiveType),
    /// Reference to an [`EnumDefinition`] by name.
    Enum(String),
    /// Present only if a token remains.
    Optional(Box<FieldKind>),
    List { item: ItemSpec, len: ListLength },
    Embedded(Embed),
    /// Free text absorbing the rest of the line verbatim.
    Text,
}

impl FieldKind {
    pub fn optional(kind: FieldKind) -> Self {
        FieldKind::Optional(Box::new(kind))
    }

    pub fn list(item: ItemSpec, len: ListLength) -> Self {
        FieldKind::List { item, len }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, FieldKind::Optional(_))
    }

    /// True for `text` and `optional<text>`.
    pub fn is_text(&self) -> bool {
        match self {
            FieldKind::Text => true,
            FieldKind::Optional(inner) => inner.is_text(),
            _ => false,
        }
    }

    /// Kind with one level of `Optional` removed.
    pub fn required(&self) -> &FieldKind {
        match self {
            FieldKind::Optional(inner) => inner,
            other => other,
        }
    }
}

/// Element type of a list.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemSpec {
    Primitive(PrimitiveType),
    Enum(String),
    Group(String),
}

/// How many items a list holds.
#[derive(Debug, Clone, PartialEq)]
pub enum ListLength {
    /// Value of an earlier bound integer field.
    FieldRef(String),
    Constant(usize),
    /// Everything up to the end of the line.
    Remaining,
}

/// Embedded sub-packet: an inline command decoded recursively.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    /// Header the nested command must carry, if fixed.
    pub target: Option<String>,
    pub span: EmbedSpan,
}

impl Embed {
    pub fn token() -> Self {
        Embed { target: None, span: EmbedSpan::Token }
    }

    pub fn rest() -> Self {
        Embed { target: None, span: EmbedSpan::Rest }
    }

    pub fn target(mut self, header: impl Into<String>) -> Self {
        self.target = Some(header.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedSpan {
    /// One token of the host line.
    Token,
    /// The rest of the host line.
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Float,
    Double,
    Bool,
    Str,
    Guid,
    Version,
}

impl PrimitiveType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            PrimitiveType::U8
                | PrimitiveType::U16
                | PrimitiveType::U32
                | PrimitiveType::U64
                | PrimitiveType::I8
                | PrimitiveType::I16
                | PrimitiveType::I32
                | PrimitiveType::I64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, PrimitiveType::Float | PrimitiveType::Double)
    }

    /// DSL keyword, also used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::U8 => "u8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::I8 => "i8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Str => "string",
            PrimitiveType::Guid => "guid",
            PrimitiveType::Version => "version",
        }
    }
}

/// Closed set of named integers.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDefinition {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

impl EnumDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        EnumDefinition { name: name.into(), members: Vec::new() }
    }

    pub fn member(mut self, name: impl Into<String>, ordinal: i64) -> Self {
        self.members.push((name.into(), ordinal));
        self
    }

    pub fn member_name(&self, ordinal: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, o)| *o == ordinal)
            .map(|(n, _)| n.as_str())
    }
}

/// Fixed-width tuple of scalar/enum fields, used as a list item.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDefinition {
    pub name: String,
    /// When set, one item is a single token split on this character.
    pub separator: Option<char>,
    pub fields: Vec<FieldDescriptor>,
}

impl GroupDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        GroupDefinition { name: name.into(), separator: None, fields: Vec::new() }
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let index = self.fields.len();
        self.fields.push(FieldDescriptor::new(index, name, kind));
        self
    }

    pub fn descriptor(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    pub fn width(&self) -> usize {
        self.fields.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Union of inclusive intervals.
    Range(Vec<(i64, i64)>),
    OneOf(Vec<i64>),
}

impl Constraint {
    pub fn range(min: i64, max: i64) -> Self {
        Constraint::Range(vec![(min, max)])
    }
}
