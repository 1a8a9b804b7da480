//! Immutable schema catalogue: checked once at startup, then shared read-only by
//! every decode call.

use crate::ast::*;
use crate::codec::Decoder;
use crate::error::CatalogueError;
use crate::packet::Packet;
use crate::parser::parse;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Dense index of a packet definition inside its catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(pub(crate) usize);

impl PacketId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Header → definition registry plus the enums and groups the definitions use.
#[derive(Debug)]
pub struct Catalogue {
    packets: Vec<PacketDefinition>,
    by_header: HashMap<String, PacketId>,
    enums: HashMap<String, EnumDefinition>,
    groups: HashMap<String, GroupDefinition>,
    /// Non-space separators declared by packets, tried for marker headers.
    marker_separators: Vec<char>,
    /// All-punctuation headers (`/`, `:`), longest first. These may be written
    /// glued to their payload.
    glued: Vec<PacketId>,
}

/// Build a catalogue from packet-kind descriptions.
pub fn build_catalogue(schema: Schema) -> Result<Catalogue, CatalogueError> {
    Catalogue::build(schema)
}

impl Catalogue {
    /// Check every definition and freeze the schema.
    pub fn build(schema: Schema) -> Result<Self, CatalogueError> {
        let mut enums = HashMap::new();
        for e in schema.enums {
            check_enum(&e)?;
            if enums.contains_key(&e.name) {
                return Err(CatalogueError::DuplicateEnum(e.name));
            }
            enums.insert(e.name.clone(), e);
        }

        let mut groups = HashMap::new();
        for g in schema.groups {
            check_group(&g, &enums)?;
            if groups.contains_key(&g.name) {
                return Err(CatalogueError::DuplicateGroup(g.name));
            }
            groups.insert(g.name.clone(), g);
        }

        let mut by_header = HashMap::new();
        let mut marker_separators = Vec::new();
        for (i, p) in schema.packets.iter().enumerate() {
            if by_header.insert(p.header.clone(), PacketId(i)).is_some() {
                return Err(CatalogueError::DuplicateHeader(p.header.clone()));
            }
            if let Some(sep) = p.separator.filter(|&c| c != DEFAULT_SEPARATOR) {
                if !marker_separators.contains(&sep) {
                    marker_separators.push(sep);
                }
            }
        }

        let mut glued: Vec<PacketId> = (0..schema.packets.len())
            .filter(|&i| is_glueable(&schema.packets[i].header))
            .map(PacketId)
            .collect();
        glued.sort_by_key(|id| std::cmp::Reverse(schema.packets[id.0].header.len()));

        let catalogue = Catalogue {
            packets: schema.packets,
            by_header,
            enums,
            groups,
            marker_separators,
            glued,
        };
        for p in &catalogue.packets {
            catalogue.check_packet(p)?;
        }
        catalogue.check_embedding_cycles()?;

        debug!(
            packets = catalogue.packets.len(),
            enums = catalogue.enums.len(),
            groups = catalogue.groups.len(),
            "catalogue built"
        );
        Ok(catalogue)
    }

    /// Parse catalogue DSL source and build it.
    pub fn from_dsl(source: &str) -> Result<Self, CatalogueError> {
        Self::build(parse(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogueError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_dsl(&source)
    }

    /// Decode one line with the default decoder configuration.
    pub fn decode(&self, line: &str) -> Packet {
        Decoder::new(self).decode(line)
    }

    /// Exact, case-sensitive header lookup.
    pub fn lookup(&self, header: &str) -> Option<PacketId> {
        self.by_header.get(header).copied()
    }

    pub fn get(&self, header: &str) -> Option<&PacketDefinition> {
        self.lookup(header).map(|id| self.definition(id))
    }

    pub fn definition(&self, id: PacketId) -> &PacketDefinition {
        &self.packets[id.0]
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&GroupDefinition> {
        self.groups.get(name)
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.packets.iter().map(|p| p.header.as_str())
    }

    /// Match a token like `#fins^1^2` against headers declaring that separator.
    /// Returns the definition and the byte length of the header prefix.
    pub fn resolve_marker(&self, token: &str) -> Option<(PacketId, usize)> {
        self.marker_separators.iter().find_map(|&sep| {
            let (prefix, _) = token.split_once(sep)?;
            let id = self.lookup(prefix)?;
            (self.definition(id).separator == Some(sep)).then_some((id, prefix.len()))
        })
    }

    /// Match a token like `/0Lucifer0` against all-punctuation headers written with
    /// no separator before the payload. The longest matching header wins.
    pub fn resolve_glued(&self, token: &str) -> Option<(PacketId, usize)> {
        self.glued.iter().find_map(|&id| {
            let header = self.definition(id).header.as_str();
            (token.len() > header.len() && token.starts_with(header)).then_some((id, header.len()))
        })
    }

    fn check_packet(&self, p: &PacketDefinition) -> Result<(), CatalogueError> {
        let owner = p.header.as_str();
        let mut seen = HashSet::new();
        let mut optional: Option<&str> = None;
        let mut text: Option<&str> = None;
        for (i, f) in p.fields.iter().enumerate() {
            check_common(owner, i, f, &mut seen)?;
            if let Some(text) = text {
                return Err(CatalogueError::FieldAfterText {
                    owner: owner.to_string(),
                    field: f.name.clone(),
                    text: text.to_string(),
                });
            }
            if f.kind.is_optional() {
                optional.get_or_insert(f.name.as_str());
            } else if let Some(optional) = optional {
                return Err(CatalogueError::RequiredAfterOptional {
                    owner: owner.to_string(),
                    field: f.name.clone(),
                    optional: optional.to_string(),
                });
            }
            if f.kind.is_text() {
                text = Some(f.name.as_str());
            }
            self.check_kind(owner, f, &f.kind, &p.fields[..i])?;
            check_constraint(owner, f, &self.enums)?;
        }
        Ok(())
    }

    fn check_kind(
        &self,
        owner: &str,
        f: &FieldDescriptor,
        kind: &FieldKind,
        earlier: &[FieldDescriptor],
    ) -> Result<(), CatalogueError> {
        match kind {
            FieldKind::Scalar(_) | FieldKind::Text => Ok(()),
            FieldKind::Enum(name) => require_enum(owner, name, &self.enums),
            FieldKind::Optional(inner) => {
                if inner.is_optional() {
                    return Err(CatalogueError::NestedOptional {
                        owner: owner.to_string(),
                        field: f.name.clone(),
                    });
                }
                self.check_kind(owner, f, inner, earlier)
            }
            FieldKind::List { item, len } => {
                match item {
                    ItemSpec::Primitive(_) => {}
                    ItemSpec::Enum(name) => require_enum(owner, name, &self.enums)?,
                    ItemSpec::Group(name) => {
                        if !self.groups.contains_key(name) {
                            return Err(CatalogueError::UnknownGroup {
                                owner: owner.to_string(),
                                name: name.clone(),
                            });
                        }
                    }
                }
                if let ListLength::FieldRef(count) = len {
                    check_count_field(owner, f, count, earlier)?;
                }
                Ok(())
            }
            FieldKind::Embedded(embed) => match &embed.target {
                Some(target) if !self.by_header.contains_key(target) => {
                    Err(CatalogueError::UnknownEmbeddedTarget {
                        owner: owner.to_string(),
                        field: f.name.clone(),
                        target: target.clone(),
                    })
                }
                _ => Ok(()),
            },
        }
    }

    /// Depth-first search over declared embedding targets.
    fn check_embedding_cycles(&self) -> Result<(), CatalogueError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn targets(p: &PacketDefinition) -> impl Iterator<Item = &str> {
            p.fields.iter().filter_map(|f| match f.kind.required() {
                FieldKind::Embedded(Embed { target: Some(t), .. }) => Some(t.as_str()),
                _ => None,
            })
        }

        fn visit(
            cat: &Catalogue,
            id: PacketId,
            marks: &mut [Mark],
            path: &mut Vec<String>,
        ) -> Result<(), CatalogueError> {
            let def = cat.definition(id);
            path.push(def.header.clone());
            marks[id.0] = Mark::Active;
            for target in targets(def) {
                let Some(next) = cat.lookup(target) else { continue };
                match marks[next.0] {
                    Mark::Active => {
                        path.push(target.to_string());
                        return Err(CatalogueError::EmbeddingCycle(path.join(" -> ")));
                    }
                    Mark::New => visit(cat, next, marks, path)?,
                    Mark::Done => {}
                }
            }
            marks[id.0] = Mark::Done;
            path.pop();
            Ok(())
        }

        let mut marks = vec![Mark::New; self.packets.len()];
        for i in 0..self.packets.len() {
            if marks[i] == Mark::New {
                visit(self, PacketId(i), &mut marks, &mut Vec::new())?;
            }
        }
        Ok(())
    }
}

fn check_enum(e: &EnumDefinition) -> Result<(), CatalogueError> {
    let mut names = HashSet::new();
    let mut ordinals = HashSet::new();
    for (member, ordinal) in &e.members {
        if !names.insert(member.as_str()) || !ordinals.insert(*ordinal) {
            return Err(CatalogueError::DuplicateEnumMember {
                name: e.name.clone(),
                member: member.clone(),
            });
        }
    }
    Ok(())
}

fn check_group(
    g: &GroupDefinition,
    enums: &HashMap<String, EnumDefinition>,
) -> Result<(), CatalogueError> {
    if g.fields.is_empty() {
        return Err(CatalogueError::EmptyGroup(g.name.clone()));
    }
    let mut seen = HashSet::new();
    for (i, f) in g.fields.iter().enumerate() {
        check_common(&g.name, i, f, &mut seen)?;
        match &f.kind {
            FieldKind::Scalar(_) => {}
            FieldKind::Enum(name) => require_enum(&g.name, name, enums)?,
            _ => {
                return Err(CatalogueError::InvalidGroupField {
                    group: g.name.clone(),
                    field: f.name.clone(),
                })
            }
        }
        check_constraint(&g.name, f, enums)?;
    }
    Ok(())
}

fn check_common<'a>(
    owner: &str,
    position: usize,
    f: &'a FieldDescriptor,
    seen: &mut HashSet<&'a str>,
) -> Result<(), CatalogueError> {
    if f.index != position {
        return Err(CatalogueError::NonDenseOrdinal {
            owner: owner.to_string(),
            field: f.name.clone(),
            expected: position,
            found: f.index,
        });
    }
    if !seen.insert(f.name.as_str()) {
        return Err(CatalogueError::DuplicateField {
            owner: owner.to_string(),
            field: f.name.clone(),
        });
    }
    Ok(())
}

fn require_enum(
    owner: &str,
    name: &str,
    enums: &HashMap<String, EnumDefinition>,
) -> Result<(), CatalogueError> {
    if enums.contains_key(name) {
        Ok(())
    } else {
        Err(CatalogueError::UnknownEnum {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

fn check_count_field(
    owner: &str,
    f: &FieldDescriptor,
    count: &str,
    earlier: &[FieldDescriptor],
) -> Result<(), CatalogueError> {
    let bad = |reason| CatalogueError::BadCountField {
        owner: owner.to_string(),
        field: f.name.clone(),
        count: count.to_string(),
        reason,
    };
    let Some(source) = earlier.iter().find(|e| e.name == count) else {
        return Err(if count == f.name {
            bad("a list cannot count itself")
        } else {
            bad("must name an earlier field")
        });
    };
    match source.kind.required() {
        FieldKind::Scalar(p) if p.is_integer() => Ok(()),
        _ => Err(bad("must be an integer scalar")),
    }
}

fn check_constraint(
    owner: &str,
    f: &FieldDescriptor,
    enums: &HashMap<String, EnumDefinition>,
) -> Result<(), CatalogueError> {
    let Some(constraint) = &f.constraint else {
        return Ok(());
    };
    let numeric = match f.kind.required() {
        FieldKind::Scalar(p) => p.is_numeric(),
        FieldKind::Enum(name) => enums.contains_key(name),
        FieldKind::List { item: ItemSpec::Primitive(p), .. } => p.is_numeric(),
        FieldKind::List { item: ItemSpec::Enum(_), .. } => true,
        _ => false,
    };
    if !numeric {
        return Err(CatalogueError::ConstraintOnNonNumeric {
            owner: owner.to_string(),
            field: f.name.clone(),
        });
    }
    if let Constraint::Range(intervals) = constraint {
        if let Some(&(min, max)) = intervals.iter().find(|(min, max)| min > max) {
            return Err(CatalogueError::InvalidRange {
                owner: owner.to_string(),
                field: f.name.clone(),
                min,
                max,
            });
        }
    }
    Ok(())
}

fn is_glueable(header: &str) -> bool {
    header.chars().all(|c| c.is_ascii_punctuation())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visual_type() -> EnumDefinition {
        EnumDefinition::new("VisualType").member("Player", 1).member("Npc", 2)
    }

    #[test]
    fn duplicate_header_is_fatal() {
        let schema = Schema::new()
            .with_packet(PacketDefinition::new("A", "walk"))
            .with_packet(PacketDefinition::new("B", "walk"));
        assert!(matches!(
            Catalogue::build(schema),
            Err(CatalogueError::DuplicateHeader(h)) if h == "walk"
        ));
    }

    #[test]
    fn required_after_optional_is_fatal() {
        let schema = Schema::new().with_packet(
            PacketDefinition::new("P", "p")
                .field("a", FieldKind::optional(FieldKind::Scalar(PrimitiveType::U8)))
                .field("b", FieldKind::Scalar(PrimitiveType::U8)),
        );
        assert!(matches!(
            Catalogue::build(schema),
            Err(CatalogueError::RequiredAfterOptional { .. })
        ));
    }

    #[test]
    fn trailing_optionals_are_allowed() {
        let schema = Schema::new().with_packet(
            PacketDefinition::new("P", "p")
                .field("a", FieldKind::Scalar(PrimitiveType::U8))
                .field("b", FieldKind::optional(FieldKind::Scalar(PrimitiveType::U8)))
                .field("c", FieldKind::optional(FieldKind::Text)),
        );
        assert!(Catalogue::build(schema).is_ok());
    }

    #[test]
    fn non_dense_ordinal_is_fatal() {
        let schema = Schema::new().with_packet(
            PacketDefinition::new("P", "p")
                .descriptor(FieldDescriptor::new(1, "a", FieldKind::Scalar(PrimitiveType::U8))),
        );
        assert!(matches!(
            Catalogue::build(schema),
            Err(CatalogueError::NonDenseOrdinal { expected: 0, found: 1, .. })
        ));
    }

    #[test]
    fn count_field_must_precede_list() {
        let schema = Schema::new().with_packet(
            PacketDefinition::new("P", "p")
                .field(
                    "items",
                    FieldKind::list(ItemSpec::Primitive(PrimitiveType::U8), ListLength::FieldRef("n".into())),
                )
                .field("n", FieldKind::Scalar(PrimitiveType::U8)),
        );
        assert!(matches!(
            Catalogue::build(schema),
            Err(CatalogueError::BadCountField { reason: "must name an earlier field", .. })
        ));
    }

    #[test]
    fn self_embedding_is_fatal() {
        let schema = Schema::new().with_packet(
            PacketDefinition::new("Loop", "loop").field("inner", FieldKind::Embedded(Embed::token().target("loop"))),
        );
        assert!(matches!(Catalogue::build(schema), Err(CatalogueError::EmbeddingCycle(p)) if p == "loop -> loop"));
    }

    #[test]
    fn indirect_embedding_cycle_is_fatal() {
        let schema = Schema::new()
            .with_packet(PacketDefinition::new("A", "a").field("x", FieldKind::Embedded(Embed::rest().target("b"))))
            .with_packet(PacketDefinition::new("B", "b").field("y", FieldKind::Embedded(Embed::token().target("a"))));
        assert!(matches!(Catalogue::build(schema), Err(CatalogueError::EmbeddingCycle(_))));
    }

    #[test]
    fn marker_lookup_requires_matching_separator() {
        let schema = Schema::new()
            .with_enum(visual_type())
            .with_packet(
                PacketDefinition::new("Fins", "#fins")
                    .separator('^')
                    .field("kind", FieldKind::Scalar(PrimitiveType::U8)),
            )
            .with_packet(PacketDefinition::new("Plain", "#plain"))
            .with_packet(PacketDefinition::new("Pipe", "#pipe").separator('|'));
        let cat = Catalogue::build(schema).unwrap();
        assert_eq!(cat.resolve_marker("#fins^1^2"), Some((cat.lookup("#fins").unwrap(), 5)));
        assert_eq!(cat.resolve_marker("#plain^1"), None);
        assert_eq!(cat.resolve_marker("#pipe^1"), None);
        assert!(cat.resolve_marker("#pipe|1").is_some());
    }

    #[test]
    fn glued_lookup_prefers_longest_punctuation_header() {
        let schema = Schema::new()
            .with_packet(PacketDefinition::new("Whisper", "/").field("m", FieldKind::Text))
            .with_packet(PacketDefinition::new("Group", "//").field("m", FieldKind::Text))
            .with_packet(PacketDefinition::new("Walk", "walk"));
        let cat = Catalogue::build(schema).unwrap();
        assert_eq!(cat.resolve_glued("/0Lucifer0"), Some((cat.lookup("/").unwrap(), 1)));
        assert_eq!(cat.resolve_glued("//hi"), Some((cat.lookup("//").unwrap(), 2)));
        assert_eq!(cat.resolve_glued("/"), None);
        assert_eq!(cat.resolve_glued("walk1"), None);
    }

    #[test]
    fn group_fields_must_be_scalar_or_enum() {
        let schema = Schema::new().with_group(GroupDefinition::new("G").field("t", FieldKind::Text));
        assert!(matches!(Catalogue::build(schema), Err(CatalogueError::InvalidGroupField { .. })));
    }

    #[test]
    fn constraint_on_string_is_fatal() {
        let schema = Schema::new().with_packet(PacketDefinition::new("P", "p").descriptor(
            FieldDescriptor::new(0, "name", FieldKind::Scalar(PrimitiveType::Str)).with_constraint(Constraint::range(0, 1)),
        ));
        assert!(matches!(Catalogue::build(schema), Err(CatalogueError::ConstraintOnNonNumeric { .. })));
    }
}
