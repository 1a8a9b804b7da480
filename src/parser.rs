//! Parse catalogue DSL source into a [`Schema`] using PEST.

use crate::ast::*;
use crate::error::CatalogueError;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::collections::HashSet;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct CatalogueParser;

/// Names declared at top level, needed to tell enum references from group references.
struct Names {
    enums: HashSet<String>,
    groups: HashSet<String>,
}

/// Parse catalogue source into a schema. Structural checks happen later, in
/// [`Catalogue::build`](crate::Catalogue::build).
pub fn parse(source: &str) -> Result<Schema, CatalogueError> {
    let pairs = CatalogueParser::parse(Rule::schema, source)
        .map_err(|e| CatalogueError::Syntax(e.to_string()))?;
    let root = pairs
        .into_iter()
        .next()
        .ok_or_else(|| CatalogueError::Syntax("empty parse".to_string()))?;

    let items: Vec<Pair<Rule>> = root.into_inner().collect();
    let mut names = Names { enums: HashSet::new(), groups: HashSet::new() };
    for item in &items {
        let name = || first_ident(item.clone());
        match item.as_rule() {
            Rule::enum_def => {
                names.enums.insert(name()?);
            }
            Rule::group_def => {
                names.groups.insert(name()?);
            }
            _ => {}
        }
    }

    let mut schema = Schema::new();
    for item in items {
        match item.as_rule() {
            Rule::enum_def => schema.enums.push(build_enum(item)?),
            Rule::group_def => schema.groups.push(build_group(item, &names)?),
            Rule::packet_def => schema.packets.push(build_packet(item, &names)?),
            _ => {}
        }
    }
    Ok(schema)
}

fn first_ident(pair: Pair<Rule>) -> Result<String, CatalogueError> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::ident)
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| CatalogueError::Syntax("missing name".to_string()))
}

fn build_enum(pair: Pair<Rule>) -> Result<EnumDefinition, CatalogueError> {
    let mut def: Option<EnumDefinition> = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => def = Some(EnumDefinition::new(inner.as_str())),
            Rule::enum_member => {
                let at = location(&inner);
                let mut it = inner.into_inner();
                let name = it.next().ok_or_else(|| syntax(&at, "enum member: name"))?;
                let value = it.next().ok_or_else(|| syntax(&at, "enum member: value"))?;
                let ordinal = parse_int(&value)?;
                let e = def.take().ok_or_else(|| syntax(&at, "enum member before name"))?;
                def = Some(e.member(name.as_str(), ordinal));
            }
            _ => {}
        }
    }
    def.ok_or_else(|| CatalogueError::Syntax("enum: missing name".to_string()))
}

fn build_group(pair: Pair<Rule>, names: &Names) -> Result<GroupDefinition, CatalogueError> {
    let mut def: Option<GroupDefinition> = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => def = Some(GroupDefinition::new(inner.as_str())),
            Rule::separator_mod => {
                let sep = separator_char(inner)?;
                def = def.map(|g| g.separator(sep));
            }
            Rule::field => {
                let Some(g) = def.as_mut() else { continue };
                let field = build_field(inner, g.fields.len(), &g.name, names)?;
                g.fields.push(field);
            }
            _ => {}
        }
    }
    def.ok_or_else(|| CatalogueError::Syntax("group: missing name".to_string()))
}

fn build_packet(pair: Pair<Rule>, names: &Names) -> Result<PacketDefinition, CatalogueError> {
    let at = location(&pair);
    let mut name = None;
    let mut def: Option<PacketDefinition> = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::string => {
                let header = unescape(inner)?;
                if header.is_empty() || header.contains(DEFAULT_SEPARATOR) {
                    return Err(syntax(&at, &format!("invalid header {:?}", header)));
                }
                let name = name.take().ok_or_else(|| syntax(&at, "packet: missing name"))?;
                def = Some(PacketDefinition::new(name, header));
            }
            Rule::separator_mod => {
                let sep = separator_char(inner)?;
                def = def.map(|p| p.separator(sep));
            }
            Rule::field => {
                let Some(p) = def.as_mut() else { continue };
                let field = build_field(inner, p.fields.len(), &p.header, names)?;
                p.fields.push(field);
            }
            _ => {}
        }
    }
    def.ok_or_else(|| syntax(&at, "packet: missing header"))
}

fn build_field(
    pair: Pair<Rule>,
    index: usize,
    owner: &str,
    names: &Names,
) -> Result<FieldDescriptor, CatalogueError> {
    let at = location(&pair);
    let mut it = pair.into_inner();
    let name = it.next().ok_or_else(|| syntax(&at, "field: name"))?.as_str().to_string();
    let type_pair = it.next().ok_or_else(|| syntax(&at, "field: type"))?;
    let kind = build_type(type_pair, names, owner, &name)?;
    let mut field = FieldDescriptor::new(index, name, kind);
    for modifier in it {
        match modifier.as_rule() {
            Rule::separator_mod => field = field.with_separator(separator_char(modifier)?),
            Rule::strict_mod => field = field.strict(),
            Rule::constraint => field = field.with_constraint(build_constraint(modifier)?),
            _ => {}
        }
    }
    Ok(field)
}

fn build_type(
    pair: Pair<Rule>,
    names: &Names,
    owner: &str,
    field: &str,
) -> Result<FieldKind, CatalogueError> {
    let at = location(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| syntax(&at, "empty type"))?;
    match inner.as_rule() {
        Rule::base_type => Ok(FieldKind::Scalar(parse_base_type(inner.as_str(), &at)?)),
        Rule::text_type => Ok(FieldKind::Text),
        Rule::named_type => {
            let name = inner.as_str();
            if names.enums.contains(name) {
                Ok(FieldKind::Enum(name.to_string()))
            } else if names.groups.contains(name) {
                Err(syntax(
                    &at,
                    &format!("{}.{}: group {} can only be used as a list item", owner, field, name),
                ))
            } else {
                Err(syntax(&at, &format!("{}.{}: unknown type {}", owner, field, name)))
            }
        }
        Rule::optional_type => {
            let wrapped = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::type_spec)
                .ok_or_else(|| syntax(&at, "optional: missing type"))?;
            Ok(FieldKind::optional(build_type(wrapped, names, owner, field)?))
        }
        Rule::list_type => {
            let mut item = None;
            let mut len = ListLength::Remaining;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::item_type => item = Some(build_item(part, names, owner, field)?),
                    Rule::list_len => {
                        let n = part.into_inner().next().ok_or_else(|| syntax(&at, "list length"))?;
                        len = match n.as_rule() {
                            Rule::uint => ListLength::Constant(
                                n.as_str()
                                    .parse()
                                    .map_err(|_| syntax(&at, "list length out of range"))?,
                            ),
                            _ => ListLength::FieldRef(n.as_str().to_string()),
                        };
                    }
                    _ => {}
                }
            }
            let item = item.ok_or_else(|| syntax(&at, "list: missing item type"))?;
            Ok(FieldKind::list(item, len))
        }
        Rule::packet_type => {
            let mut embed = Embed::token();
            if let Some(args) = inner.into_inner().find(|p| p.as_rule() == Rule::embed_args) {
                for arg in args.into_inner() {
                    match arg.as_rule() {
                        Rule::string => embed = embed.target(unescape(arg)?),
                        Rule::rest_kw => embed.span = EmbedSpan::Rest,
                        _ => {}
                    }
                }
            }
            Ok(FieldKind::Embedded(embed))
        }
        other => Err(syntax(&at, &format!("unexpected type rule {:?}", other))),
    }
}

fn build_item(pair: Pair<Rule>, names: &Names, owner: &str, field: &str) -> Result<ItemSpec, CatalogueError> {
    let at = location(&pair);
    let inner = pair.into_inner().next().ok_or_else(|| syntax(&at, "list item"))?;
    match inner.as_rule() {
        Rule::base_type => Ok(ItemSpec::Primitive(parse_base_type(inner.as_str(), &at)?)),
        _ => {
            let name = inner.as_str();
            if names.enums.contains(name) {
                Ok(ItemSpec::Enum(name.to_string()))
            } else if names.groups.contains(name) {
                Ok(ItemSpec::Group(name.to_string()))
            } else {
                Err(syntax(&at, &format!("{}.{}: unknown type {}", owner, field, name)))
            }
        }
    }
}

fn build_constraint(pair: Pair<Rule>) -> Result<Constraint, CatalogueError> {
    let mut intervals = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::interval => {
                let at = location(&inner);
                let mut it = inner.into_inner();
                let min = parse_int(&it.next().ok_or_else(|| syntax(&at, "range: min"))?)?;
                let max = parse_int(&it.next().ok_or_else(|| syntax(&at, "range: max"))?)?;
                intervals.push((min, max));
            }
            Rule::one_of => {
                let values = inner
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::int)
                    .map(|p| parse_int(&p))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Constraint::OneOf(values));
            }
            _ => {}
        }
    }
    Ok(Constraint::Range(intervals))
}

fn separator_char(pair: Pair<Rule>) -> Result<char, CatalogueError> {
    let at = location(&pair);
    let s = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::string)
        .ok_or_else(|| syntax(&at, "separator: missing string"))?;
    let value = unescape(s)?;
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(syntax(&at, &format!("separator must be one character, got {:?}", value))),
    }
}

fn parse_base_type(s: &str, at: &str) -> Result<PrimitiveType, CatalogueError> {
    Ok(match s {
        "u8" => PrimitiveType::U8,
        "u16" => PrimitiveType::U16,
        "u32" => PrimitiveType::U32,
        "u64" => PrimitiveType::U64,
        "i8" => PrimitiveType::I8,
        "i16" => PrimitiveType::I16,
        "i32" => PrimitiveType::I32,
        "i64" => PrimitiveType::I64,
        "float" => PrimitiveType::Float,
        "double" => PrimitiveType::Double,
        "bool" => PrimitiveType::Bool,
        "string" => PrimitiveType::Str,
        "guid" => PrimitiveType::Guid,
        "version" => PrimitiveType::Version,
        _ => return Err(syntax(at, &format!("unknown base type {}", s))),
    })
}

fn parse_int(pair: &Pair<Rule>) -> Result<i64, CatalogueError> {
    pair.as_str()
        .parse()
        .map_err(|_| syntax(&location(pair), &format!("integer out of range: {}", pair.as_str())))
}

/// Content of a string literal with `\t \n \v \" \\` resolved.
fn unescape(pair: Pair<Rule>) -> Result<String, CatalogueError> {
    let at = location(&pair);
    let raw = pair
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or("");
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('v') => out.push('\u{b}'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            other => {
                return Err(syntax(&at, &format!("unknown escape \\{}", other.unwrap_or(' '))));
            }
        }
    }
    Ok(out)
}

fn location(pair: &Pair<Rule>) -> String {
    let (line, col) = pair.as_span().start_pos().line_col();
    format!("{}:{}", line, col)
}

fn syntax(at: &str, msg: &str) -> CatalogueError {
    CatalogueError::Syntax(format!("{}: {}", at, msg))
}
