//! Field binder: turns tokens into typed values, one field descriptor at a time.

use crate::ast::*;
use crate::codec::Decoder;
use crate::error::BindError;
use crate::packet::{BoundField, Packet, UnresolvedPacket, UnresolvedReason};
use crate::tokenizer::{split_head, Tokens};
use crate::value::{EnumValue, Value, Version};
use tracing::warn;
use uuid::Uuid;

/// Upper bound on pre-allocated list capacity; counts come from untrusted input.
const MAX_PREALLOCATED_ITEMS: usize = 64;

pub(crate) struct Binder<'d, 'c> {
    decoder: &'d Decoder<'c>,
    depth: usize,
}

impl<'d, 'c> Binder<'d, 'c> {
    pub(crate) fn new(decoder: &'d Decoder<'c>, depth: usize) -> Self {
        Binder { decoder, depth }
    }

    /// Bind every field of `def` in order. The first failure aborts the packet.
    pub(crate) fn bind_fields(
        &self,
        def: &PacketDefinition,
        tokens: &mut Tokens<'_>,
    ) -> Result<Vec<BoundField>, BindError> {
        let mut bound = Vec::with_capacity(def.fields.len());
        for f in &def.fields {
            let field = self.bind_field(f, tokens, &bound)?;
            bound.push(field);
        }
        Ok(bound)
    }

    fn bind_field(
        &self,
        f: &FieldDescriptor,
        tokens: &mut Tokens<'_>,
        bound: &[BoundField],
    ) -> Result<BoundField, BindError> {
        let start = tokens.offset();
        let value = match &f.kind {
            FieldKind::Optional(inner) => {
                // a list's own separator splits items inside its token
                let sep = match inner.as_ref() {
                    FieldKind::List { .. } => tokens.separator(),
                    _ => f.separator.unwrap_or(tokens.separator()),
                };
                if tokens.is_exhausted() || (!inner.is_text() && tokens.peek_until(sep) == Some("")) {
                    tokens.next_until(sep);
                    None
                } else {
                    match self.bind_kind(f, inner, tokens, bound) {
                        Ok(v) => Some(v),
                        Err(e) if absent_on(inner, &e) => None,
                        Err(e) => return Err(e),
                    }
                }
            }
            kind => Some(self.bind_kind(f, kind, tokens, bound)?),
        };
        Ok(BoundField {
            index: f.index,
            name: f.name.clone(),
            value,
            raw: tokens.consumed_since(start).to_string(),
        })
    }

    fn bind_kind(
        &self,
        f: &FieldDescriptor,
        kind: &FieldKind,
        tokens: &mut Tokens<'_>,
        bound: &[BoundField],
    ) -> Result<Value, BindError> {
        match kind {
            FieldKind::Scalar(p) => {
                let sep = f.separator.unwrap_or(tokens.separator());
                let token = tokens.next_until(sep).ok_or_else(|| missing(f))?;
                parse_primitive(f, *p, token)
            }
            FieldKind::Enum(name) => {
                let sep = f.separator.unwrap_or(tokens.separator());
                let token = tokens.next_until(sep).ok_or_else(|| missing(f))?;
                self.bind_enum(f, name, token)
            }
            FieldKind::Optional(inner) => self.bind_kind(f, inner, tokens, bound),
            FieldKind::Text => Ok(Value::Str(tokens.take_rest().unwrap_or("").to_string())),
            FieldKind::Embedded(embed) => {
                let sep = f.separator.unwrap_or(tokens.separator());
                let slice = match embed.span {
                    EmbedSpan::Token => tokens.next_until(sep),
                    EmbedSpan::Rest => tokens.take_rest(),
                }
                .ok_or_else(|| missing(f))?;
                Ok(Value::Packet(Box::new(self.bind_embedded(slice, embed))))
            }
            FieldKind::List { item, len } => {
                let count = match len {
                    ListLength::FieldRef(name) => Some(count_from(f, name, bound)?),
                    ListLength::Constant(n) => Some(*n),
                    ListLength::Remaining => None,
                };
                let items = match f.separator {
                    Some(item_sep) => match tokens.next_token() {
                        Some(token) => {
                            let body = if token.is_empty() { None } else { Some(token) };
                            self.bind_items(f, item, count, &mut Tokens::new(body, item_sep))?
                        }
                        None if count.unwrap_or(0) == 0 => Vec::new(),
                        None => return Err(missing(f)),
                    },
                    None => self.bind_items(f, item, count, tokens)?,
                };
                Ok(Value::List(items))
            }
        }
    }

    fn bind_items(
        &self,
        f: &FieldDescriptor,
        item: &ItemSpec,
        count: Option<usize>,
        stream: &mut Tokens<'_>,
    ) -> Result<Vec<Value>, BindError> {
        match count {
            Some(n) => {
                let mut items = Vec::with_capacity(n.min(MAX_PREALLOCATED_ITEMS));
                for found in 0..n {
                    let v = self.bind_item(f, item, stream).map_err(|e| match e {
                        BindError::MissingToken { .. } => BindError::InsufficientItems {
                            field: f.name.clone(),
                            expected: n,
                            found,
                        },
                        other => other,
                    })?;
                    items.push(v);
                }
                Ok(items)
            }
            None => {
                let mut items = Vec::new();
                while !stream.is_exhausted() {
                    items.push(self.bind_item(f, item, stream)?);
                }
                Ok(items)
            }
        }
    }

    fn bind_item(
        &self,
        f: &FieldDescriptor,
        item: &ItemSpec,
        stream: &mut Tokens<'_>,
    ) -> Result<Value, BindError> {
        match item {
            ItemSpec::Primitive(p) => {
                let token = stream.next_token().ok_or_else(|| missing(f))?;
                parse_primitive(f, *p, token)
            }
            ItemSpec::Enum(name) => {
                let token = stream.next_token().ok_or_else(|| missing(f))?;
                self.bind_enum(f, name, token)
            }
            ItemSpec::Group(name) => {
                let group = self.decoder.catalogue().group(name).ok_or_else(|| missing(f))?;
                match group.separator {
                    Some(sep) => {
                        let token = stream.next_token().ok_or_else(|| missing(f))?;
                        self.bind_group(group, &mut Tokens::new(Some(token), sep))
                    }
                    None => self.bind_group(group, stream),
                }
            }
        }
    }

    fn bind_group(&self, group: &GroupDefinition, stream: &mut Tokens<'_>) -> Result<Value, BindError> {
        let mut fields = Vec::with_capacity(group.width());
        for gf in &group.fields {
            let v = self.bind_kind(gf, &gf.kind, stream, &[])?;
            fields.push((gf.name.clone(), v));
        }
        Ok(Value::Group(fields))
    }

    fn bind_enum(&self, f: &FieldDescriptor, name: &str, token: &str) -> Result<Value, BindError> {
        let ordinal: i64 = parse_number(token).ok_or_else(|| invalid(f, token, "enum ordinal"))?;
        let member = self
            .decoder
            .catalogue()
            .enum_def(name)
            .and_then(|e| e.member_name(ordinal))
            .map(str::to_string);
        if member.is_none() && f.strict {
            return Err(BindError::EnumOutOfRange {
                field: f.name.clone(),
                enum_name: name.to_string(),
                ordinal,
            });
        }
        Ok(Value::Enum(EnumValue { ordinal, member }))
    }

    /// Decode an inline command with a fresh tokenizer pass.
    fn bind_embedded(&self, slice: &str, embed: &Embed) -> Packet {
        if self.depth + 1 > self.decoder.config().max_depth {
            warn!(depth = self.depth + 1, "embedded packet exceeds nesting limit");
            return unresolved_from(slice, UnresolvedReason::DepthExceeded);
        }
        let packet = self.decoder.decode_at(slice, self.depth + 1, false);
        match &embed.target {
            Some(target) if packet.header() != target => unresolved_from(
                slice,
                UnresolvedReason::HeaderMismatch { expected: target.clone() },
            ),
            _ => packet,
        }
    }
}

fn unresolved_from(slice: &str, reason: UnresolvedReason) -> Packet {
    let head = split_head(slice, false);
    Packet::Unresolved(UnresolvedPacket {
        header: head.header.to_string(),
        body: head.rest.unwrap_or("").to_string(),
        keep_alive_id: None,
        reason,
    })
}

/// Failures that leave an optional field absent instead of failing the packet.
fn absent_on(kind: &FieldKind, e: &BindError) -> bool {
    match e {
        BindError::MissingToken { .. } => true,
        BindError::InvalidToken { .. } => matches!(kind, FieldKind::Scalar(_) | FieldKind::Enum(_)),
        _ => false,
    }
}

fn count_from(f: &FieldDescriptor, count_field: &str, bound: &[BoundField]) -> Result<usize, BindError> {
    let count = bound
        .iter()
        .find(|b| b.name == count_field)
        .and_then(|b| b.value.as_ref())
        .and_then(Value::as_i64)
        .ok_or_else(|| BindError::MissingCount {
            field: f.name.clone(),
            count_field: count_field.to_string(),
        })?;
    usize::try_from(count).map_err(|_| BindError::NegativeCount { field: f.name.clone(), count })
}

fn missing(f: &FieldDescriptor) -> BindError {
    BindError::MissingToken { field: f.name.clone() }
}

fn invalid(f: &FieldDescriptor, raw: &str, expected: &'static str) -> BindError {
    BindError::InvalidToken {
        field: f.name.clone(),
        raw: raw.to_string(),
        expected,
    }
}

fn parse_primitive(f: &FieldDescriptor, p: PrimitiveType, token: &str) -> Result<Value, BindError> {
    let err = || invalid(f, token, p.name());
    if p.is_numeric() && token.starts_with('+') {
        return Err(err());
    }
    Ok(match p {
        PrimitiveType::U8 => Value::U8(token.parse().map_err(|_| err())?),
        PrimitiveType::U16 => Value::U16(token.parse().map_err(|_| err())?),
        PrimitiveType::U32 => Value::U32(token.parse().map_err(|_| err())?),
        PrimitiveType::U64 => Value::U64(token.parse().map_err(|_| err())?),
        PrimitiveType::I8 => Value::I8(token.parse().map_err(|_| err())?),
        PrimitiveType::I16 => Value::I16(token.parse().map_err(|_| err())?),
        PrimitiveType::I32 => Value::I32(token.parse().map_err(|_| err())?),
        PrimitiveType::I64 => Value::I64(token.parse().map_err(|_| err())?),
        PrimitiveType::Float => Value::Float(token.parse().map_err(|_| err())?),
        PrimitiveType::Double => Value::Double(token.parse().map_err(|_| err())?),
        PrimitiveType::Bool => Value::Bool(parse_bool(token).ok_or_else(err)?),
        PrimitiveType::Str => Value::Str(token.to_string()),
        PrimitiveType::Guid => Value::Guid(Uuid::parse_str(token).map_err(|_| err())?),
        PrimitiveType::Version => Value::Version(token.parse::<Version>().map_err(|_| err())?),
    })
}

/// Numbers on the wire carry no explicit `+` sign.
fn parse_number<T: std::str::FromStr>(token: &str) -> Option<T> {
    if token.starts_with('+') {
        None
    } else {
        token.parse().ok()
    }
}

fn parse_bool(token: &str) -> Option<bool> {
    match token {
        "1" | "true" | "True" => Some(true),
        "0" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::Catalogue;

    fn catalogue() -> Catalogue {
        Catalogue::build(
            Schema::new()
                .with_packet(
                    PacketDefinition::new("Opt", "opt")
                        .field("a", FieldKind::Scalar(PrimitiveType::U8))
                        .field("b", FieldKind::optional(FieldKind::Scalar(PrimitiveType::U8)))
                        .field("c", FieldKind::optional(FieldKind::Scalar(PrimitiveType::U8))),
                )
                .with_packet(
                    PacketDefinition::new("Icons", "icons")
                        .field("n", FieldKind::Scalar(PrimitiveType::U8))
                        .descriptor(
                            FieldDescriptor::new(
                                1,
                                "flags",
                                FieldKind::list(ItemSpec::Primitive(PrimitiveType::Bool), ListLength::FieldRef("n".into())),
                            )
                            .with_separator('|'),
                        ),
                ),
        )
        .unwrap()
    }

    fn bind(cat: &Catalogue, header: &str, body: &str) -> Result<Vec<BoundField>, BindError> {
        let decoder = Decoder::new(cat);
        let def = cat.get(header).unwrap();
        Binder::new(&decoder, 0).bind_fields(def, &mut Tokens::new(Some(body), ' '))
    }

    #[test]
    fn empty_optional_token_is_absent_and_consumed() {
        let cat = catalogue();
        let fields = bind(&cat, "opt", "1  7").unwrap();
        assert_eq!(fields[1].value, None);
        assert_eq!(fields[2].value, Some(Value::U8(7)));
    }

    #[test]
    fn empty_required_token_is_invalid() {
        let cat = catalogue();
        assert_eq!(bind(&cat, "opt", ""), Err(BindError::InvalidToken {
            field: "a".into(),
            raw: String::new(),
            expected: "u8",
        }));
    }

    #[test]
    fn counted_list_inside_one_token() {
        let cat = catalogue();
        let fields = bind(&cat, "icons", "3 1|0|1").unwrap();
        assert_eq!(
            fields[1].value,
            Some(Value::List(vec![Value::Bool(true), Value::Bool(false), Value::Bool(true)]))
        );
        assert_eq!(fields[1].raw, "1|0|1");
    }

    #[test]
    fn counted_list_with_too_few_items() {
        let cat = catalogue();
        assert_eq!(
            bind(&cat, "icons", "3 1|0"),
            Err(BindError::InsufficientItems { field: "flags".into(), expected: 3, found: 2 })
        );
    }

    #[test]
    fn zero_count_list_needs_no_token() {
        let cat = catalogue();
        let fields = bind(&cat, "icons", "0").unwrap();
        assert_eq!(fields[1].value, Some(Value::List(Vec::new())));
    }

    #[test]
    fn bool_spellings() {
        let f = FieldDescriptor::new(0, "b", FieldKind::Scalar(PrimitiveType::Bool));
        assert_eq!(parse_primitive(&f, PrimitiveType::Bool, "True"), Ok(Value::Bool(true)));
        assert_eq!(parse_primitive(&f, PrimitiveType::Bool, "0"), Ok(Value::Bool(false)));
        assert!(parse_primitive(&f, PrimitiveType::Bool, "2").is_err());
    }

    #[test]
    fn explicit_plus_sign_is_rejected() {
        let f = FieldDescriptor::new(0, "n", FieldKind::Scalar(PrimitiveType::I32));
        assert!(parse_primitive(&f, PrimitiveType::I32, "+5").is_err());
        assert!(parse_primitive(&f, PrimitiveType::U8, "+5").is_err());
        assert!(parse_primitive(&f, PrimitiveType::Double, "+1.5").is_err());
        assert_eq!(parse_primitive(&f, PrimitiveType::I32, "-5"), Ok(Value::I32(-5)));

        let cat = catalogue();
        assert!(bind(&cat, "opt", "+5").is_err());
    }
}
