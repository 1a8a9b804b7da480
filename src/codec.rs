//! Line decoder: segments a line, binds its fields and validates the result.
//!
//! Decoding is total. Every input line yields a [`Packet`]; anything that cannot be
//! bound to a definition becomes [`Packet::Unresolved`] with the reason attached.

use crate::binder::Binder;
use crate::catalogue::Catalogue;
use crate::packet::{DecodedPacket, Packet, UnresolvedPacket, UnresolvedReason};
use crate::tokenizer::segment;
use crate::validate::validate;
use tracing::{debug, trace};

/// Per-decoder knobs. The catalogue itself carries no runtime options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Maximum nesting of embedded packets. The top-level line is depth 0.
    pub max_depth: usize,
    /// Treat a leading number followed by another token as a keep-alive id.
    pub detect_keep_alive: bool,
    /// Drop a trailing `\n` / `\r\n` before segmenting.
    pub strip_line_endings: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            max_depth: 4,
            detect_keep_alive: true,
            strip_line_endings: true,
        }
    }
}

impl DecoderConfig {
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn detect_keep_alive(mut self, on: bool) -> Self {
        self.detect_keep_alive = on;
        self
    }

    pub fn strip_line_endings(mut self, on: bool) -> Self {
        self.strip_line_endings = on;
        self
    }
}

/// Borrowing decoder over a shared catalogue. Cheap to create; holds no mutable state,
/// so one catalogue can serve many decoders on many threads.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'c> {
    catalogue: &'c Catalogue,
    config: DecoderConfig,
}

impl<'c> Decoder<'c> {
    pub fn new(catalogue: &'c Catalogue) -> Self {
        Self::with_config(catalogue, DecoderConfig::default())
    }

    pub fn with_config(catalogue: &'c Catalogue, config: DecoderConfig) -> Self {
        Decoder { catalogue, config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn catalogue(&self) -> &'c Catalogue {
        self.catalogue
    }

    /// Decode one raw line.
    pub fn decode(&self, line: &str) -> Packet {
        let line = if self.config.strip_line_endings {
            line.strip_suffix('\n')
                .map(|l| l.strip_suffix('\r').unwrap_or(l))
                .unwrap_or(line)
        } else {
            line
        };
        self.decode_at(line, 0, self.config.detect_keep_alive)
    }

    /// Decode every line of `input`, one packet per line.
    pub fn decode_all<'a>(&'a self, input: &'a str) -> impl Iterator<Item = Packet> + 'a {
        input.lines().map(move |line| self.decode(line))
    }

    pub(crate) fn decode_at(&self, line: &str, depth: usize, detect_keep_alive: bool) -> Packet {
        let seg = segment(self.catalogue, line, detect_keep_alive);
        let Some(id) = seg.definition else {
            debug!(header = seg.header, depth, "unknown header");
            return Packet::Unresolved(UnresolvedPacket {
                header: seg.header.to_string(),
                body: seg.body.unwrap_or("").to_string(),
                keep_alive_id: seg.keep_alive_id,
                reason: UnresolvedReason::UnknownHeader,
            });
        };

        let def = self.catalogue.definition(id);
        let mut tokens = seg.tokens(def.top_separator());
        let fields = match Binder::new(self, depth).bind_fields(def, &mut tokens) {
            Ok(fields) => fields,
            Err(e) => {
                debug!(header = seg.header, depth, error = %e, "binding failed");
                return Packet::Unresolved(UnresolvedPacket {
                    header: seg.header.to_string(),
                    body: seg.body.unwrap_or("").to_string(),
                    keep_alive_id: seg.keep_alive_id,
                    reason: UnresolvedReason::Binding(e),
                });
            }
        };

        let validation = validate(self.catalogue, def, &fields);
        trace!(
            header = seg.header,
            depth,
            fields = fields.len(),
            valid = validation.as_ref().map_or(true, |v| v.is_valid()),
            "decoded"
        );
        Packet::Decoded(DecodedPacket {
            id,
            name: def.name.clone(),
            header: def.header.clone(),
            keep_alive_id: seg.keep_alive_id,
            fields,
            validation,
        })
    }
}

/// Decode one line against `catalogue` with the default configuration.
pub fn decode(catalogue: &Catalogue, line: &str) -> Packet {
    Decoder::new(catalogue).decode(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn walk_catalogue() -> Catalogue {
        Catalogue::build(
            Schema::new().with_packet(
                PacketDefinition::new("Walk", "walk")
                    .field("x", FieldKind::Scalar(PrimitiveType::I16))
                    .field("y", FieldKind::Scalar(PrimitiveType::I16)),
            ),
        )
        .unwrap()
    }

    #[test]
    fn strips_crlf() {
        let cat = walk_catalogue();
        let p = decode(&cat, "walk 3 4\r\n");
        assert_eq!(p.as_decoded().unwrap().get_as::<i16>("y"), Ok(4));
    }

    #[test]
    fn keeps_line_endings_when_asked() {
        let cat = walk_catalogue();
        let dec = Decoder::with_config(&cat, DecoderConfig::default().strip_line_endings(false));
        assert!(!dec.decode("walk 3 4\r\n").is_decoded());
    }

    #[test]
    fn binding_failure_keeps_body() {
        let cat = walk_catalogue();
        let p = decode(&cat, "7 walk 3 north");
        let u = p.as_unresolved().unwrap();
        assert_eq!(u.header, "walk");
        assert_eq!(u.body, "3 north");
        assert_eq!(u.keep_alive_id, Some(7));
        assert!(matches!(u.reason, UnresolvedReason::Binding(_)));
    }

    #[test]
    fn decode_all_yields_one_packet_per_line() {
        let cat = walk_catalogue();
        let dec = Decoder::new(&cat);
        let packets: Vec<_> = dec.decode_all("walk 1 1\nnope\r\nwalk 2 2").collect();
        assert_eq!(packets.len(), 3);
        assert!(packets[0].is_decoded());
        assert!(!packets[1].is_decoded());
        assert_eq!(packets[1].header(), "nope");
    }
}
