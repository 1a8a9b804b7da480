//! # packetline — schema-driven decoder for line-oriented game protocols
//!
//! Text packets arrive one per line: an optional numeric keep-alive id, a header
//! token, then fields separated by spaces (or a per-packet separator such as `^`).
//! A [`Catalogue`] maps headers to packet definitions; decoding a line binds its
//! tokens to typed [`Value`]s, checks declared constraints and returns a [`Packet`].
//! Lines that cannot be bound never error out: they come back as
//! [`Packet::Unresolved`] with the header, the untouched body and the reason.
//!
//! ## Catalogue DSL
//!
//! ```text
//! enum VisualType { Map = 0; Player = 1; Npc = 2; }
//!
//! group SitSub { visual_type: VisualType; visual_id: i64; }
//!
//! packet SitPacket "rest" {
//!   amount: u8;
//!   users: list<SitSub>[amount];
//! }
//!
//! packet FinsPacket "#fins" separator "^" {
//!   kind: FinsPacketType [in(1, 2)];
//!   character_id: i64;
//! }
//! ```
//!
//! Field types: `u8`..`i64`, `float`, `double`, `bool`, `string`, `guid`, `version`,
//! `text` (rest of line), enum names, `optional<T>`, `list<T>`, `list<T>[n]`,
//! `list<T>[count_field]`, and embedded packets `packet`, `packet<"hdr">`,
//! `packet<rest>`. Modifiers: `separator "c"`, `[a..b, c..d]`, `[in(..)]`, `strict`.
//!
//! ## Usage
//!
//! ```no_run
//! let catalogue = packetline::Catalogue::from_file("catalogues/sample.pkt")?;
//! let packet = catalogue.decode("12345 rest 2 1 5 1 4");
//! if let Some(p) = packet.as_decoded() {
//!     assert_eq!(p.get_as::<u8>("amount")?, 2);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod ast;
mod binder;
pub mod catalogue;
pub mod codec;
pub mod dump;
pub mod error;
pub mod packet;
pub mod parser;
pub mod tokenizer;
pub mod validate;
pub mod value;

pub use ast::Schema;
pub use catalogue::{build_catalogue, Catalogue, PacketId};
pub use codec::{decode, Decoder, DecoderConfig};
pub use dump::{dump_packet, format_value};
pub use error::{AccessError, BindError, CatalogueError};
pub use packet::{
    BoundField, DecodedPacket, FromPacket, FromValue, Packet, UnresolvedPacket, UnresolvedReason,
};
pub use parser::parse;
pub use validate::{FieldOutcome, ValidationResult};
pub use value::{EnumValue, Value, Version};
