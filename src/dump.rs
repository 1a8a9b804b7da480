//! Format decoded packets for display (dump text used by the CLI and in logs).

use crate::packet::{Packet, UnresolvedReason};
use crate::value::Value;

/// Multi-line dump of a packet: a header line, then one line per field.
pub fn dump_packet(packet: &Packet) -> String {
    let mut lines = Vec::new();
    write_packet(packet, 0, &mut lines);
    lines.join("\n")
}

fn write_packet(packet: &Packet, indent: usize, lines: &mut Vec<String>) {
    let pad = "  ".repeat(indent);
    let keep_alive = packet
        .keep_alive_id()
        .map(|id| format!(" #{}", id))
        .unwrap_or_default();
    match packet {
        Packet::Decoded(p) => {
            let status = match p.validation() {
                None => "",
                Some(v) if v.is_valid() => " valid",
                Some(_) => " INVALID",
            };
            lines.push(format!("{}{} {:?}{}{}", pad, p.name(), p.header(), keep_alive, status));
            for f in p.fields() {
                match &f.value {
                    None => lines.push(format!("{}  {}: <absent>", pad, f.name)),
                    Some(Value::Packet(inner)) => {
                        lines.push(format!("{}  {}:", pad, f.name));
                        write_packet(inner, indent + 2, lines);
                    }
                    Some(v) => lines.push(format!("{}  {}: {}", pad, f.name, format_value(v))),
                }
            }
            if let Some(v) = p.validation() {
                for failure in v.failures() {
                    lines.push(format!(
                        "{}  ! {} = {:?}: {}",
                        pad,
                        failure.field,
                        failure.raw,
                        failure.reason.as_deref().unwrap_or("rejected")
                    ));
                }
            }
        }
        Packet::Unresolved(u) => {
            let reason = match &u.reason {
                UnresolvedReason::UnknownHeader => "unknown header".to_string(),
                UnresolvedReason::Binding(e) => e.to_string(),
                UnresolvedReason::DepthExceeded => "nesting too deep".to_string(),
                UnresolvedReason::HeaderMismatch { expected } => format!("expected {:?}", expected),
            };
            lines.push(format!("{}? {:?}{} ({})", pad, u.header, keep_alive, reason));
            if !u.body.is_empty() {
                lines.push(format!("{}  body: {:?}", pad, u.body));
            }
        }
    }
}

/// One-line rendering of a value; enums show their member name when known.
pub fn format_value(v: &Value) -> String {
    match v {
        Value::Enum(e) => match &e.member {
            Some(name) => format!("{} ({})", name, e.ordinal),
            None => format!("<unknown> ({})", e.ordinal),
        },
        Value::Str(s) => format!("{:?}", s),
        Value::Group(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(name, v)| format!("{}: {}", name, format_value(v)))
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Packet(p) => format!("<{}>", p.header()),
        other => other.to_string(),
    }
}
