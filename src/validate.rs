//! Validation engine: checks declared constraints and enum membership after
//! binding. Failures are recorded, never raised.

use crate::ast::*;
use crate::catalogue::Catalogue;
use crate::packet::BoundField;
use crate::value::Value;

/// Outcome for one constrained value. `field` is a path such as `users[1].visual_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutcome {
    pub field: String,
    pub passed: bool,
    /// Offending (or accepted) value as it appeared on the wire.
    pub raw: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    outcomes: Vec<FieldOutcome>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn outcomes(&self) -> &[FieldOutcome] {
        &self.outcomes
    }

    pub fn failures(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    /// First outcome recorded for `field`.
    pub fn outcome(&self, field: &str) -> Option<&FieldOutcome> {
        self.outcomes.iter().find(|o| o.field == field)
    }
}

/// Validate bound fields against `def`. `None` when no field carries a constraint
/// and no embedded packet reported outcomes. Outcomes of embedded packets are
/// lifted under the embedding field's name (`no_packet.type`).
pub fn validate(catalogue: &Catalogue, def: &PacketDefinition, fields: &[BoundField]) -> Option<ValidationResult> {
    let constrained = def.fields.iter().any(|f| is_constrained(catalogue, f));
    let mut outcomes = Vec::new();
    for (desc, bound) in def.fields.iter().zip(fields) {
        let Some(value) = &bound.value else { continue };
        match value {
            Value::Packet(inner) => {
                let nested = inner.as_decoded().and_then(|p| p.validation());
                for o in nested.into_iter().flat_map(ValidationResult::outcomes) {
                    outcomes.push(FieldOutcome {
                        field: format!("{}.{}", desc.name, o.field),
                        ..o.clone()
                    });
                }
            }
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    let path = format!("{}[{}]", desc.name, i);
                    check_item(catalogue, desc, &path, item, &mut outcomes);
                }
            }
            other => check_value(desc, &desc.name, other, &bound.raw, &mut outcomes),
        }
    }
    if !constrained && outcomes.is_empty() {
        return None;
    }
    Some(ValidationResult { outcomes })
}

fn is_constrained(catalogue: &Catalogue, f: &FieldDescriptor) -> bool {
    if f.constraint.is_some() {
        return true;
    }
    match f.kind.required() {
        FieldKind::Enum(_) => true,
        FieldKind::List { item: ItemSpec::Enum(_), .. } => true,
        FieldKind::List { item: ItemSpec::Group(name), .. } => catalogue
            .group(name)
            .is_some_and(|g| g.fields.iter().any(|gf| is_constrained(catalogue, gf))),
        _ => false,
    }
}

fn check_item(catalogue: &Catalogue, desc: &FieldDescriptor, path: &str, item: &Value, out: &mut Vec<FieldOutcome>) {
    let group = match desc.kind.required() {
        FieldKind::List { item: ItemSpec::Group(name), .. } => catalogue.group(name),
        _ => None,
    };
    match (item, group) {
        (Value::Group(values), Some(group)) => {
            for (gf, (name, v)) in group.fields.iter().zip(values) {
                let sub = format!("{}.{}", path, name);
                check_value(gf, &sub, v, &v.to_string(), out);
            }
        }
        (other, _) => check_value(desc, path, other, &other.to_string(), out),
    }
}

fn check_value(desc: &FieldDescriptor, path: &str, value: &Value, raw: &str, out: &mut Vec<FieldOutcome>) {
    if let Value::Enum(e) = value {
        out.push(FieldOutcome {
            field: path.to_string(),
            passed: e.is_known(),
            raw: raw.to_string(),
            reason: (!e.is_known()).then(|| format!("{} is not a declared member", e.ordinal)),
        });
    }
    if let Some(constraint) = &desc.constraint {
        let passed = admits(constraint, value);
        out.push(FieldOutcome {
            field: path.to_string(),
            passed,
            raw: raw.to_string(),
            reason: (!passed).then(|| describe(constraint)),
        });
    }
}

fn admits(constraint: &Constraint, value: &Value) -> bool {
    let int = match value {
        Value::Enum(e) => Some(e.ordinal),
        other => other.as_i64(),
    };
    match constraint {
        Constraint::Range(intervals) => match (int, value.as_f64()) {
            (Some(n), _) => intervals.iter().any(|&(min, max)| n >= min && n <= max),
            (None, Some(x)) => intervals.iter().any(|&(min, max)| x >= min as f64 && x <= max as f64),
            (None, None) => false,
        },
        Constraint::OneOf(allowed) => int.is_some_and(|n| allowed.contains(&n)),
    }
}

fn describe(constraint: &Constraint) -> String {
    match constraint {
        Constraint::Range(intervals) => {
            let parts: Vec<String> = intervals.iter().map(|(min, max)| format!("{}..{}", min, max)).collect();
            format!("not in [{}]", parts.join(", "))
        }
        Constraint::OneOf(allowed) => {
            let parts: Vec<String> = allowed.iter().map(i64::to_string).collect();
            format!("not in in({})", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EnumValue;

    #[test]
    fn range_admits_union_of_intervals() {
        let c = Constraint::Range(vec![(0, 2), (10, 15)]);
        assert!(admits(&c, &Value::U8(2)));
        assert!(!admits(&c, &Value::U8(5)));
        assert!(admits(&c, &Value::I16(10)));
        assert!(!admits(&c, &Value::I16(-1)));
    }

    #[test]
    fn range_on_floats_and_huge_unsigned() {
        let c = Constraint::range(0, 1);
        assert!(admits(&c, &Value::Double(0.5)));
        assert!(!admits(&c, &Value::Float(1.5)));
        assert!(!admits(&c, &Value::U64(u64::MAX)));
    }

    #[test]
    fn one_of_uses_enum_ordinal() {
        let c = Constraint::OneOf(vec![1, 2]);
        assert!(admits(&c, &Value::Enum(EnumValue { ordinal: 2, member: None })));
        assert!(!admits(&c, &Value::Enum(EnumValue { ordinal: 3, member: None })));
        assert!(!admits(&c, &Value::Str("1".into())));
    }

    #[test]
    fn unknown_enum_member_fails() {
        let desc = FieldDescriptor::new(0, "kind", FieldKind::Enum("K".into()));
        let mut out = Vec::new();
        check_value(&desc, "kind", &Value::Enum(EnumValue { ordinal: 7, member: None }), "7", &mut out);
        assert_eq!(out.len(), 1);
        assert!(!out[0].passed);
        assert_eq!(out[0].raw, "7");
    }
}
