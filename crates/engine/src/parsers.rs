//! Built-in metric parsers.
//!
//! A parser extracts typed numeric value(s) from a patient's raw
//! fields, or fails with a short machine-readable reason. Parse
//! failures are data problems, never fatal: the engine converts them
//! into the metric's configured invalid score.
//!
//! The registry is a fixed dispatch table keyed by the `parserId`
//! strings that appear in rules documents. An id that does not resolve
//! is a configuration error handled by the engine, not here.

use triage_types::Patient;

/// Parsed values keyed by name, in parser-defined order.
///
/// Single-field parsers emit one entry named after the source field;
/// the blood-pressure parser emits `systolic` then `diastolic`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValues(pub Vec<(String, f64)>);

impl ParsedValues {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }

    /// The first (often only) parsed entry.
    pub fn first(&self) -> Option<(&str, f64)> {
        self.0.first().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Outcome of running a parser over a patient's fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(ParsedValues),
    Failed { reason: &'static str },
}

pub type ParserFn = fn(&Patient, &[String]) -> ParseOutcome;

/// Resolves a `parserId` against the fixed registry.
pub fn lookup_parser(id: &str) -> Option<ParserFn> {
    match id {
        "numberLenient" => Some(number_lenient),
        "bpSlashParser" => Some(bp_slash_parser),
        _ => None,
    }
}

/// A patient field as seen by a parser: absent, already numeric, or
/// raw text still needing interpretation.
enum FieldValue<'a> {
    Missing,
    Number(f64),
    Text(&'a str),
}

/// Dynamic lookup of a canonical patient field by its configured name.
/// Unknown names read as missing, which surfaces as a parse failure.
fn field_value<'a>(patient: &'a Patient, field: &str) -> FieldValue<'a> {
    fn text(v: &Option<String>) -> FieldValue<'_> {
        match v {
            Some(s) => FieldValue::Text(s),
            None => FieldValue::Missing,
        }
    }
    fn number(v: &Option<f64>) -> FieldValue<'static> {
        match v {
            Some(n) => FieldValue::Number(*n),
            None => FieldValue::Missing,
        }
    }

    match field {
        "patient_id" => FieldValue::Text(&patient.patient_id),
        "name" => text(&patient.name),
        "age" => number(&patient.age),
        "gender" => text(&patient.gender),
        "blood_pressure" => text(&patient.blood_pressure),
        "temperature" => number(&patient.temperature),
        "visit_date" => text(&patient.visit_date),
        "diagnosis" => text(&patient.diagnosis),
        "medications" => text(&patient.medications),
        _ => FieldValue::Missing,
    }
}

/// `numberLenient`: reads the metric's single field as a finite number,
/// accepting a numeric string after trimming.
fn number_lenient(patient: &Patient, fields: &[String]) -> ParseOutcome {
    let Some(field) = fields.first() else {
        return ParseOutcome::Failed { reason: "missing" };
    };

    match field_value(patient, field) {
        FieldValue::Missing => ParseOutcome::Failed { reason: "missing" },
        FieldValue::Number(n) if n.is_finite() => {
            ParseOutcome::Parsed(ParsedValues(vec![(field.clone(), n)]))
        }
        FieldValue::Number(_) => ParseOutcome::Failed {
            reason: "non-numeric",
        },
        FieldValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return ParseOutcome::Failed { reason: "empty" };
            }
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => {
                    ParseOutcome::Parsed(ParsedValues(vec![(field.clone(), n)]))
                }
                _ => ParseOutcome::Failed {
                    reason: "non-numeric",
                },
            }
        }
    }
}

/// `bpSlashParser`: reads the metric's single field as a
/// `"systolic/diastolic"` string (digits, optional whitespace around
/// the slash) and emits both components.
fn bp_slash_parser(patient: &Patient, fields: &[String]) -> ParseOutcome {
    let Some(field) = fields.first() else {
        return ParseOutcome::Failed {
            reason: "missing-or-not-string",
        };
    };

    let raw = match field_value(patient, field) {
        FieldValue::Text(s) => s,
        _ => {
            return ParseOutcome::Failed {
                reason: "missing-or-not-string",
            }
        }
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParseOutcome::Failed { reason: "empty" };
    }

    let Some((sys_part, dia_part)) = trimmed.split_once('/') else {
        return ParseOutcome::Failed {
            reason: "bad-format",
        };
    };
    let sys_part = sys_part.trim_end();
    let dia_part = dia_part.trim_start();

    let all_digits =
        |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(sys_part) || !all_digits(dia_part) {
        return ParseOutcome::Failed {
            reason: "bad-format",
        };
    }

    let (Ok(systolic), Ok(diastolic)) = (sys_part.parse::<u32>(), dia_part.parse::<u32>()) else {
        return ParseOutcome::Failed { reason: "nan" };
    };

    ParseOutcome::Parsed(ParsedValues(vec![
        ("systolic".to_owned(), f64::from(systolic)),
        ("diastolic".to_owned(), f64::from(diastolic)),
    ]))
}
