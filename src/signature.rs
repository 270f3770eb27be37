//! Tamper-evident signatures over problem definitions.
//!
//! A problem and its steps are flattened into a multi-valued map, encoded
//! as an `application/x-www-form-urlencoded` string with sorted keys, and
//! signed with HMAC-SHA256. The signature is the standard base64 of the
//! digest.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::GrindError;
use crate::model::{Problem, ProblemStep};

type HmacSha256 = Hmac<Sha256>;

/// Builds the canonical byte string that is signed.
///
/// Keys are sorted; values under one key keep their order. Tags and
/// options are taken in stored order, so callers normalize first. Step
/// files are visited in file-name order.
#[must_use]
pub fn canonical_encoding(problem: &Problem, steps: &[ProblemStep]) -> String {
    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut add = |key: String, value: String| values.entry(key).or_default().push(value);

    add("id".into(), problem.id.to_string());
    add("unique".into(), problem.unique.clone());
    add("note".into(), problem.note.clone());
    add("problemType".into(), problem.problem_type.clone());
    for tag in &problem.tags {
        add("tags".into(), tag.clone());
    }
    for option in &problem.options {
        add("options".into(), option.clone());
    }
    add("createdAt".into(), format_timestamp(problem.created_at));
    add("updatedAt".into(), format_timestamp(problem.updated_at));

    for step in steps {
        let n = step.step;
        add(format!("step-{n}-note"), step.note.clone());
        add(format!("step-{n}-weight"), format_weight(step.weight));
        for (name, contents) in &step.files {
            add(format!("step-{n}-file-{name}"), contents.clone());
        }
    }

    let mut encoded = url::form_urlencoded::Serializer::new(String::new());
    for (key, list) in &values {
        for value in list {
            encoded.append_pair(key, value);
        }
    }
    encoded.finish()
}

/// Computes the signature of a problem and its steps.
///
/// # Errors
///
/// Returns an integrity error if the MAC cannot be keyed with `secret`.
pub fn compute_signature(
    secret: &str,
    problem: &Problem,
    steps: &[ProblemStep],
) -> Result<String, GrindError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GrindError::Integrity(format!("invalid signing secret: {e}")))?;
    mac.update(canonical_encoding(problem, steps).as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Recomputes the signature and compares it with `signature` in constant time.
///
/// # Errors
///
/// Returns an integrity error on any mismatch.
pub fn verify_signature(
    secret: &str,
    problem: &Problem,
    steps: &[ProblemStep],
    signature: &str,
) -> Result<(), GrindError> {
    let computed = compute_signature(secret, problem, steps)?;
    let matches = computed.len() == signature.len()
        && bool::from(computed.as_bytes().ct_eq(signature.as_bytes()));
    if !matches {
        tracing::warn!(problem = problem.id, unique = %problem.unique, "problem signature mismatch");
        return Err(GrindError::Integrity(format!(
            "signature mismatch for problem {} ({})",
            problem.id, problem.unique
        )));
    }
    Ok(())
}

/// Formats a timestamp rounded to the second as `YYYY-MM-DDTHH:MM:SSZ`.
#[must_use]
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    let rounded = t.duration_round(TimeDelta::seconds(1)).unwrap_or(t);
    rounded.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Formats a weight with the fewest digits that round-trip.
///
/// Exponent notation (`1e+06`, `1e-05`) is used when the decimal exponent
/// is below -4 or at least 6, so the output is stable across platforms.
#[must_use]
pub fn format_weight(weight: f64) -> String {
    if !weight.is_finite() || weight == 0.0 {
        return format!("{weight}");
    }
    let scientific = format!("{weight:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return format!("{weight}");
    };
    let Ok(exp) = exponent.parse::<i32>() else {
        return format!("{weight}");
    };
    if (-4..6).contains(&exp) {
        format!("{weight}")
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    }
}
