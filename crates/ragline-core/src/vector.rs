//! Canonical vector decoding and similarity math.
//!
//! Stored vectors reach the engine either as a native JSON array or as a
//! JSON-encoded string (`"[0.1, 0.2, ...]"`). [`decode_vector`] is the single
//! path every reader uses to normalize both forms into `Vec<f32>`.

use serde_json::Value;

use crate::{RaglineError, RaglineResult};

/// Decode a stored vector field into its canonical in-memory form.
///
/// Accepts a JSON array of numbers or a string holding one. An empty array
/// decodes to an empty vector; callers treat that as "not scorable".
pub fn decode_vector(raw: &Value) -> RaglineResult<Vec<f32>> {
    match raw {
        Value::Array(items) => decode_items(items),
        Value::String(encoded) => {
            let parsed: Value = serde_json::from_str(encoded.trim()).map_err(|e| {
                RaglineError::InvalidVector(format!("unparseable vector string: {e}"))
            })?;
            match parsed {
                Value::Array(items) => decode_items(&items),
                other => Err(RaglineError::InvalidVector(format!(
                    "encoded vector is not an array (found {})",
                    type_name(&other)
                ))),
            }
        }
        Value::Null => Ok(Vec::new()),
        other => Err(RaglineError::InvalidVector(format!(
            "unsupported vector representation: {}",
            type_name(other)
        ))),
    }
}

fn decode_items(items: &[Value]) -> RaglineResult<Vec<f32>> {
    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let value = item.as_f64().ok_or_else(|| {
            RaglineError::InvalidVector(format!("component {idx} is not a number"))
        })?;
        let value = value as f32;
        if !value.is_finite() {
            return Err(RaglineError::InvalidVector(format!(
                "component {idx} is not finite"
            )));
        }
        out.push(value);
    }
    Ok(out)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Cosine similarity between two vectors.
///
/// Returns `None` when the vectors cannot be compared: different lengths,
/// empty input, or a zero-norm side. The result is kept inside `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    let sim = dot / (na * nb);
    if sim.is_finite() {
        Some(sim.clamp(-1.0, 1.0))
    } else {
        None
    }
}
