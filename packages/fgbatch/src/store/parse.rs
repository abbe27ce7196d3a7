//! Schema-validated decoding of one record line.
//!
//! Line layout: `[[variable_num, function_num], variable_literals,
//! function_literals, label]`. Literals are signed 1-based indices; the
//! sign of each variable literal is the edge sign.

use serde::Deserialize;

use crate::error::{LoaderError, Result};
use crate::record::{GraphMap, Record};

/// Wire shape of a record line. serde checks arity and element types
/// before any field is touched.
#[derive(Deserialize)]
struct RecordLine((u32, u32), Vec<i64>, Vec<i64>, f64);

/// Decode and validate one raw line. `index` is the logical record index,
/// used only for error reporting.
pub fn parse_record_line(index: usize, raw: &[u8]) -> Result<Record> {
    let RecordLine((variable_num, function_num), variable_literals, function_literals, label) =
        serde_json::from_slice::<RecordLine>(raw).map_err(|e| LoaderError::parse(index, e.to_string()))?;

    if variable_literals.len() != function_literals.len() {
        return Err(LoaderError::parse(
            index,
            format!(
                "literal count mismatch: {} variable vs {} function",
                variable_literals.len(),
                function_literals.len()
            ),
        ));
    }

    let edge_count = variable_literals.len();
    let mut graph_map = GraphMap::with_capacity(edge_count);
    let mut edge_feature = Vec::with_capacity(edge_count);

    for (k, (&v, &f)) in variable_literals.iter().zip(&function_literals).enumerate() {
        let variable = zero_based(index, k, v, "variable")?;
        let function = zero_based(index, k, f, "function")?;
        graph_map.variables.push(variable);
        graph_map.functions.push(function);
        edge_feature.push(if v > 0 { 1.0 } else { -1.0 });
    }

    let record = Record {
        variable_num,
        function_num,
        graph_map,
        edge_feature,
        graph_feature: None,
        label: label as f32,
    };
    // A line that decodes but describes an impossible graph is still a bad line.
    record.validate(index).map_err(|e| match e {
        LoaderError::InvalidRecord { reason, .. } => LoaderError::parse(index, reason),
        other => other,
    })?;
    Ok(record)
}

fn zero_based(index: usize, edge: usize, literal: i64, side: &str) -> Result<u32> {
    if literal == 0 {
        return Err(LoaderError::parse(
            index,
            format!("edge {edge}: zero {side} literal"),
        ));
    }
    u32::try_from(literal.unsigned_abs() - 1)
        .map_err(|_| LoaderError::parse(index, format!("edge {edge}: {side} literal {literal} exceeds u32")))
}
