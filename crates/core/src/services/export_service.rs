use crate::errors::CoreError;
use crate::models::simulation::SimulationRow;

/// CSV with a camelCase header row, one line per simulated year.
///
/// Flows that have not started yet are written as `not-yet-active`; an
/// absent effective rate is an empty field.
pub fn rows_to_csv(rows: &[SimulationRow]) -> Result<String, CoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::Serialization(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
}

/// Pretty-printed JSON array of rows.
pub fn rows_to_json(rows: &[SimulationRow]) -> Result<String, CoreError> {
    serde_json::to_string_pretty(rows).map_err(|e| CoreError::Serialization(e.to_string()))
}
