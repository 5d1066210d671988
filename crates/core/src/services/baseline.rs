use tracing::debug;

use crate::errors::CoreError;
use crate::models::price::PricePoint;
use super::validation_service::validate_baseline;

/// Weekly closes from mid-2010 to the live cutover, shipped with the crate.
pub const BUNDLED_WEEKLY_BASELINE: &str = include_str!("../../data/weekly_baseline.json");

/// Parse and validate a JSON baseline of `[{"date": "YYYY-MM-DD", "price": f64}, ...]`.
///
/// The result is sorted by date. Duplicate dates and non-positive prices
/// are rejected.
pub fn parse_baseline(json: &str) -> Result<Vec<PricePoint>, CoreError> {
    let mut points: Vec<PricePoint> = serde_json::from_str(json)?;
    points.sort_by_key(|p| p.date);
    validate_baseline(&points)?;
    debug!(
        points = points.len(),
        first = ?points.first().map(|p| p.date),
        last = ?points.last().map(|p| p.date),
        "Baseline loaded"
    );
    Ok(points)
}

/// The bundled weekly baseline.
pub fn bundled_baseline() -> Result<Vec<PricePoint>, CoreError> {
    parse_baseline(BUNDLED_WEEKLY_BASELINE)
}
