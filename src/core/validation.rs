//! Gate between measuring and publishing.

use crate::{core::speedtest::MeasurementResult, error::RunError};

/// Accepts the result only if every metric is finite and strictly positive.
///
/// Zero is what an unrun phase leaves behind, so it never passes.
pub fn validate_result(result: &MeasurementResult) -> Result<(), RunError> {
    let metrics = [
        ("latency", result.latency),
        ("dl_speed", result.dl_speed),
        ("ul_speed", result.ul_speed),
    ];

    for (name, value) in metrics {
        if !value.is_finite() || value <= 0.0 {
            return Err(RunError::InvalidMeasurementResult(format!(
                "{name} is {value}"
            )));
        }
    }
    Ok(())
}
