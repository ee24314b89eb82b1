// src/utils/fixed_point.rs
/// Scale to int16, `NaN` becoming `nodata_value`. Callers pass a positive
/// `scale_factor`; other values still encode without panicking.
pub fn to_fixed_point(data: &[f32], scale_factor: i32, nodata_value: i16) -> Vec<i16> {
    data.iter()
        .map(|&value| {
            if value.is_nan() {
                nodata_value
            } else {
                // Anomalies can reach +-2, so clamp to what fits in i16 at this scale
                let limit = (i16::MAX as f32 - 1.0) / scale_factor.unsigned_abs() as f32;
                let clamped = value.clamp(-limit, limit);
                (clamped * scale_factor as f32).round() as i16
            }
        })
        .collect()
}
