//! Treated to blended water conversion.
//!
//! Treated water leaves the resin with zero hardness and is mixed with raw
//! bypass water until the outlet hardness is reached. The volume actually
//! delivered is therefore `treated * in / (in - out)`.

/// Convert a treated volume into the blended volume delivered at the outlet.
///
/// When the outlet is not softer than the inlet no blending ratio can be
/// derived and the treated volume is returned unchanged.
pub fn treated_to_blended(treated: i64, hardness_in: i64, hardness_out: i64) -> f64 {
    let removed = hardness_in.saturating_sub(hardness_out);
    if removed <= 0 {
        return treated as f64;
    }
    treated as f64 * hardness_in as f64 / removed as f64
}
