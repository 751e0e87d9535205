/// Step policy for participant voices.
pub fn ambient_gain(distance: f64, radius: f64) -> f32 {
    if distance <= radius { 1.0 } else { 0.0 }
}

/// Linear fade for audible world objects: full inside `inner`, silent from
/// `outer` on.
pub fn embedded_gain(distance: f64, inner: f64, outer: f64) -> f32 {
    if distance <= inner {
        1.0
    } else if distance >= outer {
        0.0
    } else {
        (1.0 - (distance - inner) / (outer - inner)) as f32
    }
}
