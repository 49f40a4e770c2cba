/// Rotation applied to a slope angle before it is used to orient a footprint.
///
/// `calculate_angle` yields the principal arctangent of the track slope, in
/// `(-90, 90]`, measured from the x axis. The corner generator lays out its
/// rectangle with `length` on the y axis, so the slope angle has to be
/// shifted by -90 degrees for `length` to run along-track. If the direction
/// convention ever becomes a full 0-360 bearing this offset must be
/// re-derived together with it.
pub const SLOPE_ANGLE_OFFSET_DEG: f64 = -90.0;

/// Slope angle in degrees of the line through `(x1, y1)` and `(x2, y2)`.
///
/// A vertical line (`x2 == x1`) has infinite slope and maps to 90.
pub fn calculate_angle(x1: f64, x2: f64, y1: f64, y2: f64) -> f64 {
    let slope = if x2 - x1 == 0.0 {
        f64::INFINITY
    } else {
        (y2 - y1) / (x2 - x1)
    };
    slope.atan().to_degrees()
}

/// Rotates the offset `(xpos, ypos)` about the origin by `degree`.
pub fn rotate_point(degree: f64, xpos: f64, ypos: f64) -> (f64, f64) {
    let angle = degree.to_radians();
    let xrot = xpos * angle.cos() - ypos * angle.sin();
    let yrot = xpos * angle.sin() + ypos * angle.cos();
    (xrot, yrot)
}
