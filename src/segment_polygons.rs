use crate::error::InvalidInputError;
use crate::support::{calculate_angle, rotate_point, SLOPE_ANGLE_OFFSET_DEG};

/// Estimates the local ground-track direction (slope angle, degrees) at each
/// point of an ordered, same-track run in a planar metric frame.
///
/// Interior points use their two neighbours; the first and last points use
/// the one-sided pair. Values lie in `(-90, 90]`, so forward and backward
/// travel are indistinguishable.
pub fn calculate_ground_direction(points: &[(f64, f64)]) -> Result<Vec<f64>, InvalidInputError> {
    let n = points.len();
    if n < 2 {
        return Err(InvalidInputError { n_points: n });
    }

    let degrees = (0..n)
        .map(|i| {
            let (a, b) = if i == 0 {
                (points[0], points[1])
            } else if i == n - 1 {
                (points[n - 2], points[n - 1])
            } else {
                (points[i - 1], points[i + 1])
            };
            calculate_angle(a.0, b.0, a.1, b.1)
        })
        .collect();

    Ok(degrees)
}

/// Corners of a `width` x `height` rectangle centred on `(xcenter, ycenter)`
/// whose `height` axis follows the slope angle `degree`.
///
/// Returned as upper-left, upper-right, lower-right, lower-left.
pub fn calculate_corners(
    degree: f64,
    xcenter: f64,
    ycenter: f64,
    width: f64,
    height: f64,
) -> [(f64, f64); 4] {
    let half_w = width / 2.0;
    let half_h = height / 2.0;
    let rotation = degree + SLOPE_ANGLE_OFFSET_DEG;

    let offsets = [
        (-half_w, half_h),  // ul
        (half_w, half_h),   // ur
        (half_w, -half_h),  // lr
        (-half_w, -half_h), // ll
    ];

    offsets.map(|(x, y)| {
        let (xr, yr) = rotate_point(rotation, x, y);
        (xcenter + xr, ycenter + yr)
    })
}

/// Oriented rectangle approximating one sensor footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintPolygon {
    center: (f64, f64),
    direction: f64,
    corners: [(f64, f64); 4],
}

impl FootprintPolygon {
    pub fn new(center: (f64, f64), direction: f64, width: f64, length: f64) -> Self {
        let corners = calculate_corners(direction, center.0, center.1, width, length);
        FootprintPolygon { center, direction, corners }
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    /// Slope angle, in the frame the polygon was built in.
    pub fn direction(&self) -> f64 {
        self.direction
    }

    pub fn corners(&self) -> &[(f64, f64); 4] {
        &self.corners
    }

    /// Closed ring: the four corners followed by the first one again.
    pub fn ring(&self) -> Vec<(f64, f64)> {
        let mut ring = self.corners.to_vec();
        ring.push(self.corners[0]);
        ring
    }

    /// Unsigned shoelace area.
    pub fn area(&self) -> f64 {
        // relative to the first corner, UTM-sized coordinates lose too much precision
        let (x0, y0) = self.corners[0];
        let ring: Vec<(f64, f64)> = self.ring().iter().map(|&(x, y)| (x - x0, y - y0)).collect();
        let twice: f64 = ring
            .windows(2)
            .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
            .sum();
        twice.abs() / 2.0
    }

    pub fn centroid(&self) -> (f64, f64) {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |acc, c| (acc.0 + c.0, acc.1 + c.1));
        (sx / 4.0, sy / 4.0)
    }

    /// Applies a fallible coordinate transform to the centre and every
    /// corner, e.g. to carry the polygon back to its source CRS. The
    /// direction is left as computed in the original frame.
    pub fn try_map_coords<E, F>(&self, mut f: F) -> Result<FootprintPolygon, E>
    where
        F: FnMut((f64, f64)) -> Result<(f64, f64), E>,
    {
        let center = f(self.center)?;
        let mut corners = self.corners;
        for corner in corners.iter_mut() {
            *corner = f(*corner)?;
        }
        Ok(FootprintPolygon { center, direction: self.direction, corners })
    }
}

/// Builds one footprint per point of an ordered, same-track run.
///
/// Points must be in a planar metric frame. Fails when fewer than two points
/// are supplied, without producing a partial result.
pub fn build_footprint_polygons(
    points: &[(f64, f64)],
    width: f64,
    length: f64,
) -> Result<Vec<FootprintPolygon>, InvalidInputError> {
    let directions = calculate_ground_direction(points)?;

    Ok(points
        .iter()
        .zip(directions)
        .map(|(&center, direction)| FootprintPolygon::new(center, direction, width, length))
        .collect())
}
