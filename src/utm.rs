use error_stack::{Report, ResultExt};
use proj::Proj;

use crate::error::FootprintError;

pub const WGS84_EPSG: u32 = 4326;

/// UTM zone number (1..=60) containing `lon`.
pub fn utm_zone(lon: f64) -> u32 {
    let zone = ((lon + 180.0) / 6.0).floor() as i64 + 1;
    zone.clamp(1, 60) as u32
}

/// EPSG code of the WGS84 UTM zone holding the centre of a lon/lat box.
///
/// Latitudes are clamped to the UTM band (-80..84) first. A box wider than
/// 180 degrees is taken to cross the antimeridian and centred on 0..360
/// longitudes.
pub fn utm_epsg_for_bounds(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> u32 {
    let ymin = ymin.max(-80.0);
    let ymax = ymax.min(84.0);

    let lon = if xmax - xmin > 180.0 {
        let shifted = (xmin + 360.0 + xmax) / 2.0;
        if shifted >= 180.0 { shifted - 360.0 } else { shifted }
    } else {
        (xmin + xmax) / 2.0
    };
    let lat = (ymin + ymax) / 2.0;

    let zone = utm_zone(lon);
    if lat >= 0.0 {
        32600 + zone
    } else {
        32700 + zone
    }
}

pub fn epsg_urn(epsg: u32) -> String {
    format!("urn:ogc:def:crs:EPSG::{}", epsg)
}

/// Lon/lat <-> UTM transforms for one zone.
///
/// Not shared between threads; each run builds its own.
pub struct Reprojector {
    pub epsg: u32,
    forward: Proj,
    inverse: Proj,
}

impl Reprojector {
    pub fn new(epsg: u32) -> Result<Reprojector, Report<FootprintError>> {
        let src = format!("EPSG:{}", WGS84_EPSG);
        let dst = format!("EPSG:{}", epsg);

        // new_known_crs normalises EPSG:4326 to lon/lat axis order
        let forward = Proj::new_known_crs(&src, &dst, None)
            .change_context(FootprintError::Projection(epsg))?;
        let inverse = Proj::new_known_crs(&dst, &src, None)
            .change_context(FootprintError::Projection(epsg))?;

        Ok(Reprojector { epsg, forward, inverse })
    }

    pub fn to_utm(&self, lon_lat: (f64, f64)) -> Result<(f64, f64), Report<FootprintError>> {
        self.forward
            .convert(lon_lat)
            .change_context(FootprintError::Projection(self.epsg))
            .attach_printable_lazy(|| format!("lon/lat {:?}", lon_lat))
    }

    pub fn to_lon_lat(&self, xy: (f64, f64)) -> Result<(f64, f64), Report<FootprintError>> {
        self.inverse
            .convert(xy)
            .change_context(FootprintError::Projection(self.epsg))
            .attach_printable_lazy(|| format!("utm {:?}", xy))
    }

    pub fn forward_all(&self, points: &[(f64, f64)]) -> Result<Vec<(f64, f64)>, Report<FootprintError>> {
        points.iter().map(|&p| self.to_utm(p)).collect()
    }
}
