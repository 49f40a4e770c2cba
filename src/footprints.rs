use std::fs::File;
use std::io::Write;
use std::path::Path;

use error_stack::{Report, ResultExt};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use geojson::Value::Polygon;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;

use crate::atl08::{SegmentKind, ShotRecord, TrackRun};
use crate::error::{FootprintError, InvalidInputError};
use crate::segment_polygons::{build_footprint_polygons, FootprintPolygon};
use crate::utm::{epsg_urn, utm_epsg_for_bounds, Reprojector, WGS84_EPSG};

/// Settings for one batch of footprints, built by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintConfig {
    pub segment_kind: SegmentKind,
    /// overrides the segment kind's width (m)
    pub width: Option<f64>,
    /// overrides the segment kind's length (m)
    pub length: Option<f64>,
    /// columns identifying a ground track within a file
    pub track_fields: Vec<String>,
    /// lon/lat filter: xmin, ymin, xmax, ymax
    pub extent: Option<[f64; 4]>,
    /// carry polygons back to EPSG:4326, otherwise keep them in UTM
    pub return_source_crs: bool,
}

impl Default for FootprintConfig {
    fn default() -> Self {
        FootprintConfig {
            segment_kind: SegmentKind::Atl08Segment20m,
            width: None,
            length: None,
            track_fields: vec![String::from("gt")],
            extent: None,
            return_source_crs: true,
        }
    }
}

impl FootprintConfig {
    pub fn width(&self) -> f64 {
        self.width.unwrap_or_else(|| self.segment_kind.width())
    }

    pub fn length(&self) -> f64 {
        self.length.unwrap_or_else(|| self.segment_kind.length())
    }

    /// Rectangles are only well formed for finite, positive dimensions.
    pub fn validate(&self) -> Result<(), Report<FootprintError>> {
        for (name, value) in [("width", self.width()), ("length", self.length())] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Report::new(FootprintError::InvalidDimension(value))
                    .attach_printable(format!("footprint {}", name)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub shot: ShotRecord,
    pub polygon: FootprintPolygon,
    /// measured in the UTM frame, before any reprojection back
    pub area_m2: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackFootprints {
    pub key: String,
    pub epsg: u32,
    pub footprints: Vec<Footprint>,
}

/// Builds footprints for one same-track run: project to the run's UTM zone,
/// lay out the rectangles, then optionally carry them back to lon/lat.
pub fn footprints_for_run(
    run: &TrackRun,
    config: &FootprintConfig,
) -> Result<TrackFootprints, Report<FootprintError>> {
    config.validate()?;

    if run.len() < 2 {
        return Err(Report::new(InvalidInputError { n_points: run.len() })
            .change_context(FootprintError::InvalidRun(run.key.clone())));
    }

    let [xmin, ymin, xmax, ymax] = run.bounds();
    let utm_epsg = utm_epsg_for_bounds(xmin, ymin, xmax, ymax);
    let reprojector = Reprojector::new(utm_epsg)?;

    let utm_points = reprojector.forward_all(&run.lon_lat())?;
    let polygons = build_footprint_polygons(&utm_points, config.width(), config.length())
        .change_context(FootprintError::InvalidRun(run.key.clone()))?;

    let footprints = run
        .shots
        .iter()
        .zip(polygons)
        .map(|(shot, polygon)| -> Result<Footprint, Report<FootprintError>> {
            let area_m2 = polygon.area();
            let polygon = if config.return_source_crs {
                polygon.try_map_coords(|xy| reprojector.to_lon_lat(xy))?
            } else {
                polygon
            };
            Ok(Footprint { shot: shot.clone(), polygon, area_m2 })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let epsg = if config.return_source_crs { WGS84_EPSG } else { utm_epsg };
    debug!("track {}: {} footprints in EPSG:{}", run.key, footprints.len(), epsg);

    Ok(TrackFootprints { key: run.key.clone(), epsg, footprints })
}

/// Processes independent runs in parallel. Runs that are too short or fail
/// are logged and skipped; the rest keep their input order.
pub fn footprints_for_runs(runs: &[TrackRun], config: &FootprintConfig) -> Vec<TrackFootprints> {
    let results: Vec<TrackFootprints> = runs
        .par_iter()
        .filter_map(|run| match footprints_for_run(run, config) {
            Ok(track) => Some(track),
            Err(report) => {
                match report.downcast_ref::<InvalidInputError>() {
                    Some(short) => warn!("skipping track {}: {}", run.key, short),
                    None => warn!("skipping track {}: {:?}", run.key, report),
                }
                None
            }
        })
        .collect();

    info!("built footprints for {} of {} tracks", results.len(), runs.len());
    results
}

fn attribute_value(value: &str) -> JsonValue {
    let trimmed = value.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return JsonValue::from(i);
    }
    if let Some(number) = trimmed.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return JsonValue::Number(number);
    }
    JsonValue::String(value.to_string())
}

fn insert_f64(properties: &mut JsonObject, key: &str, value: f64) {
    if let Some(number) = serde_json::Number::from_f64(value) {
        properties.insert(String::from(key), JsonValue::Number(number));
    }
}

impl Footprint {
    pub fn to_geojson_feature(&self, track: &str) -> Feature {
        let ring: Vec<Vec<f64>> = self
            .polygon
            .ring()
            .into_iter()
            .map(|(x, y)| vec![x, y])
            .collect();

        let mut properties = JsonObject::new();
        for (key, value) in &self.shot.attributes {
            properties.insert(key.clone(), attribute_value(value));
        }
        properties.insert(String::from("track"), JsonValue::String(track.to_string()));
        insert_f64(&mut properties, "direction", self.polygon.direction());
        insert_f64(&mut properties, "area_m2", self.area_m2);
        if let Some(beam) = self.shot.beam_type() {
            properties.insert(String::from("beam_type"), JsonValue::String(beam.to_string()));
        }

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Polygon(vec![ring]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// CRS of the written collection. With nothing to write, the UTM zone is
/// unknown, so only lon/lat output gets a CRS.
fn output_epsg(results: &[TrackFootprints], config: &FootprintConfig) -> Result<Option<u32>, Report<FootprintError>> {
    let mut epsgs: Vec<u32> = results.iter().map(|r| r.epsg).collect();
    epsgs.sort_unstable();
    epsgs.dedup();

    match epsgs.len() {
        0 if config.return_source_crs => Ok(Some(WGS84_EPSG)),
        0 => Ok(None),
        1 => Ok(Some(epsgs[0])),
        _ => Err(Report::new(FootprintError::MixedCrs(epsgs))
            .attach_printable("write tracks from different UTM zones to separate files, or return lon/lat")),
    }
}

pub fn to_feature_collection(
    results: &[TrackFootprints],
    config: &FootprintConfig,
) -> Result<FeatureCollection, Report<FootprintError>> {
    let epsg = output_epsg(results, config)?;

    let features: Vec<Feature> = results
        .iter()
        .flat_map(|r| r.footprints.iter().map(move |fp| fp.to_geojson_feature(&r.key)))
        .collect();

    if features.is_empty() {
        warn!("no footprints were built, output collection is empty");
    }

    let foreign_members = epsg.map(|epsg| {
        let mut members = JsonObject::new();
        members.insert(
            String::from("crs"),
            json!({
                "type": "name",
                "properties": { "name": epsg_urn(epsg) }
            }),
        );
        members
    });

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    })
}

pub fn write_geojson<P: AsRef<Path>>(
    results: &[TrackFootprints],
    config: &FootprintConfig,
    path: P,
) -> Result<(), Report<FootprintError>> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let feature_collection = to_feature_collection(results, config)?;
    let geojson_string = serde_json::to_string_pretty(&feature_collection)
        .change_context(FootprintError::Write(path_str.clone()))?;

    let mut file = File::create(path).change_context(FootprintError::Write(path_str.clone()))?;
    file.write_all(geojson_string.as_bytes())
        .change_context(FootprintError::Write(path_str.clone()))?;

    info!("wrote {} footprints to {}", feature_collection.features.len(), path_str);
    Ok(())
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    track: &'a str,
    index: usize,
    center_x: f64,
    center_y: f64,
    direction: f64,
    area_m2: f64,
    ul_x: f64,
    ul_y: f64,
    ur_x: f64,
    ur_y: f64,
    lr_x: f64,
    lr_y: f64,
    ll_x: f64,
    ll_y: f64,
}

/// One csv row per footprint with its centre, direction and corners.
pub fn write_summary_csv<P: AsRef<Path>>(results: &[TrackFootprints], path: P) -> Result<(), Report<FootprintError>> {
    let path = path.as_ref();
    let path_str = path.display().to_string();
    let mut writer = csv::Writer::from_path(path).change_context(FootprintError::Write(path_str.clone()))?;

    for track in results {
        for (index, fp) in track.footprints.iter().enumerate() {
            let (center_x, center_y) = fp.polygon.center();
            let [ul, ur, lr, ll] = *fp.polygon.corners();
            writer
                .serialize(SummaryRow {
                    track: &track.key,
                    index,
                    center_x,
                    center_y,
                    direction: fp.polygon.direction(),
                    area_m2: fp.area_m2,
                    ul_x: ul.0,
                    ul_y: ul.1,
                    ur_x: ur.0,
                    ur_y: ur.1,
                    lr_x: lr.0,
                    lr_y: lr.1,
                    ll_x: ll.0,
                    ll_y: ll.1,
                })
                .change_context(FootprintError::Write(path_str.clone()))?;
        }
    }

    writer.flush().change_context(FootprintError::Write(path_str.clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atl08::{group_by_track, read_shots};

    const FIXTURE: &str = "tests/fixtures/atl08/ATL08_20220615_t1234_sample.csv";

    fn utm_config() -> FootprintConfig {
        FootprintConfig { return_source_crs: false, ..FootprintConfig::default() }
    }

    fn fixture_run(gt: &str) -> TrackRun {
        let config = FootprintConfig::default();
        let shots = read_shots(FIXTURE, &config).unwrap();
        group_by_track(shots, &config.track_fields)
            .into_iter()
            .find(|run| run.key.ends_with(&format!("/{}", gt)))
            .unwrap()
    }

    fn shot(gt: &str, lon: f64, lat: f64) -> ShotRecord {
        ShotRecord {
            source: String::from("ATL08_test"),
            line: 2,
            lon,
            lat,
            attributes: vec![
                (String::from("gt"), gt.to_string()),
                (String::from("orb_orient"), String::from("0")),
                (String::from("h_can"), String::from("12.5")),
                (String::from("yr"), String::from("2022")),
            ],
        }
    }

    fn utm_track(key: &str, epsg: u32) -> TrackFootprints {
        let points = vec![(370674.28, 3640352.69), (370664.88, 3640452.22), (370655.49, 3640552.17)];
        let polygons = build_footprint_polygons(&points, 11.0, 100.0).unwrap();
        let footprints = polygons
            .into_iter()
            .map(|polygon| Footprint {
                shot: shot("gt1l", -106.3, 32.9),
                area_m2: polygon.area(),
                polygon,
            })
            .collect();
        TrackFootprints { key: key.to_string(), epsg, footprints }
    }

    #[test]
    fn test_config_dimensions() {
        let config = FootprintConfig::default();
        assert_eq!(config.width(), 11.0);
        assert_eq!(config.length(), 20.0);

        let config = FootprintConfig {
            segment_kind: SegmentKind::Atl08Segment100m,
            width: Some(14.0),
            ..FootprintConfig::default()
        };
        assert_eq!(config.width(), 14.0);
        assert_eq!(config.length(), 100.0);
    }

    #[test]
    fn test_short_runs_are_skipped() {
        let runs = vec![
            TrackRun { key: String::from("ATL08_test/gt1r"), shots: vec![shot("gt1r", -105.5, 40.0)] },
            TrackRun { key: String::from("ATL08_test/gt2r"), shots: Vec::new() },
        ];
        let results = footprints_for_runs(&runs, &FootprintConfig::default());
        assert!(results.is_empty());

        let err = footprints_for_run(&runs[0], &FootprintConfig::default()).unwrap_err();
        assert_eq!(
            err.current_context(),
            &FootprintError::InvalidRun(String::from("ATL08_test/gt1r"))
        );
        assert_eq!(
            err.downcast_ref::<InvalidInputError>(),
            Some(&InvalidInputError { n_points: 1 })
        );
    }

    #[test]
    fn test_feature_collection() {
        let results = vec![utm_track("ATL08_test/gt1l", 32613)];
        let fc = to_feature_collection(&results, &utm_config()).unwrap();
        assert_eq!(fc.features.len(), 3);

        let crs = &fc.foreign_members.as_ref().unwrap()["crs"];
        assert_eq!(crs["properties"]["name"], "urn:ogc:def:crs:EPSG::32613");

        let feature = &fc.features[0];
        match &feature.geometry.as_ref().unwrap().value {
            Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[0][0], rings[0][4]);
            }
            other => panic!("expected polygon, got {:?}", other),
        }

        let props = feature.properties.as_ref().unwrap();
        assert_eq!(props["track"], "ATL08_test/gt1l");
        assert_eq!(props["beam_type"], "Strong");
        assert_eq!(props["gt"], "gt1l");
        assert_eq!(props["yr"], 2022);
        assert_eq!(props["h_can"], 12.5);
        assert!((props["area_m2"].as_f64().unwrap() - 1100.0).abs() < 1e-6);
    }

    #[test]
    fn test_mixed_crs_rejected() {
        let results = vec![utm_track("a/gt1l", 32613), utm_track("b/gt1l", 32612)];
        let err = to_feature_collection(&results, &utm_config()).unwrap_err();
        assert_eq!(err.current_context(), &FootprintError::MixedCrs(vec![32612, 32613]));
    }

    #[test]
    fn test_empty_collection_crs_follows_config() {
        let fc = to_feature_collection(&[], &FootprintConfig::default()).unwrap();
        assert!(fc.features.is_empty());
        let crs = &fc.foreign_members.as_ref().unwrap()["crs"];
        assert_eq!(crs["properties"]["name"], "urn:ogc:def:crs:EPSG::4326");

        // no zone to name when nothing was built in UTM
        let fc = to_feature_collection(&[], &utm_config()).unwrap();
        assert!(fc.features.is_empty());
        assert!(fc.foreign_members.is_none());
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        let config = FootprintConfig { width: Some(0.0), ..FootprintConfig::default() };
        let err = config.validate().unwrap_err();
        assert_eq!(err.current_context(), &FootprintError::InvalidDimension(0.0));

        let config = FootprintConfig { length: Some(-20.0), ..FootprintConfig::default() };
        let err = config.validate().unwrap_err();
        assert_eq!(err.current_context(), &FootprintError::InvalidDimension(-20.0));

        for bad in [f64::NAN, f64::INFINITY] {
            let config = FootprintConfig { width: Some(bad), ..FootprintConfig::default() };
            let err = config.validate().unwrap_err();
            assert!(matches!(err.current_context(), FootprintError::InvalidDimension(_)));
        }

        assert!(FootprintConfig::default().validate().is_ok());

        // rejected before any reprojection happens
        let run = TrackRun {
            key: String::from("ATL08_test/gt1r"),
            shots: vec![shot("gt1r", -105.5, 40.0), shot("gt1r", -105.5, 40.0002)],
        };
        let config = FootprintConfig { length: Some(-20.0), ..FootprintConfig::default() };
        let err = footprints_for_run(&run, &config).unwrap_err();
        assert_eq!(err.current_context(), &FootprintError::InvalidDimension(-20.0));
        assert!(footprints_for_runs(&[run], &config).is_empty());
    }

    #[test]
    fn test_footprints_for_run_in_utm() {
        let run = fixture_run("gt1r");
        assert_eq!(run.len(), 5);

        let track = footprints_for_run(&run, &utm_config()).unwrap();
        assert_eq!(track.epsg, 32613);
        assert_eq!(track.footprints.len(), 5);
        for fp in &track.footprints {
            assert!((fp.area_m2 - 220.0).abs() < 1e-6, "area {}", fp.area_m2);
            assert!((fp.polygon.area() - 220.0).abs() < 1e-6);
            // easting/northing, not degrees
            assert!(fp.polygon.center().0 > 100_000.0);
        }
    }

    #[test]
    fn test_footprints_for_run_back_to_lon_lat() {
        let run = fixture_run("gt1r");
        let track = footprints_for_run(&run, &FootprintConfig::default()).unwrap();
        assert_eq!(track.epsg, WGS84_EPSG);

        for (fp, shot) in track.footprints.iter().zip(&run.shots) {
            assert_eq!(&fp.shot, shot);
            assert!((fp.area_m2 - 220.0).abs() < 1e-6);

            let (lon, lat) = fp.polygon.centroid();
            assert!((lon - shot.lon).abs() < 1e-7, "lon {} vs {}", lon, shot.lon);
            assert!((lat - shot.lat).abs() < 1e-7, "lat {} vs {}", lat, shot.lat);

            let (lon, lat) = fp.polygon.center();
            assert!((lon - shot.lon).abs() < 1e-9);
            assert!((lat - shot.lat).abs() < 1e-9);
        }
    }

    #[test]
    fn test_footprints_for_fixture_runs() {
        let config = FootprintConfig::default();
        let shots = read_shots(FIXTURE, &config).unwrap();
        let runs = group_by_track(shots, &config.track_fields);

        let results = footprints_for_runs(&runs, &config);
        assert_eq!(results.len(), 2);
        assert!(results[0].key.ends_with("/gt1r"));
        assert_eq!(results[1].footprints.len(), 3);

        let fc = to_feature_collection(&results, &config).unwrap();
        assert_eq!(fc.features.len(), 8);
    }

    #[test]
    fn test_write_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("footprints.geojson");
        write_geojson(&[utm_track("ATL08_test/gt1l", 32613)], &utm_config(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().unwrap().len(), 3);
        assert_eq!(value["crs"]["type"], "name");
    }

    #[test]
    fn test_write_summary_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("footprints.csv");
        write_summary_csv(&[utm_track("ATL08_test/gt1l", 32613)], &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "track");
        assert_eq!(&headers[5], "area_m2");
        assert_eq!(headers.len(), 14);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[2][1], "2");
        let center_y: f64 = rows[1][3].parse().unwrap();
        assert!((center_y - 3640452.22).abs() < 1e-6);
    }
}
