use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use error_stack::{Report, ResultExt};
use log::{debug, info};

use crate::error::FootprintError;
use crate::footprints::FootprintConfig;

/// float32 max, written by the extraction step for missing coordinates
pub const NODATA_F32: f64 = 3.402823466385289e38;

/// ATL08 footprint geometry. Replaces matching on zonal-type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Atl08Segment20m,
    Atl08Segment100m,
}

impl SegmentKind {
    pub fn width(&self) -> f64 {
        11.0
    }

    pub fn length(&self) -> f64 {
        match self {
            SegmentKind::Atl08Segment20m => 20.0,
            SegmentKind::Atl08Segment100m => 100.0,
        }
    }

    /// 20m rows carry their own centroid; the 100m centroid sits in lon/lat.
    pub fn lon_field(&self) -> &'static str {
        match self {
            SegmentKind::Atl08Segment20m => "lon_20m",
            SegmentKind::Atl08Segment100m => "lon",
        }
    }

    pub fn lat_field(&self) -> &'static str {
        match self {
            SegmentKind::Atl08Segment20m => "lat_20m",
            SegmentKind::Atl08Segment100m => "lat",
        }
    }
}

impl FromStr for SegmentKind {
    type Err = Report<FootprintError>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ATL08-20m" => Ok(SegmentKind::Atl08Segment20m),
            "ATL08-100m" => Ok(SegmentKind::Atl08Segment100m),
            other => Err(Report::new(FootprintError::UnknownSegmentKind(other.to_string()))
                .attach_printable("expected ATL08-20m or ATL08-100m")),
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Atl08Segment20m => write!(f, "ATL08-20m"),
            SegmentKind::Atl08Segment100m => write!(f, "ATL08-100m"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamType {
    Strong,
    Weak,
}

impl BeamType {
    /// Strong/weak beam from spacecraft orientation and ground track label.
    ///
    /// Forward orientation (1) puts the strong beams on the right tracks,
    /// backward orientation (0) on the left ones.
    pub fn classify(orb_orient: &str, gt: &str) -> Option<BeamType> {
        let orient = strip_bytes_literal(orb_orient).parse::<f64>().ok()?;
        let gt = strip_bytes_literal(gt);

        let side_right = if gt.contains('r') {
            true
        } else if gt.contains('l') {
            false
        } else {
            return None;
        };

        if orient == 1.0 {
            Some(if side_right { BeamType::Strong } else { BeamType::Weak })
        } else if orient == 0.0 {
            Some(if side_right { BeamType::Weak } else { BeamType::Strong })
        } else {
            None
        }
    }
}

impl fmt::Display for BeamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeamType::Strong => write!(f, "Strong"),
            BeamType::Weak => write!(f, "Weak"),
        }
    }
}

// Some extractions wrote python byte reprs such as b'gt1r'
fn strip_bytes_literal(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix("b'")
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value)
}

/// One ATL08 row: its centroid in EPSG:4326 plus the full attribute row.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotRecord {
    pub source: String,
    pub line: u64,
    pub lon: f64,
    pub lat: f64,
    pub attributes: Vec<(String, String)>,
}

impl ShotRecord {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn beam_type(&self) -> Option<BeamType> {
        BeamType::classify(self.attribute("orb_orient")?, self.attribute("gt")?)
    }
}

/// Ordered shots sharing one ground track within one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRun {
    pub key: String,
    pub shots: Vec<ShotRecord>,
}

impl TrackRun {
    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    pub fn lon_lat(&self) -> Vec<(f64, f64)> {
        self.shots.iter().map(|s| (s.lon, s.lat)).collect()
    }

    /// xmin, ymin, xmax, ymax in lon/lat
    pub fn bounds(&self) -> [f64; 4] {
        self.shots.iter().fold(
            [f64::MAX, f64::MAX, f64::MIN, f64::MIN],
            |b, s| [b[0].min(s.lon), b[1].min(s.lat), b[2].max(s.lon), b[3].max(s.lat)],
        )
    }
}

fn parse_coord(value: &str, name: &str, line: u64, path: &str) -> Result<f64, Report<FootprintError>> {
    strip_bytes_literal(value)
        .parse::<f64>()
        .change_context(FootprintError::Parse(path.to_string()))
        .attach_printable_lazy(|| format!("line {}: {} = {:?}", line, name, value))
}

fn keep_shot(lon: f64, lat: f64, extent: Option<[f64; 4]>) -> bool {
    if lat == NODATA_F32 || !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return false;
    }
    match extent {
        Some([xmin, ymin, xmax, ymax]) => lon >= xmin && lon <= xmax && lat >= ymin && lat <= ymax,
        None => true,
    }
}

/// Reads an extracted ATL08 csv, dropping nodata, out-of-range and
/// out-of-extent rows.
pub fn read_shots<P: AsRef<Path>>(
    path: P,
    config: &FootprintConfig,
) -> Result<Vec<ShotRecord>, Report<FootprintError>> {
    let path = path.as_ref();
    let path_str = path.display().to_string();
    let source = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.clone());

    let mut reader = csv::Reader::from_path(path)
        .change_context(FootprintError::Read(path_str.clone()))?;
    let headers = reader
        .headers()
        .change_context(FootprintError::Read(path_str.clone()))?
        .clone();

    let column = |name: &str| {
        headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
            Report::new(FootprintError::MissingColumn(name.to_string()))
                .attach_printable(format!("in {}", path_str))
        })
    };

    let lon_field = config.segment_kind.lon_field();
    let lat_field = config.segment_kind.lat_field();
    let lon_idx = column(lon_field)?;
    let lat_idx = column(lat_field)?;
    for field in &config.track_fields {
        column(field.as_str())?;
    }

    let mut shots = Vec::new();
    let mut n_dropped = 0;

    for result in reader.records() {
        let record = result.change_context(FootprintError::Parse(path_str.clone()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let lon = parse_coord(&record[lon_idx], lon_field, line, &path_str)?;
        let lat = parse_coord(&record[lat_idx], lat_field, line, &path_str)?;

        if !keep_shot(lon, lat, config.extent) {
            n_dropped += 1;
            continue;
        }

        let attributes = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.trim().to_string(), v.to_string()))
            .collect();

        shots.push(ShotRecord { source: source.clone(), line, lon, lat, attributes });
    }

    debug!("{}: dropped {} rows", path_str, n_dropped);
    info!("read {} shots from {}", shots.len(), path_str);

    Ok(shots)
}

/// Splits shots into runs keyed by source file and the values of
/// `track_fields`. Runs appear in first-seen order and keep row order.
pub fn group_by_track(shots: Vec<ShotRecord>, track_fields: &[String]) -> Vec<TrackRun> {
    let mut runs: Vec<TrackRun> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for shot in shots {
        let track: Vec<&str> = track_fields
            .iter()
            .map(|f| strip_bytes_literal(shot.attribute(f).unwrap_or("")))
            .collect();
        let key = format!("{}/{}", shot.source, track.join("_"));

        match index.get(&key) {
            Some(&i) => runs[i].shots.push(shot),
            None => {
                index.insert(key.clone(), runs.len());
                runs.push(TrackRun { key, shots: vec![shot] });
            }
        }
    }

    runs
}
