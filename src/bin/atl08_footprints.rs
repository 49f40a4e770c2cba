extern crate clap;

use clap::Parser;
use error_stack::Report;
use log::{info, warn};
use rayon::ThreadPoolBuilder;

use atl08_footprints::atl08::{group_by_track, read_shots, SegmentKind};
use atl08_footprints::error::FootprintError;
use atl08_footprints::footprints::{
    footprints_for_runs,
    write_geojson,
    write_summary_csv,
    FootprintConfig};

#[derive(Parser)]
struct Opts {
    /// Extracted ATL08 csv files
    #[clap(required = true)]
    inputs: Vec<String>,

    /// Output GeoJSON path
    #[clap(short, long)]
    output: String,

    /// Optional per-footprint summary csv
    #[clap(long)]
    summary: Option<String>,

    /// Segment kind: ATL08-20m or ATL08-100m
    #[clap(short, long, default_value = "ATL08-20m")]
    segment_kind: String,

    /// Footprint width in meters (defaults to the segment kind's)
    #[clap(long)]
    width: Option<f64>,

    /// Footprint length in meters (defaults to the segment kind's)
    #[clap(long)]
    length: Option<f64>,

    /// Column identifying a ground track, repeat for compound keys
    #[clap(long = "track-field", default_value = "gt")]
    track_fields: Vec<String>,

    /// Lon/lat extent to keep
    #[clap(long, num_args = 4, value_names = ["XMIN", "YMIN", "XMAX", "YMAX"], allow_negative_numbers = true)]
    bbox: Option<Vec<f64>>,

    /// Keep footprints in their UTM zone instead of EPSG:4326
    #[clap(long, default_value = "false")]
    utm: bool,

    /// Number of CPU threads
    #[clap(short, long, default_value = "4")]
    ncpu: usize,
}

fn main() -> Result<(), Report<FootprintError>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts: Opts = Opts::parse();

    if let Err(e) = ThreadPoolBuilder::new().num_threads(opts.ncpu).build_global() {
        warn!("could not configure thread pool: {}", e);
    }

    let config = FootprintConfig {
        segment_kind: opts.segment_kind.parse::<SegmentKind>()?,
        width: opts.width,
        length: opts.length,
        track_fields: opts.track_fields,
        extent: opts.bbox.map(|b| [b[0], b[1], b[2], b[3]]),
        return_source_crs: !opts.utm,
    };
    config.validate()?;

    info!("{} footprints {} x {} m", config.segment_kind, config.width(), config.length());

    let mut shots = Vec::new();
    for input in &opts.inputs {
        shots.extend(read_shots(input, &config)?);
    }

    let runs = group_by_track(shots, &config.track_fields);
    info!("{} tracks in {} files", runs.len(), opts.inputs.len());

    let results = footprints_for_runs(&runs, &config);

    write_geojson(&results, &config, &opts.output)?;
    if let Some(summary) = &opts.summary {
        write_summary_csv(&results, summary)?;
    }

    Ok(())
}
