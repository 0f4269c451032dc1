//! Activity figures: raster and instantaneous-rate panels per population.
use log;
use plotters::prelude::*;
use std::path::Path;

use crate::analysis::instantaneous_firing_rate;
use crate::error::SimError;
use crate::recording::SegmentMap;

const PANEL_WIDTH: u32 = 1000;
const PANEL_HEIGHT: u32 = 180;

fn draw_error<E: std::error::Error>(e: E) -> SimError {
    SimError::IOError(format!("plotting failed: {}", e))
}

/// Render one run's recorded activity to a PNG: for every population with
/// recorded spikes, a raster panel over the plot window and the
/// instantaneous firing rate below it.
pub fn activity_figure<P: AsRef<Path>>(
    segments: &SegmentMap,
    limits: (f64, f64),
    path: P,
) -> Result<(), SimError> {
    let path = path.as_ref();
    let (t_min, t_max) = limits;
    if t_max <= t_min {
        return Err(SimError::InvalidParameter(format!(
            "plot limits must be increasing (got {} and {})",
            t_min, t_max
        )));
    }
    let populations: Vec<_> = segments
        .values()
        .filter(|segment| !segment.spiketrains.is_empty())
        .collect();
    if populations.is_empty() {
        return Err(SimError::InvalidParameter(
            "nothing recorded; no figure to draw".to_string(),
        ));
    }

    let height = 2 * PANEL_HEIGHT * populations.len() as u32;
    let root = BitMapBackend::new(path, (PANEL_WIDTH, height)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_error)?;
    let areas = root.split_evenly((2 * populations.len(), 1));

    for (index, segment) in populations.iter().enumerate() {
        let num_trains = segment.spiketrains.len();

        let mut raster = ChartBuilder::on(&areas[2 * index])
            .caption(&segment.name, ("sans-serif", 16))
            .margin(10)
            .x_label_area_size(20)
            .y_label_area_size(40)
            .build_cartesian_2d(t_min..t_max, -0.5..(num_trains as f64 - 0.5))
            .map_err(draw_error)?;
        raster
            .configure_mesh()
            .disable_mesh()
            .y_desc("unit")
            .draw()
            .map_err(draw_error)?;
        for (row, train) in segment.spiketrains.iter().enumerate() {
            raster
                .draw_series(
                    train
                        .times
                        .iter()
                        .filter(|&&t| t >= t_min && t <= t_max)
                        .map(|&t| Circle::new((t, row as f64), 1, BLACK.filled())),
                )
                .map_err(draw_error)?;
        }

        let rate = instantaneous_firing_rate(segment, t_min, t_max);
        let max_rate = rate.values[0].iter().cloned().fold(1.0, f64::max);
        let mut rate_chart = ChartBuilder::on(&areas[2 * index + 1])
            .margin(10)
            .x_label_area_size(25)
            .y_label_area_size(40)
            .build_cartesian_2d(t_min..t_max, 0.0..max_rate)
            .map_err(draw_error)?;
        rate_chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("time (ms)")
            .y_desc("rate (Hz)")
            .draw()
            .map_err(draw_error)?;
        rate_chart
            .draw_series(LineSeries::new(
                rate.values[0]
                    .iter()
                    .enumerate()
                    .map(|(bin, &r)| (t_min + bin as f64 * rate.sampling_period, r)),
                &RGBColor(100, 100, 100),
            ))
            .map_err(draw_error)?;
    }

    root.present().map_err(draw_error)?;
    log::info!("Wrote figure to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Segment, SegmentMap, SpikeTrain};

    #[test]
    fn test_activity_figure_writes_a_png() {
        let mut segments = SegmentMap::new();
        let mut segment = Segment::new("exc");
        segment.spiketrains = (0..10)
            .map(|id| {
                SpikeTrain::new(
                    id,
                    (0..20).map(|k| 5.0 * k as f64 + id as f64 * 0.2).collect(),
                    0.0,
                    100.0,
                )
            })
            .collect();
        segments.insert("exc".to_string(), segment);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figure.png");
        activity_figure(&segments, (0.0, 100.0), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_activity_figure_rejects_empty_recordings() {
        let segments = SegmentMap::new();
        let dir = tempfile::tempdir().unwrap();
        assert!(activity_figure(&segments, (0.0, 100.0), dir.path().join("f.png")).is_err());
    }

    #[test]
    fn test_activity_figure_rejects_bad_limits() {
        let segments = SegmentMap::new();
        let dir = tempfile::tempdir().unwrap();
        assert!(activity_figure(&segments, (100.0, 0.0), dir.path().join("f.png")).is_err());
    }
}
