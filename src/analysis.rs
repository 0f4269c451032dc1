//! Spike train statistics over single runs and sweep results.
use log;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SimError;
use crate::recording::{load_segments, AnalogSignal, Segment, SegmentMap};

/// Bin width of the instantaneous firing rate (ms).
pub const BIN_WIDTH: f64 = 0.1;

/// Instantaneous firing rate of a segment between `begin` and `end` (ms),
/// computed as the spike count across all trains in 0.1 ms bins, scaled to
/// Hz per neuron.
pub fn instantaneous_firing_rate(segment: &Segment, begin: f64, end: f64) -> AnalogSignal {
    let num_bins = ((end - begin) / BIN_WIDTH).round().max(0.0) as usize;
    let mut hist = vec![0.0; num_bins];
    for train in &segment.spiketrains {
        for &t in &train.times {
            if t >= begin && t < end {
                let bin = ((t - begin) / BIN_WIDTH) as usize;
                if bin < num_bins {
                    hist[bin] += 1.0;
                }
            }
        }
    }
    let num_trains = segment.spiketrains.len().max(1) as f64;
    for count in hist.iter_mut() {
        *count *= 1000.0 / BIN_WIDTH / num_trains;
    }
    AnalogSignal {
        name: "Instantaneous firing rate".to_string(),
        units: "Hz".to_string(),
        t_start: begin,
        sampling_period: BIN_WIDTH,
        source_ids: vec![0],
        values: vec![hist],
    }
}

/// Mean firing rate of a segment (Hz): total spikes per train per second
/// of recording.
pub fn mean_firing_rate(segment: &Segment) -> Result<f64, SimError> {
    let duration = segment.duration().ok_or_else(|| {
        SimError::InvalidParameter(format!("segment {} has no spike trains", segment.name))
    })?;
    if duration <= 0.0 {
        return Err(SimError::InvalidParameter(format!(
            "segment {} has an empty recording window",
            segment.name
        )));
    }
    let n = segment.num_spikes() as f64;
    Ok(n / segment.spiketrains.len() as f64 / (duration / 1000.0))
}

/// Coefficient of variation of the inter-spike intervals, averaged over
/// the trains with at least two spikes. `None` if no train qualifies.
pub fn isi_cv(segment: &Segment) -> Option<f64> {
    let cvs: Vec<f64> = segment
        .spiketrains
        .iter()
        .filter(|train| train.len() >= 2)
        .filter_map(|train| {
            let intervals: Vec<f64> = train.times.windows(2).map(|w| w[1] - w[0]).collect();
            let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
            if mean <= 0.0 {
                return None;
            }
            let var = intervals
                .iter()
                .map(|isi| (isi - mean).powi(2))
                .sum::<f64>()
                / intervals.len() as f64;
            Some(var.sqrt() / mean)
        })
        .collect();
    if cvs.is_empty() {
        None
    } else {
        Some(cvs.iter().sum::<f64>() / cvs.len() as f64)
    }
}

/// All spike trains of a run merged into one segment, for statistics over
/// whatever the recording scheme produced.
pub fn merged_segment(segments: &SegmentMap) -> Segment {
    let mut merged = Segment::new("merged");
    for segment in segments.values() {
        merged.spiketrains.extend(segment.spiketrains.clone());
    }
    merged
}

/// One line of the sweep statistics table.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    /// The sweep point's identifying parameter values, verbatim.
    pub values: Vec<String>,
    pub output_file: String,
    pub mean_rate: f64,
    pub isi_cv: Option<f64>,
    pub num_spikes: usize,
}

/// Compute spike train statistics for every run recorded in a sweep index
/// and write them to `statistics.csv` in the same directory. Unreadable
/// result files are skipped with a warning; the index being unreadable is
/// fatal.
pub fn sweep_statistics(results_dir: &Path) -> Result<PathBuf, SimError> {
    let index_path = results_dir.join("sweeps.csv");
    let index = File::open(&index_path)
        .map_err(|e| SimError::IOError(format!("cannot open {}: {}", index_path.display(), e)))?;
    let lines: Vec<String> = BufReader::new(index)
        .lines()
        .collect::<Result<_, _>>()
        .map_err(|e| SimError::IOError(e.to_string()))?;

    let statistics: Vec<RunStatistics> = lines
        .par_iter()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (output_file, values) = fields.split_last()?;
            match run_statistics(output_file, values) {
                Ok(stats) => Some(stats),
                Err(e) => {
                    log::warn!("Skipping {}: {}", output_file, e);
                    None
                }
            }
        })
        .collect();

    let statistics_path = results_dir.join("statistics.csv");
    let file = File::create(&statistics_path).map_err(|e| {
        SimError::IOError(format!("cannot create {}: {}", statistics_path.display(), e))
    })?;
    let mut writer = BufWriter::new(file);
    for stats in &statistics {
        writeln!(
            writer,
            "{} {} {:.6} {:.6} {}",
            stats.values.join(" "),
            stats.output_file,
            stats.mean_rate,
            stats.isi_cv.unwrap_or(f64::NAN),
            stats.num_spikes,
        )
        .map_err(|e| SimError::IOError(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| SimError::IOError(e.to_string()))?;
    log::info!(
        "Wrote statistics for {} runs to {}",
        statistics.len(),
        statistics_path.display()
    );
    Ok(statistics_path)
}

fn run_statistics(output_file: &str, values: &[&str]) -> Result<RunStatistics, SimError> {
    let segments = load_segments(output_file)?;
    let merged = merged_segment(&segments);
    Ok(RunStatistics {
        values: values.iter().map(|v| v.to_string()).collect(),
        output_file: output_file.to_string(),
        mean_rate: mean_firing_rate(&merged)?,
        isi_cv: isi_cv(&merged),
        num_spikes: merged.num_spikes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{save_segments, SpikeTrain};

    fn segment_with(trains: Vec<(usize, Vec<f64>)>, t_stop: f64) -> Segment {
        let mut segment = Segment::new("test");
        segment.spiketrains = trains
            .into_iter()
            .map(|(id, times)| SpikeTrain::new(id, times, 0.0, t_stop))
            .collect();
        segment
    }

    #[test]
    fn test_mean_firing_rate() {
        // 2 units, 10 spikes, 1 second: 10 / 2 / 1 = 5 Hz
        let segment = segment_with(
            vec![
                (0, vec![100.0, 200.0, 300.0, 400.0, 500.0, 600.0]),
                (1, vec![250.0, 500.0, 750.0, 999.0]),
            ],
            1000.0,
        );
        assert!((mean_firing_rate(&segment).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_firing_rate_without_trains_is_an_error() {
        let segment = Segment::new("empty");
        assert!(mean_firing_rate(&segment).is_err());
    }

    #[test]
    fn test_instantaneous_firing_rate() {
        let segment = segment_with(vec![(0, vec![0.05, 1.25]), (1, vec![0.05])], 10.0);
        let rate = instantaneous_firing_rate(&segment, 0.0, 2.0);
        assert_eq!(rate.values[0].len(), 20);
        // two spikes in the first bin, two trains: 2 * 1000/0.1/2 = 10000 Hz
        assert!((rate.values[0][0] - 10_000.0).abs() < 1e-9);
        assert!((rate.values[0][12] - 5_000.0).abs() < 1e-9);
        assert_eq!(rate.values[0][1], 0.0);
    }

    #[test]
    fn test_isi_cv_of_regular_train_is_zero() {
        let segment = segment_with(vec![(0, vec![10.0, 20.0, 30.0, 40.0])], 100.0);
        assert!(isi_cv(&segment).unwrap().abs() < 1e-12);
        let empty = segment_with(vec![(0, vec![10.0])], 100.0);
        assert_eq!(isi_cv(&empty), None);
    }

    #[test]
    fn test_sweep_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = String::new();
        for (i, seed) in [1u64, 2, 3].iter().enumerate() {
            let output = dir.path().join(format!("run_{}.json", i));
            let mut segments = SegmentMap::new();
            segments.insert(
                "all".to_string(),
                segment_with(vec![(0, vec![100.0, 200.0]), (1, vec![300.0])], 1000.0),
            );
            save_segments(&segments, &output).unwrap();
            index.push_str(&format!("{} {}\n", seed, output.display()));
        }
        // one unreadable entry is skipped, not fatal
        index.push_str(&format!("4 {}\n", dir.path().join("missing.json").display()));
        std::fs::write(dir.path().join("sweeps.csv"), index).unwrap();

        let path = sweep_statistics(dir.path()).unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        let rows: Vec<&str> = written.lines().collect();
        assert_eq!(rows.len(), 3);
        // 3 spikes, 2 trains, 1 s -> 1.5 Hz
        assert!(rows[0].contains("1.500000"));
        assert!(rows[0].starts_with('1'));
    }
}
