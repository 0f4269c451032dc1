//! Simulator-independent containers for recorded data.
//!
//! A [`Segment`] holds one run's spike trains and analog signals for one
//! population, whichever engine produced them. Backends normalise their
//! native output into segments; the writers and readers below persist and
//! reload them without loss.
pub mod native;
pub mod toolkit;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::SimError;

/// The spike times of one recorded unit, in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeTrain {
    pub source_id: usize,
    pub times: Vec<f64>,
    /// Recording window start (ms).
    pub t_start: f64,
    /// Recording window stop (ms).
    pub t_stop: f64,
}

impl SpikeTrain {
    /// Create a spike train, sorting the times into ascending order.
    pub fn new(source_id: usize, mut times: Vec<f64>, t_start: f64, t_stop: f64) -> Self {
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        SpikeTrain {
            source_id,
            times,
            t_start,
            t_stop,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// A multi-channel analog signal sampled at a uniform interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogSignal {
    pub name: String,
    pub units: String,
    /// Time of the first sample (ms).
    pub t_start: f64,
    /// Sampling interval (ms).
    pub sampling_period: f64,
    /// Recorded unit ids, one per row of `values`.
    pub source_ids: Vec<usize>,
    /// One row of samples per recorded unit.
    pub values: Vec<Vec<f64>>,
}

/// One population's recorded data from one run. Created after the run
/// completes; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub spiketrains: Vec<SpikeTrain>,
    pub signals: Vec<AnalogSignal>,
}

impl Segment {
    pub fn new(name: &str) -> Self {
        Segment {
            name: name.to_string(),
            spiketrains: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// Total number of spikes across all trains.
    pub fn num_spikes(&self) -> usize {
        self.spiketrains.iter().map(|st| st.len()).sum()
    }

    /// Length of the recording window (ms), taken from the spike trains.
    pub fn duration(&self) -> Option<f64> {
        self.spiketrains
            .first()
            .map(|st| st.t_stop - st.t_start)
    }
}

/// The per-population segments of one run, keyed by population label.
pub type SegmentMap = BTreeMap<String, Segment>;

/// Persist a run's segments to the result file.
pub fn save_segments<P: AsRef<Path>>(segments: &SegmentMap, path: P) -> Result<(), SimError> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| SimError::IOError(format!("cannot create {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, segments).map_err(|e| SimError::IOError(e.to_string()))?;
    writer.flush().map_err(|e| SimError::IOError(e.to_string()))
}

/// Load a run's segments back from a result file.
pub fn load_segments<P: AsRef<Path>>(path: P) -> Result<SegmentMap, SimError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SimError::IOError(format!("cannot open {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| SimError::ParseError(format!("cannot parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn sample_segments() -> SegmentMap {
        let mut segment = Segment::new("exc");
        segment.spiketrains = vec![
            SpikeTrain::new(3, vec![12.5, 1.0, 7.25], 0.0, 1000.0),
            SpikeTrain::new(5, vec![], 0.0, 1000.0),
        ];
        segment.signals = vec![AnalogSignal {
            name: "v".to_string(),
            units: "mV".to_string(),
            t_start: 0.0,
            sampling_period: 0.1,
            source_ids: vec![3, 5],
            values: vec![vec![0.0, 0.5, 1.25], vec![0.0, -0.5, -1.0]],
        }];
        let mut segments = SegmentMap::new();
        segments.insert("exc".to_string(), segment);
        segments
    }

    #[test]
    fn test_spike_train_is_sorted() {
        let train = SpikeTrain::new(0, vec![3.0, 1.0, 2.0], 0.0, 10.0);
        assert_eq!(train.times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let segments = sample_segments();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.json");
        save_segments(&segments, &path).unwrap();
        let read_back = load_segments(&path).unwrap();
        assert_eq!(read_back, segments);

        let segment = &read_back["exc"];
        let ids: Vec<usize> = segment.spiketrains.iter().map(|st| st.source_id).collect();
        assert_eq!(ids, vec![3, 5]);
        assert_eq!(segment.num_spikes(), 3);
        assert_eq!(segment.signals[0].values[0][2], 1.25);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(
            load_segments("/no/such/segments.json"),
            Err(SimError::IOError(_))
        ));
    }
}
