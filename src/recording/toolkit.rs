//! Readers for the external toolkit's plain-text output formats.
//!
//! The toolkit writes one spike file per run, with one line per time bin:
//! a timestamp followed by the ids of the units that spiked in that bin,
//! e.g.
//!
//! ```text
//! 19.300000000000  28 2813 23723
//! 19.310000000000
//! 19.320000000000  2909 6078 7175
//! ```
//!
//! A final line carrying only a timestamp marks the stop time. Lines
//! starting with `#` are comments. Analog state is written to companion
//! per-population files of comma-separated rows: unit id, time, then one
//! column per recorded signal.
use itertools::Itertools;
use log;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::SimError;
use crate::recording::{AnalogSignal, Segment, SpikeTrain};

/// Read a toolkit spike file into a segment. Spike times are grouped per
/// unit id; the last timestamp seen becomes the segment's stop time.
/// Malformed lines are skipped with a warning; only the file-open failure
/// is fatal.
pub fn read_spike_file<P: AsRef<Path>>(path: P, name: &str) -> Result<Segment, SimError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SimError::IOError(format!("cannot open {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    let mut spike_times: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    let mut t_stop = 0.0;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SimError::IOError(e.to_string()))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let mut entries = line.split_whitespace();
        let time: f64 = match entries.next().unwrap_or("").parse() {
            Ok(time) => time,
            Err(_) => {
                log::warn!(
                    "{}:{}: unparseable timestamp, skipping line",
                    path.display(),
                    lineno + 1
                );
                continue;
            }
        };
        t_stop = time;
        for entry in entries {
            match entry.parse::<usize>() {
                Ok(id) => spike_times.entry(id).or_default().push(time),
                Err(_) => log::warn!(
                    "{}:{}: unparseable unit id {:?}, skipping entry",
                    path.display(),
                    lineno + 1,
                    entry
                ),
            }
        }
    }

    let mut segment = Segment::new(name);
    segment.spiketrains = spike_times
        .into_iter()
        .map(|(id, times)| SpikeTrain::new(id, times, 0.0, t_stop))
        .collect();
    Ok(segment)
}

/// Read a toolkit analog state file into one signal per value column.
///
/// Rows are grouped by unit id. Some engines emit a state twice at regime
/// transitions, so repeated timestamps keep the first occurrence only. The
/// sampling interval must be uniform; units whose signals differ in length
/// are truncated to the shortest with a warning.
pub fn read_state_file<P: AsRef<Path>>(
    path: P,
    signal_names: &[&str],
    signal_units: &[&str],
) -> Result<Vec<AnalogSignal>, SimError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SimError::IOError(format!("cannot open {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    // per unit: deduplicated sample times and one value row per column
    let mut times_by_id: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    let mut values_by_id: BTreeMap<usize, Vec<Vec<f64>>> = BTreeMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SimError::IOError(e.to_string()))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 3 {
            log::warn!(
                "{}:{}: expected at least 3 columns, skipping row",
                path.display(),
                lineno + 1
            );
            continue;
        }
        let parsed: Option<(usize, f64, Vec<f64>)> = (|| {
            let id = fields[0].parse::<f64>().ok()? as usize;
            let time = fields[1].parse::<f64>().ok()?;
            let values = fields[2..]
                .iter()
                .map(|f| f.parse::<f64>().ok())
                .collect::<Option<Vec<f64>>>()?;
            Some((id, time, values))
        })();
        let (id, time, values) = match parsed {
            Some(row) => row,
            None => {
                log::warn!(
                    "{}:{}: unparseable row, skipping",
                    path.display(),
                    lineno + 1
                );
                continue;
            }
        };
        let times = times_by_id.entry(id).or_default();
        // keep the first occurrence of a repeated timestamp
        if times.last() == Some(&time) {
            continue;
        }
        times.push(time);
        values_by_id
            .entry(id)
            .or_insert_with(|| vec![Vec::new(); values.len()])
            .iter_mut()
            .zip(values)
            .for_each(|(column, value)| column.push(value));
    }

    let Some(first_times) = times_by_id.values().next() else {
        return Err(SimError::ParseError(format!(
            "{} contains no data rows",
            path.display()
        )));
    };
    let t_start = first_times.first().copied().unwrap_or(0.0);
    let sampling_period = sampling_period(&times_by_id, path)?;

    let min_length = times_by_id.values().map(|t| t.len()).min().unwrap_or(0);
    let max_length = times_by_id.values().map(|t| t.len()).max().unwrap_or(0);
    if min_length != max_length {
        log::warn!(
            "{}: signals have different lengths (min = {}, max = {}); truncating to {}",
            path.display(),
            min_length,
            max_length,
            min_length
        );
    }

    // a ragged file narrows every signal to the columns all units share
    let num_columns = values_by_id.values().map(|c| c.len()).min().unwrap_or(0);
    let source_ids: Vec<usize> = values_by_id.keys().copied().collect();
    let signals = (0..num_columns)
        .map(|column| {
            let default_name = format!("signal{}", column);
            AnalogSignal {
                name: signal_names.get(column).map_or(default_name, |n| n.to_string()),
                units: signal_units.get(column).unwrap_or(&"mV").to_string(),
                t_start,
                sampling_period,
                source_ids: source_ids.clone(),
                values: values_by_id
                    .values()
                    .map(|columns| columns[column][..min_length].to_vec())
                    .collect(),
            }
        })
        .collect();
    Ok(signals)
}

/// The common sampling interval of all units in a state file. A
/// non-uniform interval is unrecoverable.
fn sampling_period(
    times_by_id: &BTreeMap<usize, Vec<f64>>,
    path: &Path,
) -> Result<f64, SimError> {
    const TOL: f64 = 1e-9;
    let mut period = None;
    for times in times_by_id.values() {
        for (a, b) in times.iter().tuple_windows() {
            let dt = b - a;
            match period {
                None => period = Some(dt),
                Some(p) if (dt - p).abs() > TOL => {
                    return Err(SimError::ParseError(format!(
                        "{}: non-uniform sampling interval ({} vs {})",
                        path.display(),
                        p,
                        dt
                    )))
                }
                _ => {}
            }
        }
    }
    period.ok_or_else(|| {
        SimError::ParseError(format!(
            "{}: too few samples to determine the sampling interval",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_read_spike_file() {
        let file = write_file("10.0 1 2\n10.1\n10.2 2\n10.2\n");
        let segment = read_spike_file(file.path(), "all").unwrap();
        assert_eq!(segment.spiketrains.len(), 2);
        let train1 = &segment.spiketrains[0];
        let train2 = &segment.spiketrains[1];
        assert_eq!((train1.source_id, train1.times.clone()), (1, vec![10.0]));
        assert_eq!(
            (train2.source_id, train2.times.clone()),
            (2, vec![10.0, 10.2])
        );
        assert_eq!(train2.t_stop, 10.2);
    }

    #[test]
    fn test_spike_file_comments_and_bad_lines_are_skipped() {
        let file = write_file("# header\n10.0 1\nnot-a-time 2\n10.5 oops 3\n11.0\n");
        let segment = read_spike_file(file.path(), "all").unwrap();
        // unit 3 still collected from the partially malformed line
        let ids: Vec<usize> = segment.spiketrains.iter().map(|st| st.source_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(segment.spiketrains[0].t_stop, 11.0);
    }

    #[test]
    fn test_spike_file_times_are_ascending() {
        let file = write_file("10.0 7\n10.1 7\n10.4 7\n10.4\n");
        let segment = read_spike_file(file.path(), "all").unwrap();
        let times = &segment.spiketrains[0].times;
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_read_state_file() {
        let file = write_file(
            "0, 0.0, -65.0\n0, 0.1, -64.0\n1, 0.0, -65.0\n1, 0.1, -63.5\n",
        );
        let signals = read_state_file(file.path(), &["v"], &["mV"]).unwrap();
        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.name, "v");
        assert_eq!(signal.source_ids, vec![0, 1]);
        assert!((signal.sampling_period - 0.1).abs() < 1e-12);
        assert_eq!(signal.values[1], vec![-65.0, -63.5]);
    }

    #[test]
    fn test_state_file_keeps_first_of_duplicate_timestamps() {
        let file = write_file(
            "0, 0.0, -65.0\n0, 0.1, -64.0\n0, 0.1, -99.0\n0, 0.2, -63.0\n",
        );
        let signals = read_state_file(file.path(), &[], &[]).unwrap();
        assert_eq!(signals[0].values[0], vec![-65.0, -64.0, -63.0]);
    }

    #[test]
    fn test_state_file_truncates_to_shortest_signal() {
        let file = write_file(
            "0, 0.0, 1.0\n0, 0.1, 2.0\n0, 0.2, 3.0\n1, 0.0, 4.0\n1, 0.1, 5.0\n",
        );
        let signals = read_state_file(file.path(), &[], &[]).unwrap();
        assert_eq!(signals[0].values[0], vec![1.0, 2.0]);
        assert_eq!(signals[0].values[1], vec![4.0, 5.0]);
    }

    #[test]
    fn test_state_file_rejects_nonuniform_sampling() {
        let file = write_file("0, 0.0, 1.0\n0, 0.1, 2.0\n0, 0.4, 3.0\n");
        assert!(matches!(
            read_state_file(file.path(), &[], &[]),
            Err(SimError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        assert!(matches!(
            read_spike_file("/no/such/spikes.dat", "all"),
            Err(SimError::IOError(_))
        ));
    }
}
