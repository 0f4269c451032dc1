//! Readers for the native engine's raw recorder output.
//!
//! Spike recorders write one row per event, `<sender id> <time>`;
//! multimeters write `<sender id> <time> <value>` rows at the recording
//! interval. Both may carry `#` comment headers.
use log;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::SimError;
use crate::recording::{AnalogSignal, SpikeTrain};

/// Read spike recorder rows, grouped into one train per sender.
/// The recorder does not mark the end of the run, so the recording window
/// is supplied by the caller.
pub fn read_spike_rows<P: AsRef<Path>>(
    path: P,
    t_stop: f64,
) -> Result<Vec<SpikeTrain>, SimError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SimError::IOError(format!("cannot open {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    let mut spike_times: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SimError::IOError(e.to_string()))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let parsed = (fields.len() == 2)
            .then(|| Some((fields[0].parse::<usize>().ok()?, fields[1].parse::<f64>().ok()?)))
            .flatten();
        match parsed {
            Some((sender, time)) => spike_times.entry(sender).or_default().push(time),
            None => log::warn!(
                "{}:{}: malformed spike row, skipping",
                path.display(),
                lineno + 1
            ),
        }
    }
    Ok(spike_times
        .into_iter()
        .map(|(id, times)| SpikeTrain::new(id, times, 0.0, t_stop))
        .collect())
}

/// Read multimeter rows into one analog signal.
pub fn read_multimeter_rows<P: AsRef<Path>>(
    path: P,
    name: &str,
    units: &str,
) -> Result<AnalogSignal, SimError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SimError::IOError(format!("cannot open {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    let mut times_by_id: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    let mut values_by_id: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SimError::IOError(e.to_string()))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let parsed = (fields.len() == 3)
            .then(|| {
                Some((
                    fields[0].parse::<usize>().ok()?,
                    fields[1].parse::<f64>().ok()?,
                    fields[2].parse::<f64>().ok()?,
                ))
            })
            .flatten();
        match parsed {
            Some((sender, time, value)) => {
                times_by_id.entry(sender).or_default().push(time);
                values_by_id.entry(sender).or_default().push(value);
            }
            None => log::warn!(
                "{}:{}: malformed multimeter row, skipping",
                path.display(),
                lineno + 1
            ),
        }
    }

    let Some(first_times) = times_by_id.values().next() else {
        return Err(SimError::ParseError(format!(
            "{} contains no data rows",
            path.display()
        )));
    };
    let t_start = first_times.first().copied().unwrap_or(0.0);
    let sampling_period = if first_times.len() > 1 {
        first_times[1] - first_times[0]
    } else {
        0.0
    };
    let min_length = values_by_id.values().map(|v| v.len()).min().unwrap_or(0);
    let max_length = values_by_id.values().map(|v| v.len()).max().unwrap_or(0);
    if min_length != max_length {
        log::warn!(
            "{}: multimeter rows have different lengths (min = {}, max = {}); truncating",
            path.display(),
            min_length,
            max_length
        );
    }

    Ok(AnalogSignal {
        name: name.to_string(),
        units: units.to_string(),
        t_start,
        sampling_period,
        source_ids: values_by_id.keys().copied().collect(),
        values: values_by_id
            .values()
            .map(|v| v[..min_length].to_vec())
            .collect(),
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
    fn test_read_spike_rows() {
        let file = write_file("# sender time\n3 10.5\n1 2.0\n3 4.25\n");
        let trains = read_spike_rows(file.path(), 100.0).unwrap();
        assert_eq!(trains.len(), 2);
        assert_eq!(trains[0].source_id, 1);
        assert_eq!(trains[1].times, vec![4.25, 10.5]);
        assert_eq!(trains[1].t_stop, 100.0);
    }

    #[test]
    fn test_read_multimeter_rows() {
        let file = write_file("1 0.1 -65.0\n2 0.1 -65.0\n1 0.2 -64.0\n2 0.2 -63.0\n");
        let signal = read_multimeter_rows(file.path(), "V_m", "mV").unwrap();
        assert_eq!(signal.source_ids, vec![1, 2]);
        assert!((signal.sampling_period - 0.1).abs() < 1e-12);
        assert_eq!(signal.values[1], vec![-65.0, -63.0]);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let file = write_file("1 0.1 -65.0\nbroken row here?\n1 0.2 -64.0\n");
        let signal = read_multimeter_rows(file.path(), "V_m", "mV").unwrap();
        assert_eq!(signal.values[0].len(), 2);
    }
}
