use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::metrics::mo2::CycleSummary;

/// Column order of the exported results table.
pub const SUMMARY_HEADER: [&str; 7] = ["slope", "R2", "start", "MO2", "mass", "meanTemp", "sdTemp"];

/// Write one row per cycle, in index order, after the fixed header.
pub fn write_summaries<W: Write>(
    writer: W,
    summaries: &BTreeMap<usize, CycleSummary>,
) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(SUMMARY_HEADER)?;
    for (index, summary) in summaries {
        writer
            .serialize(summary)
            .with_context(|| format!("writing summary of cycle {}", index))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summaries_csv(path: &Path, summaries: &BTreeMap<usize, CycleSummary>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_summaries(file, summaries)
}

/// Read a results table back. Rows are keyed by their position.
pub fn read_summaries<R: Read>(reader: R) -> Result<BTreeMap<usize, CycleSummary>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);
    let headers = reader.headers().context("reading header")?.clone();
    if !headers.iter().eq(SUMMARY_HEADER.iter().copied()) {
        anyhow::bail!(
            "unexpected summary header {:?}, expected {:?}",
            headers.iter().collect::<Vec<_>>(),
            SUMMARY_HEADER
        );
    }
    let mut summaries = BTreeMap::new();
    for (index, row) in reader.deserialize::<CycleSummary>().enumerate() {
        let summary = row.with_context(|| format!("parsing summary row {}", index + 1))?;
        summaries.insert(index, summary);
    }
    Ok(summaries)
}

pub fn read_summaries_csv(path: &Path) -> Result<BTreeMap<usize, CycleSummary>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_summaries(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn summaries() -> BTreeMap<usize, CycleSummary> {
        let mut map = BTreeMap::new();
        map.insert(
            0,
            CycleSummary {
                slope: -0.0016666666666666668,
                r2: 0.9987654321,
                start: "14/03/16 10:00:00".into(),
                mo2: 54.0,
                mass: 0.5,
                mean_temp: 15.133333333333333,
                sd_temp: 0.04714045207910317,
            },
        );
        map.insert(
            1,
            CycleSummary {
                slope: 0.0,
                r2: f64::NAN,
                start: "14/03/16 10:10:01".into(),
                mo2: -0.0,
                mass: 0.5,
                mean_temp: 15.2,
                sd_temp: 0.0,
            },
        );
        map
    }

    #[test]
    fn writes_fixed_header_even_when_empty() {
        let mut out = Vec::new();
        write_summaries(&mut out, &BTreeMap::new()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "slope,R2,start,MO2,mass,meanTemp,sdTemp\n"
        );
    }

    #[test]
    fn table_survives_a_trip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let written = summaries();
        write_summaries_csv(&path, &written).unwrap();
        let read = read_summaries_csv(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[&0], written[&0]);
        let second = &read[&1];
        assert!(second.r2.is_nan());
        assert_eq!(second.start, "14/03/16 10:10:01");
        assert_eq!(second.mean_temp, 15.2);
    }

    #[test]
    fn rejects_foreign_tables() {
        let text = "a,b,c\n1,2,3\n";
        assert!(read_summaries(text.as_bytes()).is_err());
    }
}
