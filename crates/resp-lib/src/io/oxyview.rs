use anyhow::{Context, Result};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::sample::RawSample;

const FIELD_SEPARATOR: char = ';';
const DATA_FIELDS: usize = 7;
const OXYGEN_FIELD: usize = 3;
const TEMPERATURE_FIELD: usize = 6;

/// Parse one line of an OxyView (PST3) export.
///
/// Data rows carry seven `;`-separated fields: date, time, three decimals
/// (log time, oxygen, phase), an integer amplitude and the temperature. Only
/// date, time, oxygen and temperature are kept. Anything else (header, units
/// row, blank line, truncated record) yields `None`.
pub fn parse_line(line: &str) -> Option<RawSample> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
    if fields.len() < DATA_FIELDS {
        return None;
    }
    let shaped = is_clock_field(fields[0], '/')
        && is_clock_field(fields[1], ':')
        && fields[2..5].iter().all(|f| is_decimal(f))
        && is_integer(fields[5])
        && is_decimal(fields[6]);
    if !shaped {
        return None;
    }
    let oxygen = fields[OXYGEN_FIELD].parse::<f64>().ok()?;
    let temperature = fields[TEMPERATURE_FIELD].parse::<f64>().ok()?;
    RawSample::new(fields[0], fields[1], oxygen, temperature)
}

fn is_integer(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}

fn is_decimal(field: &str) -> bool {
    match field.split_once('.') {
        Some((whole, frac)) => is_integer(whole) && is_integer(frac),
        None => false,
    }
}

/// Three digit groups joined by `sep`, e.g. `14/03/16` or `10:00:00`.
fn is_clock_field(field: &str, sep: char) -> bool {
    let parts: Vec<&str> = field.split(sep).collect();
    parts.len() == 3 && parts.iter().all(|p| is_integer(p))
}

/// Streams data rows out of a log, skipping everything that is not one.
///
/// Lines are decoded lossily since instrument headers are not always UTF-8.
pub struct LogReader<R> {
    reader: R,
    buf: Vec<u8>,
    line_no: usize,
    skipped: usize,
}

impl<R: BufRead> LogReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Lines seen so far that were not data rows.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for LogReader<R> {
    type Item = Result<RawSample>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    return Some(
                        Err::<RawSample, _>(err)
                            .with_context(|| format!("reading line {}", self.line_no + 1)),
                    )
                }
            }
            self.line_no += 1;
            let line = String::from_utf8_lossy(&self.buf);
            match parse_line(&line) {
                Some(sample) => return Some(Ok(sample)),
                None => {
                    if !line.trim().is_empty() {
                        debug!("line {}: not a data row, skipped", self.line_no);
                    }
                    self.skipped += 1;
                }
            }
        }
    }
}

pub fn open_log(path: &Path) -> Result<LogReader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(LogReader::new(BufReader::new(file)))
}

/// Read every data row of a log into memory.
pub fn read_log(path: &Path) -> Result<Vec<RawSample>> {
    open_log(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    const ROW: &str = "14/03/16; 10:00:00;   0.00;   8.512;   27.31;   2384;   15.1;";

    #[test]
    fn keeps_date_time_oxygen_and_temperature() {
        let sample = parse_line(ROW).expect("data row");
        assert_eq!(sample.date, "14/03/16");
        assert_eq!(sample.time, "10:00:00");
        assert!((sample.oxygen - 8.512).abs() < 1e-12);
        assert!((sample.temperature - 15.1).abs() < 1e-12);
    }

    #[test]
    fn skips_headers_and_malformed_rows() {
        assert!(parse_line("").is_none());
        assert!(parse_line("Date;Time;LogTime;Oxygen;Phase;Amp;Temp;").is_none());
        assert!(parse_line("dd/mm/yy;hh:mm:ss;min;mg/L;deg;;degC;").is_none());
        // amplitude must be an integer
        assert!(parse_line("14/03/16; 10:00:00; 0.00; 8.512; 27.31; 23.84; 15.1;").is_none());
        // too few fields
        assert!(parse_line("14/03/16; 10:00:00; 0.00; 8.512; 27.31;").is_none());
        // shaped like data but not a real date
        assert!(parse_line("31/02/16; 10:00:00; 0.00; 8.512; 27.31; 2384; 15.1;").is_none());
    }

    #[test]
    fn reader_counts_skipped_lines() {
        let text = format!(
            "OxyView PST3-V7.01\nDate;Time;LogTime;Oxygen;Phase;Amp;Temp;\n{}\n\n{}\n",
            ROW,
            ROW.replace("10:00:00", "10:00:01")
        );
        let mut reader = LogReader::new(Cursor::new(text.into_bytes()));
        let samples: Vec<RawSample> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].time, "10:00:01");
        assert_eq!(reader.skipped(), 3);
        assert_eq!(reader.lines_read(), 5);
    }

    #[test]
    fn tolerates_non_utf8_header() {
        let mut bytes = b"Temp [\xb0C]\n".to_vec();
        bytes.extend_from_slice(ROW.as_bytes());
        let samples: Vec<RawSample> = LogReader::new(Cursor::new(bytes))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn reads_sample_log() {
        let path = sample_path("test_data/oxyview_sample.txt");
        let samples = read_log(&path).expect("read sample");
        assert!(!samples.is_empty());
        assert_eq!(samples[0].time, "09:59:50");
    }

    fn sample_path(relative: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace root")
            .join(relative)
    }
}
