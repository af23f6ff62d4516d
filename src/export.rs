//! CSV export of reading tables

use chrono::SecondsFormat;
use std::io::Write;

use crate::error::ChairError;
use crate::types::{ReadingTable, CHANNEL_NAMES};

/// Write `timestamp,p00..p11` rows; timestamps are RFC 3339 in UTC
pub fn write_csv<W: Write>(table: &ReadingTable, writer: W) -> Result<(), ChairError> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(CHANNEL_NAMES.len() + 1);
    header.push("timestamp");
    header.extend(CHANNEL_NAMES);
    csv.write_record(&header)?;

    for row in table.rows() {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true));
        record.extend(row.channels.iter().map(|v| v.to_string()));
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

pub fn to_csv_string(table: &ReadingTable) -> Result<String, ChairError> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| ChairError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimestampedReading;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_csv_layout() {
        let mut channels = [0u16; 12];
        channels[0] = 2224;
        channels[11] = 657;
        let table = ReadingTable::from_rows(vec![TimestampedReading::new(
            Utc.timestamp_millis_opt(1_704_888_000_250).unwrap(),
            channels,
        )
        .unwrap()]);

        let csv = to_csv_string(&table).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "timestamp,p00,p01,p02,p03,p04,p05,p06,p07,p08,p09,p10,p11"
        );
        assert_eq!(
            lines[1],
            "2024-01-10T12:00:00.250Z,2224,0,0,0,0,0,0,0,0,0,0,657"
        );
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let csv = to_csv_string(&ReadingTable::default()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
