//! Decoded packet tables.
//!
//! CSV with the header `chip_id,channel_id,timestamp,dataword,packet_type,valid_parity`.
//! `packet_type` is the raw front-end code (0 = data) and `valid_parity`
//! is `1`/`0` or `true`/`false`.

use crate::{Error, Result};
use log::debug;
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tinytpc_core::{PacketType, RawPacket};

/// Column header of a packet table.
pub const PACKET_TABLE_HEADER: &str =
    "chip_id,channel_id,timestamp,dataword,packet_type,valid_parity";

/// A memory-mapped packet table.
pub struct PacketTableReader {
    mmap: Mmap,
    path: PathBuf,
}

impl PacketTableReader {
    /// Opens a packet table for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Parses every packet in file order.
    pub fn read_packets(&self) -> Result<Vec<RawPacket>> {
        let text = std::str::from_utf8(&self.mmap).map_err(|e| {
            Error::InvalidFormat(format!("{} is not UTF-8: {e}", self.path.display()))
        })?;
        let packets = parse_packet_table(text)?;
        debug!(
            "Read {} packets from {}",
            packets.len(),
            self.path.display()
        );
        Ok(packets)
    }
}

/// Read a packet table file.
pub fn read_packet_table<P: AsRef<Path>>(path: P) -> Result<Vec<RawPacket>> {
    PacketTableReader::open(path)?.read_packets()
}

/// Parse packet table text. Rows are parsed in parallel; order is kept.
pub fn parse_packet_table(text: &str) -> Result<Vec<RawPacket>> {
    let mut lines = text.lines().enumerate();
    let header = lines
        .by_ref()
        .find(|(_, line)| !line.trim().is_empty())
        .map(|(_, line)| line.trim());
    match header {
        None => return Ok(Vec::new()),
        Some(h) if normalize(h) == PACKET_TABLE_HEADER => {}
        Some(h) => {
            return Err(Error::InvalidFormat(format!(
                "unexpected packet table header '{h}'"
            )))
        }
    }

    let rows: Vec<(usize, &str)> = lines.filter(|(_, line)| !line.trim().is_empty()).collect();
    rows.par_iter()
        .map(|&(n, line)| parse_row(n + 1, line))
        .collect()
}

/// Write packets as a table.
pub fn write_packet_table<W: Write>(writer: &mut W, packets: &[RawPacket]) -> Result<()> {
    writeln!(writer, "{PACKET_TABLE_HEADER}")?;
    for p in packets {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            p.chip_id,
            p.channel_id,
            p.timestamp,
            p.dataword,
            p.packet_type as u8,
            u8::from(p.parity_valid)
        )?;
    }
    Ok(())
}

/// Write a packet table file.
pub fn save_packet_table<P: AsRef<Path>>(path: P, packets: &[RawPacket]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_packet_table(&mut writer, packets)?;
    writer.flush()?;
    Ok(())
}

fn normalize(header: &str) -> String {
    header
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_row(line_no: usize, line: &str) -> Result<RawPacket> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [chip, channel, timestamp, dataword, packet_type, parity] = fields.as_slice() else {
        return Err(Error::parse(
            line_no,
            format!("expected 6 fields, found {}", fields.len()),
        ));
    };
    let code: u8 = field(line_no, "packet_type", packet_type)?;
    Ok(RawPacket {
        chip_id: field(line_no, "chip_id", chip)?,
        channel_id: field(line_no, "channel_id", channel)?,
        timestamp: field(line_no, "timestamp", timestamp)?,
        dataword: field(line_no, "dataword", dataword)?,
        packet_type: PacketType::from_raw(code)
            .ok_or_else(|| Error::parse(line_no, format!("unknown packet type {code}")))?,
        parity_valid: match *parity {
            "1" | "true" => true,
            "0" | "false" => false,
            other => {
                return Err(Error::parse(
                    line_no,
                    format!("invalid valid_parity '{other}'"),
                ))
            }
        },
    })
}

fn field<T: std::str::FromStr>(line_no: usize, name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::parse(line_no, format!("invalid {name} '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_rows_in_order() {
        let text = format!("{PACKET_TABLE_HEADER}\n12,28,1000,120,0,1\n\n13,3,999,80,4,0\n");
        let packets = parse_packet_table(&text).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0], RawPacket::data(12, 28, 1000, 120));
        assert_eq!(packets[1].packet_type, PacketType::Timestamp);
        assert!(!packets[1].parity_valid);
    }

    #[test]
    fn test_header_with_spaces() {
        let text = "chip_id, channel_id, timestamp, dataword, packet_type, valid_parity\n1,2,3,4,0,true\n";
        assert_eq!(parse_packet_table(text).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_text() {
        assert!(parse_packet_table("").unwrap().is_empty());
    }

    #[test]
    fn test_wrong_header() {
        assert!(matches!(
            parse_packet_table("a,b,c\n"),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_errors_name_line() {
        let text = format!("{PACKET_TABLE_HEADER}\n12,28,1000,120,0,1\n12,28,1000,120,9,1\n");
        assert!(matches!(
            parse_packet_table(&text),
            Err(Error::Parse { line: 3, .. })
        ));

        let text = format!("{PACKET_TABLE_HEADER}\n12,300,1000,120,0,1\n");
        assert!(matches!(
            parse_packet_table(&text),
            Err(Error::Parse { line: 2, .. })
        ));

        let text = format!("{PACKET_TABLE_HEADER}\n12,28,1000\n");
        assert!(matches!(
            parse_packet_table(&text),
            Err(Error::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let mut packets: Vec<_> = (0..50u8)
            .map(|i| RawPacket::data(22, i, 5000 + u64::from(i), 100 + u16::from(i)))
            .collect();
        packets[7].packet_type = PacketType::Sync;
        packets[9].parity_valid = false;

        let file = NamedTempFile::new().unwrap();
        save_packet_table(file.path(), &packets).unwrap();
        let reader = PacketTableReader::open(file.path()).unwrap();
        assert!(!reader.is_empty());
        assert_eq!(reader.read_packets().unwrap(), packets);
    }
}
