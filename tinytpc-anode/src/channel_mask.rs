//! Channels disabled in the front-end configuration.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tinytpc_core::{Error, Result, CHANNELS_PER_CHIP};

/// Disabled channels per chip, one bit per channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMask {
    chips: BTreeMap<u8, u64>,
}

#[derive(Deserialize)]
struct JsonChipConfig {
    chip_id: Option<u8>,
    channel_mask: Vec<u8>,
}

impl ChannelMask {
    /// Creates an empty mask with every channel enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a chip's mask from 64 flags, 1 meaning disabled.
    pub fn set_chip(&mut self, chip_id: u8, flags: &[u8]) -> Result<()> {
        if flags.len() != CHANNELS_PER_CHIP as usize {
            return Err(Error::Config(format!(
                "chip {chip_id}: channel_mask has {} entries, expected {CHANNELS_PER_CHIP}",
                flags.len()
            )));
        }
        let mut bits = 0u64;
        for (channel, &flag) in flags.iter().enumerate() {
            match flag {
                0 => {}
                1 => bits |= 1 << channel,
                other => {
                    return Err(Error::Config(format!(
                        "chip {chip_id}: channel_mask entry {channel} is {other}, expected 0 or 1"
                    )))
                }
            }
        }
        self.chips.insert(chip_id, bits);
        Ok(())
    }

    /// Disables one channel.
    pub fn disable(&mut self, chip_id: u8, channel_id: u8) {
        if channel_id < CHANNELS_PER_CHIP {
            *self.chips.entry(chip_id).or_default() |= 1 << channel_id;
        }
    }

    /// Returns true if the channel is disabled.
    #[inline]
    #[must_use]
    pub fn is_masked(&self, chip_id: u8, channel_id: u8) -> bool {
        channel_id < CHANNELS_PER_CHIP
            && self
                .chips
                .get(&chip_id)
                .is_some_and(|bits| bits & (1 << channel_id) != 0)
    }

    /// Total number of disabled channels.
    #[must_use]
    pub fn masked_count(&self) -> usize {
        self.chips.values().map(|b| b.count_ones() as usize).sum()
    }

    /// Returns true if no channel is disabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masked_count() == 0
    }

    /// Reads one chip configuration from JSON and merges its mask.
    ///
    /// The chip comes from a `"chip_id"` field, or from `chip_hint` when absent.
    pub fn merge_json(&mut self, json: &str, chip_hint: Option<u8>) -> Result<u8> {
        let config: JsonChipConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        let chip_id = config
            .chip_id
            .or(chip_hint)
            .ok_or_else(|| Error::Config("channel mask has no chip_id".into()))?;
        self.set_chip(chip_id, &config.channel_mask)?;
        Ok(chip_id)
    }

    /// Reads one chip configuration file and merges its mask.
    ///
    /// Files named like `<io_group>-<io_channel>-<chip_id>.json` need no
    /// `"chip_id"` field.
    pub fn merge_file<P: AsRef<Path>>(&mut self, path: P) -> Result<u8> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        self.merge_json(&text, chip_from_file_name(path))
    }

    /// Builds a mask from several chip configuration files.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut mask = Self::new();
        for path in paths {
            mask.merge_file(path)?;
        }
        Ok(mask)
    }
}

fn chip_from_file_name(path: &Path) -> Option<u8> {
    let stem = path.file_stem()?.to_str()?;
    let mut parts = stem.rsplit('-');
    let chip = parts.next()?.parse().ok()?;
    // Need at least the io_group and io_channel prefixes
    (parts.count() >= 2).then_some(chip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags_with(disabled: &[usize]) -> Vec<u8> {
        let mut flags = vec![0u8; 64];
        for &ch in disabled {
            flags[ch] = 1;
        }
        flags
    }

    #[test]
    fn test_set_chip() {
        let mut mask = ChannelMask::new();
        mask.set_chip(12, &flags_with(&[0, 63])).unwrap();
        assert!(mask.is_masked(12, 0));
        assert!(mask.is_masked(12, 63));
        assert!(!mask.is_masked(12, 1));
        assert!(!mask.is_masked(13, 0));
        assert_eq!(mask.masked_count(), 2);
    }

    #[test]
    fn test_set_chip_rejects_bad_input() {
        let mut mask = ChannelMask::new();
        assert!(mask.set_chip(12, &[0; 10]).is_err());
        let mut flags = flags_with(&[]);
        flags[3] = 2;
        assert!(mask.set_chip(12, &flags).is_err());
    }

    #[test]
    fn test_merge_json_with_chip_id() {
        let mut mask = ChannelMask::new();
        let json = format!(
            r#"{{"chip_id": 23, "channel_mask": {:?}}}"#,
            flags_with(&[5])
        );
        assert_eq!(mask.merge_json(&json, None).unwrap(), 23);
        assert!(mask.is_masked(23, 5));
    }

    #[test]
    fn test_merge_json_needs_chip() {
        let mut mask = ChannelMask::new();
        let json = format!(r#"{{"channel_mask": {:?}}}"#, flags_with(&[]));
        assert!(mask.merge_json(&json, None).is_err());
        assert_eq!(mask.merge_json(&json, Some(14)).unwrap(), 14);
    }

    #[test]
    fn test_chip_from_file_name() {
        assert_eq!(chip_from_file_name(Path::new("configs/1-1-12.json")), Some(12));
        assert_eq!(chip_from_file_name(Path::new("12.json")), None);
        assert_eq!(chip_from_file_name(Path::new("a-b-xx.json")), None);
    }

    #[test]
    fn test_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1-1-34.json");
        std::fs::write(
            &path,
            format!(
                "{{\n  \"chip_key\": \"1-1-34\",\n  \"channel_mask\": {:?}\n}}",
                flags_with(&[7, 8])
            ),
        )
        .unwrap();
        let mask = ChannelMask::from_files(&[&path]).unwrap();
        assert!(mask.is_masked(34, 7));
        assert!(mask.is_masked(34, 8));
        assert_eq!(mask.masked_count(), 2);
    }
}
