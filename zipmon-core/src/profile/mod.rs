//! Execution Profile Aggregation
//!
//! The simulator bench writes one record per retired instruction to
//! `pfile.bin`: the instruction address and the number of clocks it took.
//! This module turns that stream into per-address statistics.
//!
//! # File format
//! A flat sequence of 8-byte records, each `(address: u32, cycles: u32)` in
//! little-endian order. No header, count or checksum. A truncated trailing
//! record is ignored.
//!
//! # Usage
//!
//! ```rust,no_run
//! use zipmon_core::profile::{ProfileSample, ProfileTable};
//!
//! let samples = ProfileSample::load(std::path::Path::new("pfile.bin"))?;
//! if let Some(samples) = samples {
//!     if let Some(table) = ProfileTable::aggregate(&samples)? {
//!         for stat in table.rank_by_cycles().iter().take(10) {
//!             println!("{:08x}: {}", stat.address, stat.total_cycles);
//!         }
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Table layout
//! The table is dense: one slot per address between the lowest and highest
//! sampled address, so instructions that never executed still report zero
//! hits in the annotated dump.

pub mod dump;
pub mod report;

use crate::error::ProfileError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Default cap on the number of slots a dense table may allocate.
pub const DEFAULT_MAX_SPAN: u32 = 1 << 24;

/// One retired-instruction record from the profile stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSample {
    pub address: u32,
    pub cycles: u32,
}

impl ProfileSample {
    /// Size of one on-disk record.
    pub const RECORD_LEN: usize = 8;

    pub fn new(address: u32, cycles: u32) -> Self {
        Self { address, cycles }
    }

    pub fn from_record(record: [u8; Self::RECORD_LEN]) -> Self {
        Self {
            address: u32::from_le_bytes([record[0], record[1], record[2], record[3]]),
            cycles: u32::from_le_bytes([record[4], record[5], record[6], record[7]]),
        }
    }

    pub fn to_record(self) -> [u8; Self::RECORD_LEN] {
        let mut record = [0u8; Self::RECORD_LEN];
        record[..4].copy_from_slice(&self.address.to_le_bytes());
        record[4..].copy_from_slice(&self.cycles.to_le_bytes());
        record
    }

    /// Decode every whole record in `bytes`.
    pub fn parse(bytes: &[u8]) -> Vec<Self> {
        let records = bytes.chunks_exact(Self::RECORD_LEN);
        let leftover = records.remainder().len();
        if leftover != 0 {
            warn!("profile ends with a truncated {leftover}-byte record, ignoring it");
        }
        records
            .map(|chunk| {
                let mut record = [0u8; Self::RECORD_LEN];
                record.copy_from_slice(chunk);
                Self::from_record(record)
            })
            .collect()
    }

    /// Read records until end of input.
    pub fn read_all<R: Read>(mut reader: R) -> io::Result<Vec<Self>> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::parse(&bytes))
    }

    /// Load a profile file. A missing file is not an error: profiling is
    /// simply unavailable and `None` is returned.
    pub fn load(path: &Path) -> io::Result<Option<Vec<Self>>> {
        match File::open(path) {
            Ok(file) => Self::read_all(BufReader::new(file)).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no profile at {}, profiling disabled", path.display());
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Totals for one instruction address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressStat {
    pub address: u32,
    /// Number of samples at this address.
    pub hit_count: u32,
    /// Sum of the cycle counts of those samples.
    pub total_cycles: u64,
}

impl AddressStat {
    fn empty(address: u32) -> Self {
        Self {
            address,
            hit_count: 0,
            total_cycles: 0,
        }
    }
}

/// Dense per-address statistics over `[min_address, max_address]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTable {
    stats: Vec<AddressStat>,
    grand_total: u64,
    sample_count: usize,
}

impl ProfileTable {
    /// Aggregate samples with the default span limit.
    ///
    /// Returns `Ok(None)` when there are no samples at all.
    pub fn aggregate(samples: &[ProfileSample]) -> Result<Option<Self>, ProfileError> {
        Self::aggregate_with_limit(samples, DEFAULT_MAX_SPAN)
    }

    /// Aggregate samples, refusing tables with more than `max_span` slots.
    pub fn aggregate_with_limit(
        samples: &[ProfileSample],
        max_span: u32,
    ) -> Result<Option<Self>, ProfileError> {
        // First pass: address bounds.
        let Some((min, max)) = samples.iter().fold(None, |bounds, sample| match bounds {
            None => Some((sample.address, sample.address)),
            Some((lo, hi)) => Some((sample.address.min(lo), sample.address.max(hi))),
        }) else {
            return Ok(None);
        };

        let span = u64::from(max - min) + 1;
        if span > u64::from(max_span) {
            return Err(ProfileError::SpanTooLarge {
                min,
                max,
                span,
                limit: max_span,
            });
        }

        let mut stats: Vec<AddressStat> = (0..span)
            .map(|offset| AddressStat::empty(min + offset as u32))
            .collect();

        // Second pass: accumulate.
        let mut grand_total = 0u64;
        for sample in samples {
            let slot = &mut stats[(sample.address - min) as usize];
            slot.hit_count = slot.hit_count.saturating_add(1);
            slot.total_cycles += u64::from(sample.cycles);
            grand_total += u64::from(sample.cycles);
        }

        debug!(
            "aggregated {} samples over 0x{min:08x}..=0x{max:08x}, {grand_total} clocks",
            samples.len()
        );

        Ok(Some(Self {
            stats,
            grand_total,
            sample_count: samples.len(),
        }))
    }

    pub fn min_address(&self) -> u32 {
        self.stats[0].address
    }

    pub fn max_address(&self) -> u32 {
        self.stats[self.stats.len() - 1].address
    }

    /// True if `address` has a slot, sampled or not.
    pub fn covers(&self, address: u32) -> bool {
        (self.min_address()..=self.max_address()).contains(&address)
    }

    pub fn get(&self, address: u32) -> Option<&AddressStat> {
        let offset = address.checked_sub(self.min_address())?;
        self.stats.get(offset as usize)
    }

    /// All slots in address order.
    pub fn stats(&self) -> &[AddressStat] {
        &self.stats
    }

    /// Sum of every sample's cycles.
    pub fn grand_total(&self) -> u64 {
        self.grand_total
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Slots ordered by descending total cycles, lowest address first on ties.
    pub fn rank_by_cycles(&self) -> Vec<AddressStat> {
        let mut ranked = self.stats.clone();
        ranked.sort_by(|a, b| {
            b.total_cycles
                .cmp(&a.total_cycles)
                .then(a.address.cmp(&b.address))
        });
        ranked
    }

    /// Export the table as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
