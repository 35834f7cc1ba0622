// Profile report text
use super::dump::AnnotatedDump;
use super::{ProfileSample, ProfileTable};
use crate::decoder::Decoder;
use std::io::{self, Write};

/// What the profile summary includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Echo every sample's address before the totals.
    pub echo_samples: bool,
    /// Only print this many entries of the cycle ranking.
    pub top: Option<usize>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            echo_samples: true,
            top: None,
        }
    }
}

/// Sample echo, grand total and the hottest-address ranking.
pub fn write_profile_summary<W: Write>(
    out: &mut W,
    samples: &[ProfileSample],
    table: &ProfileTable,
    options: &ReportOptions,
) -> io::Result<()> {
    if options.echo_samples {
        for sample in samples {
            writeln!(out, "{:08x}", sample.address)?;
        }
    }

    let total = table.grand_total();
    writeln!(out, "{total:08x} ({total:8}) total clocks")?;

    let ranked = table.rank_by_cycles();
    let shown = options.top.unwrap_or(ranked.len());
    for stat in ranked.iter().take(shown) {
        writeln!(out, "{:08x}: {:8}", stat.address, stat.total_cycles)?;
    }
    Ok(())
}

/// `name:` followed by every line of the dump. Returns the instruction count.
pub fn write_dump<W, I, D>(out: &mut W, name: &str, dump: AnnotatedDump<'_, I, D>) -> io::Result<usize>
where
    W: Write,
    I: Iterator<Item = u32>,
    D: Decoder,
{
    writeln!(out, "{name}:")?;
    let mut count = 0;
    for line in dump {
        writeln!(out, "{line}")?;
        count += 1;
    }
    Ok(count)
}
