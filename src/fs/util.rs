//! Utility helpers shared by the library and the tools.

use crate::layout::Timespec;
use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Returns the current time since the Unix epoch.
pub fn timestamp() -> Timespec {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Timespec {
        sec: now.as_secs(),
        nsec: now.subsec_nanos() as u64,
    }
}

/// A number of bytes, displayed with a binary unit suffix.
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut order = (u64::BITS - 1).saturating_sub(self.0.leading_zeros()) / 10;
        let suffix = match order {
            0 => "bytes",
            1 => "KiB",
            2 => "MiB",
            3 => "GiB",
            4 => "TiB",
            5 => "PiB",
            6 => "EiB",
            _ => {
                order = 0;
                "bytes"
            }
        };
        let unit = 1024u64.pow(order);
        write!(fmt, "{} {}", self.0 / unit, suffix)
    }
}
