use std::{
    cmp::min,
    fmt::{self, Display},
};

use chrono::DateTime;
use gue_strata::packet::layer::LinkType;
use pcap_parser::{EnhancedPacketBlock, LegacyPcapBlock, Linktype, SimplePacketBlock};

/// Capture timestamp in nanoseconds since the Unix epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimestampNsec(pub u64);

impl Display for TimestampNsec {
    /// UTC date by default, raw `seconds.nanoseconds` with `{:#}`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0 / 1_000_000_000;
        let nsecs = (self.0 % 1_000_000_000) as u32;

        if !f.alternate() {
            if let Some(date_time) = DateTime::from_timestamp(secs as i64, nsecs) {
                return write!(f, "{}", date_time.format("%Y-%m-%d %H:%M:%S%.6f UTC"));
            }
        }

        write!(f, "{}.{:09}", secs, nsecs)
    }
}

pub trait PacketMetadata {
    fn caplen(&self) -> u32;
    fn origlen(&self) -> u32;
    fn data(&self) -> &[u8];
    fn timestamp(&self) -> TimestampNsec;
}

impl PacketMetadata for LegacyPcapBlock<'_> {
    #[inline]
    fn timestamp(&self) -> TimestampNsec {
        TimestampNsec((self.ts_sec as u64) * 1_000_000_000 + self.ts_usec as u64 * 1000)
    }

    #[inline]
    fn caplen(&self) -> u32 {
        self.caplen
    }

    #[inline]
    fn origlen(&self) -> u32 {
        self.origlen
    }

    #[inline]
    fn data(&self) -> &[u8] {
        self.data
    }
}

impl PacketMetadata for EnhancedPacketBlock<'_> {
    #[inline]
    fn timestamp(&self) -> TimestampNsec {
        let raw_ts = ((self.ts_high as u64) << 32) | (self.ts_low as u64);
        TimestampNsec(scale_pcapng_ts(raw_ts))
    }

    #[inline]
    fn caplen(&self) -> u32 {
        self.caplen
    }

    #[inline]
    fn origlen(&self) -> u32 {
        self.origlen
    }

    #[inline]
    fn data(&self) -> &[u8] {
        self.data
    }
}

impl PacketMetadata for SimplePacketBlock<'_> {
    #[inline]
    fn timestamp(&self) -> TimestampNsec {
        TimestampNsec(0)
    }

    #[inline]
    fn caplen(&self) -> u32 {
        min(self.origlen, self.data.len() as u32)
    }

    #[inline]
    fn origlen(&self) -> u32 {
        self.origlen
    }

    #[inline]
    fn data(&self) -> &[u8] {
        self.data
    }
}

/// pcapng timestamps are microseconds unless the interface says otherwise.
/// Values that already read as nanoseconds between 1973 and 2096 are kept.
#[inline]
fn scale_pcapng_ts(raw_ts: u64) -> u64 {
    if (100_000_000..=4_000_000_000).contains(&(raw_ts / 1_000_000_000)) {
        raw_ts
    } else {
        raw_ts.saturating_mul(1000)
    }
}

/// Link type of a capture interface, `None` when no decoder handles it
pub fn link_type_of(linktype: Linktype) -> Option<LinkType> {
    match linktype {
        Linktype::ETHERNET => Some(LinkType::Ethernet),
        Linktype::IPV4 => Some(LinkType::RawIpv4),
        Linktype::IPV6 => Some(LinkType::RawIpv6),
        _ => None,
    }
}
