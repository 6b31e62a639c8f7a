use std::{
    fmt::Display,
    sync::atomic::{AtomicU64, Ordering},
};

/// Thread-local packet counters
///
/// Counts are accumulated locally and periodically flushed to the shared
/// [`Stats`], so no atomic operation happens per packet.
#[derive(Default, Debug, Clone)]
pub struct LocalStats {
    // General statistics
    pub total_packets: u64,
    pub total_bytes: u64,

    // Error statistics
    pub too_small: u64,
    pub invalid: u64,
    pub gue_truncated: u64,
    pub gue_unsupported_flags: u64,

    // Layers
    pub ethernet: u64,
    pub ipv4: u64,
    pub ipv6: u64,
    pub udp: u64,
    pub icmp: u64,

    // GUE
    pub gue: u64,
    pub gue_control: u64,
    pub gue_extensions: u64,
    pub gue_inner_ipv4: u64,
    pub gue_inner_ipv6: u64,
    pub gue_inner_other: u64,
}

impl LocalStats {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add all non-zero counters to `stats` and reset them
    #[inline]
    pub fn flush(&mut self, stats: &Stats) {
        macro_rules! flush_counter {
            ($($field:ident),+ $(,)?) => {
                $(
                    if self.$field > 0 {
                        stats.$field.fetch_add(self.$field, Ordering::Relaxed);
                        self.$field = 0;
                    }
                )+
            };
        }

        flush_counter!(
            total_packets,
            total_bytes,
            too_small,
            invalid,
            gue_truncated,
            gue_unsupported_flags,
            ethernet,
            ipv4,
            ipv6,
            udp,
            icmp,
            gue,
            gue_control,
            gue_extensions,
            gue_inner_ipv4,
            gue_inner_ipv6,
            gue_inner_other,
        );
    }

    /// Returns true every `interval` packets (`interval` must be a power of 2)
    #[inline]
    pub fn should_flush(&self, interval: u64) -> bool {
        self.total_packets & (interval - 1) == 0
    }
}

/// Flush interval for local stats (must be power of 2)
pub const FLUSH_INTERVAL: u64 = 1024;

#[derive(Default, Debug)]
pub struct Stats {
    // General statistics
    pub total_packets: AtomicU64,
    pub total_bytes: AtomicU64,

    // Error statistics
    pub too_small: AtomicU64,
    pub invalid: AtomicU64,
    pub gue_truncated: AtomicU64,
    pub gue_unsupported_flags: AtomicU64,

    // Layers
    pub ethernet: AtomicU64,
    pub ipv4: AtomicU64,
    pub ipv6: AtomicU64,
    pub udp: AtomicU64,
    pub icmp: AtomicU64,

    // GUE
    pub gue: AtomicU64,
    pub gue_control: AtomicU64,
    pub gue_extensions: AtomicU64,
    pub gue_inner_ipv4: AtomicU64,
    pub gue_inner_ipv6: AtomicU64,
    pub gue_inner_other: AtomicU64,
}

impl Stats {
    #[inline]
    fn get(&self, counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn total_gue_errors(&self) -> u64 {
        self.get(&self.gue_truncated) + self.get(&self.gue_unsupported_flags)
    }

    pub fn total_errors(&self) -> u64 {
        self.get(&self.too_small) + self.get(&self.invalid) + self.total_gue_errors()
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Packet Statistics ===")?;
        writeln!(f)?;

        writeln!(f, "--- General ---")?;
        writeln!(f, "Total packets processed: {}", self.get(&self.total_packets))?;
        writeln!(f, "Total bytes processed: {}", self.get(&self.total_bytes))?;
        writeln!(f)?;

        writeln!(f, "--- Errors ---")?;
        writeln!(f, "Total errors: {}", self.total_errors())?;
        writeln!(f, "  Too small: {}", self.get(&self.too_small))?;
        writeln!(f, "  Invalid: {}", self.get(&self.invalid))?;
        writeln!(f, "  GUE truncated: {}", self.get(&self.gue_truncated))?;
        writeln!(
            f,
            "  GUE unsupported flags: {}",
            self.get(&self.gue_unsupported_flags)
        )?;
        writeln!(f)?;

        writeln!(f, "--- Layers ---")?;
        writeln!(f, "Ethernet: {}", self.get(&self.ethernet))?;
        writeln!(f, "IPv4: {}", self.get(&self.ipv4))?;
        writeln!(f, "IPv6: {}", self.get(&self.ipv6))?;
        writeln!(f, "UDP: {}", self.get(&self.udp))?;
        writeln!(f, "ICMP: {}", self.get(&self.icmp))?;
        writeln!(f)?;

        let gue = self.get(&self.gue);
        if gue > 0 {
            writeln!(f, "--- GUE ---")?;
            writeln!(f, "Total GUE headers: {}", gue)?;
            if self.get(&self.gue_control) > 0 {
                writeln!(f, "  Control messages: {}", self.get(&self.gue_control))?;
            }
            if self.get(&self.gue_extensions) > 0 {
                writeln!(f, "  With extensions: {}", self.get(&self.gue_extensions))?;
            }
            if self.get(&self.gue_inner_ipv4) > 0 {
                writeln!(f, "  Inner IPv4: {}", self.get(&self.gue_inner_ipv4))?;
            }
            if self.get(&self.gue_inner_ipv6) > 0 {
                writeln!(f, "  Inner IPv6: {}", self.get(&self.gue_inner_ipv6))?;
            }
            if self.get(&self.gue_inner_other) > 0 {
                writeln!(f, "  Other inner protocol: {}", self.get(&self.gue_inner_other))?;
            }
        }

        Ok(())
    }
}
