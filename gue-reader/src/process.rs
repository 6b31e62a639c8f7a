use gue_strata::packet::header::Header;
use gue_strata::packet::layer::LinkType;
use gue_strata::packet::protocol::IpProto;
use gue_strata::packet::registry::DecoderRegistry;
use gue_strata::packet::tunnel::gue::GueError;
use gue_strata::packet::{Packet, PacketHeaderError};
use tracing::debug;

use crate::packet_metadata::PacketMetadata;
use crate::stats::{LocalStats, Stats, FLUSH_INTERVAL};

/// Decode a single captured packet and update the counters.
///
/// `link_type` is the capture's link type; when unknown it is guessed from
/// the packet bytes.
#[inline]
pub fn process_packet<Pkt: PacketMetadata>(
    pkt_count: u64,
    link_type: Option<LinkType>,
    pkt: &Pkt,
    registry: &DecoderRegistry,
    local_stats: &mut LocalStats,
    stats: &Stats,
    dump_packet: bool,
) {
    local_stats.total_packets += 1;
    local_stats.total_bytes += pkt.caplen() as u64;

    let link_type = link_type.unwrap_or_else(|| LinkType::guess(pkt.data()));

    let packet = Packet::from_bytes(pkt.data(), link_type, registry);

    if dump_packet {
        println!(
            "{:>5}   {} ({} bytes)",
            pkt_count,
            pkt.timestamp(),
            pkt.data().len()
        );
        for header in packet.headers() {
            println!("        {header}");
        }
        if let Some(e) = packet.error() {
            println!("        error: {e}");
        }
    }

    count_headers(&packet, local_stats);
    if let Some(e) = packet.error() {
        debug!("packet {}: {}", pkt_count, e);
        count_error(e, local_stats);
    }

    if local_stats.should_flush(FLUSH_INTERVAL) {
        local_stats.flush(stats);
    }
}

fn count_headers(packet: &Packet<'_>, local_stats: &mut LocalStats) {
    for header in packet.headers() {
        match header {
            Header::Ethernet(_) => local_stats.ethernet += 1,
            Header::Ipv4(_) => local_stats.ipv4 += 1,
            Header::Ipv6(_) => local_stats.ipv6 += 1,
            Header::Udp(_) => local_stats.udp += 1,
            Header::Icmp(_) => local_stats.icmp += 1,
            Header::Gue(gue) => {
                local_stats.gue += 1;
                if gue.control {
                    local_stats.gue_control += 1;
                }
                if !gue.extensions.is_empty() {
                    local_stats.gue_extensions += 1;
                }
                match gue.protocol {
                    IpProto::IP_ENCAP => local_stats.gue_inner_ipv4 += 1,
                    IpProto::IPV6 => local_stats.gue_inner_ipv6 += 1,
                    _ => local_stats.gue_inner_other += 1,
                }
            }
        }
    }
}

fn count_error(err: &PacketHeaderError, local_stats: &mut LocalStats) {
    match err {
        PacketHeaderError::TooShort(_) => local_stats.too_small += 1,
        PacketHeaderError::Invalid(_) | PacketHeaderError::Gue(GueError::ExtensionTooLarge(_)) => {
            local_stats.invalid += 1
        }
        PacketHeaderError::Gue(GueError::TruncatedHeader { .. }) => local_stats.gue_truncated += 1,
        PacketHeaderError::Gue(GueError::UnsupportedFlags(_)) => {
            local_stats.gue_unsupported_flags += 1
        }
    }
}
