//! Layer capability and decoder continuation
//!
//! Decoders do not call each other. Each one parses its own header, records it
//! through a [`PacketBuilder`] and names the protocol of the bytes that follow
//! with a [`NextLayer`]. The host (see [`Packet`](crate::packet::Packet)) owns the
//! protocol registry and decides what runs next.

use std::fmt;

use crate::packet::header::Header;
use crate::packet::protocol::{EtherProto, IpProto};
use crate::packet::PacketHeaderError;

/// Link layer framing of a captured packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkType {
    /// Ethernet II frame
    #[default]
    Ethernet,
    /// Raw IPv4 packet, no link header
    RawIpv4,
    /// Raw IPv6 packet, no link header
    RawIpv6,
}

impl LinkType {
    /// Guess the link type from the first bytes of a packet.
    ///
    /// A leading IP version nibble with a plausible header wins over Ethernet.
    pub fn guess(buf: &[u8]) -> LinkType {
        match buf.first().map(|b| b >> 4) {
            Some(4) if buf.len() >= 20 && (buf[0] & 0x0F) >= 5 => LinkType::RawIpv4,
            Some(6) if buf.len() >= 40 => LinkType::RawIpv6,
            _ => LinkType::Ethernet,
        }
    }
}

/// What the bytes following a decoded header contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextLayer {
    /// Link layer framing
    Link(LinkType),
    /// Payload identified by an EtherType
    Ether(EtherProto),
    /// Payload identified by an IP protocol number
    Ip(IpProto),
    /// UDP payload, identified by its ports
    Udp { src_port: u16, dst_port: u16 },
    /// Nothing else to decode
    Done,
}

impl fmt::Display for NextLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextLayer::Link(l) => write!(f, "link({:?})", l),
            NextLayer::Ether(p) => write!(f, "ether({})", p),
            NextLayer::Ip(p) => write!(f, "ip({})", p),
            NextLayer::Udp { src_port, dst_port } => write!(f, "udp({}->{})", src_port, dst_port),
            NextLayer::Done => f.write_str("done"),
        }
    }
}

/// Kind of a decoded layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Ethernet,
    Ipv4,
    Ipv6,
    Udp,
    Icmp,
    Gue,
}

/// A protocol header that can reproduce its wire bytes and point at its payload.
pub trait Layer<'a> {
    fn layer_type(&self) -> LayerType;

    /// Length of the encoded header in bytes
    fn header_len(&self) -> usize;

    /// Append the encoded header to `out`
    fn write_header(&self, out: &mut Vec<u8>) -> Result<(), PacketHeaderError>;

    /// Bytes carried after the header
    fn payload(&self) -> &'a [u8];

    /// Protocol of the payload
    fn next_layer(&self) -> NextLayer;

    /// Encoded header bytes
    fn contents(&self) -> Result<Vec<u8>, PacketHeaderError> {
        let mut out = Vec::with_capacity(self.header_len());
        self.write_header(&mut out)?;
        Ok(out)
    }

    /// Encoded header followed by the payload
    fn serialize(&self) -> Result<Vec<u8>, PacketHeaderError> {
        let payload = self.payload();
        let mut out = Vec::with_capacity(self.header_len() + payload.len());
        self.write_header(&mut out)?;
        out.extend_from_slice(payload);
        Ok(out)
    }
}

/// Continuation handed to every decoder.
///
/// A decoder that succeeds calls [`add_layer`](PacketBuilder::add_layer) for
/// its header and then [`next_decoder`](PacketBuilder::next_decoder) once.
pub trait PacketBuilder<'a> {
    /// Record a decoded header
    fn add_layer(&mut self, header: Header<'a>);

    /// Name the protocol of `payload`, the bytes left after the recorded header
    fn next_decoder(&mut self, next: NextLayer, payload: &'a [u8]);
}

/// Signature shared by all registered decoders
pub type DecodeFn = for<'a> fn(&'a [u8], &mut dyn PacketBuilder<'a>) -> Result<(), PacketHeaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_link_type() {
        let mut ipv4 = vec![0x45u8];
        ipv4.resize(20, 0);
        assert_eq!(LinkType::guess(&ipv4), LinkType::RawIpv4);

        let mut ipv6 = vec![0x60u8];
        ipv6.resize(40, 0);
        assert_eq!(LinkType::guess(&ipv6), LinkType::RawIpv6);

        assert_eq!(LinkType::guess(&[]), LinkType::Ethernet);
        assert_eq!(LinkType::guess(&[0x45, 0x00]), LinkType::Ethernet);
        assert_eq!(LinkType::guess(&[0x02u8; 60]), LinkType::Ethernet);
    }

    #[test]
    fn test_next_layer_display() {
        assert_eq!(NextLayer::Ip(IpProto::IP_ENCAP).to_string(), "ip(ip-encap)");
        assert_eq!(
            NextLayer::Udp {
                src_port: 35855,
                dst_port: 7777
            }
            .to_string(),
            "udp(35855->7777)"
        );
        assert_eq!(NextLayer::Ether(EtherProto::IPV6).to_string(), "ether(ipv6)");
        assert_eq!(NextLayer::Done.to_string(), "done");
    }
}
