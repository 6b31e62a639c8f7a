//! IPv4 packet header parser
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Version|  IHL  |    DSCP   |ECN|          Total Length         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Identification        |Flags|      Fragment Offset    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Time to Live |    Protocol   |         Header Checksum       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Source Address                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Destination Address                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Options (if IHL > 5)                       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Options are kept as raw bytes. The payload handed to the next decoder is
//! cut to Total Length, so Ethernet padding never reaches the inner layers.
//!
//! # Examples
//!
//! ```
//! use gue_strata::packet::ipv4::Ipv4Header;
//! use gue_strata::packet::protocol::IpProto;
//! use gue_strata::packet::HeaderParser;
//! use std::net::Ipv4Addr;
//!
//! let packet = [
//!     0x45, 0x00, 0x00, 0x1c,  // Version=4, IHL=5, Total length=28
//!     0x00, 0x01, 0x40, 0x00,  // Identification, DF
//!     0x40, 0x11, 0x00, 0x00,  // TTL=64, Protocol=UDP
//!     0x0a, 0x00, 0x00, 0x01,  // Source
//!     0x0a, 0x00, 0x00, 0x02,  // Destination
//! ];
//!
//! let (header, _) = Ipv4Header::from_bytes(&packet).unwrap();
//! assert_eq!(header.protocol(), IpProto::UDP);
//! assert_eq!(header.src_ip(), Ipv4Addr::new(10, 0, 0, 1));
//! assert!(header.dont_fragment());
//! ```

use std::fmt::{self, Formatter};
use std::net::Ipv4Addr;
use std::ops::Deref;

use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::header::Header;
use crate::packet::layer::{NextLayer, PacketBuilder};
use crate::packet::protocol::IpProto;
use crate::packet::{HeaderParser, PacketHeader, PacketHeaderError};

/// Fixed 20-byte IPv4 header
#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct Ipv4Header {
    ver_ihl: u8,
    dscp_ecn: u8,
    total_length: U16<BigEndian>,
    identification: U16<BigEndian>,
    flags_frag_offset: U16<BigEndian>,
    ttl: u8,
    protocol: IpProto,
    checksum: U16<BigEndian>,
    src_ip: U32<BigEndian>,
    dst_ip: U32<BigEndian>,
}

impl Ipv4Header {
    const FLAG_DF: u16 = 0x4000;
    const FLAG_MF: u16 = 0x2000;
    const FRAG_OFFSET_MASK: u16 = 0x1FFF;

    #[inline]
    pub fn version(&self) -> u8 {
        self.ver_ihl >> 4
    }

    /// Header length in 32-bit words
    #[inline]
    pub fn ihl(&self) -> u8 {
        self.ver_ihl & 0x0F
    }

    #[inline]
    pub fn dscp(&self) -> u8 {
        self.dscp_ecn >> 2
    }

    #[inline]
    pub fn ecn(&self) -> u8 {
        self.dscp_ecn & 0x03
    }

    #[inline]
    pub fn total_length(&self) -> u16 {
        self.total_length.get()
    }

    #[inline]
    pub fn identification(&self) -> u16 {
        self.identification.get()
    }

    #[inline]
    pub fn dont_fragment(&self) -> bool {
        self.flags_frag_offset.get() & Self::FLAG_DF != 0
    }

    #[inline]
    pub fn more_fragments(&self) -> bool {
        self.flags_frag_offset.get() & Self::FLAG_MF != 0
    }

    /// Fragment offset in 8-byte units
    #[inline]
    pub fn fragment_offset(&self) -> u16 {
        self.flags_frag_offset.get() & Self::FRAG_OFFSET_MASK
    }

    /// True for any piece of a fragmented datagram, first one included
    #[inline]
    pub fn is_fragment(&self) -> bool {
        self.more_fragments() || self.fragment_offset() != 0
    }

    #[inline]
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    #[inline]
    pub fn protocol(&self) -> IpProto {
        self.protocol
    }

    #[inline]
    pub fn checksum(&self) -> u16 {
        self.checksum.get()
    }

    #[inline]
    pub fn src_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src_ip.get())
    }

    #[inline]
    pub fn dst_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst_ip.get())
    }

    #[inline]
    pub fn header_len(&self) -> usize {
        self.ihl() as usize * 4
    }
}

impl PacketHeader for Ipv4Header {
    const NAME: &'static str = "Ipv4Header";
    type InnerType = IpProto;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.protocol
    }

    #[inline]
    fn total_len(&self, _buf: &[u8]) -> usize {
        self.header_len()
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.version() == 4 && self.ihl() >= 5
    }
}

/// IPv4 header with its raw options
#[derive(Debug, Clone, Copy)]
pub struct Ipv4HeaderOpt<'a> {
    pub header: &'a Ipv4Header,
    pub raw_options: &'a [u8],
}

impl Ipv4HeaderOpt<'_> {
    #[inline]
    pub fn has_options(&self) -> bool {
        !self.raw_options.is_empty()
    }
}

impl Deref for Ipv4HeaderOpt<'_> {
    type Target = Ipv4Header;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.header
    }
}

impl HeaderParser for Ipv4Header {
    type Output<'a> = Ipv4HeaderOpt<'a>;

    #[inline]
    fn into_view<'a>(header: &'a Self, raw_options: &'a [u8]) -> Self::Output<'a> {
        Ipv4HeaderOpt { header, raw_options }
    }
}

impl fmt::Display for Ipv4Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPv4 {} -> {} proto={} ttl={} len={}",
            self.src_ip(),
            self.dst_ip(),
            self.protocol(),
            self.ttl(),
            self.total_length()
        )?;
        if self.is_fragment() {
            write!(f, " frag={}{}", self.fragment_offset() * 8, if self.more_fragments() { "+" } else { "" })?;
        }
        Ok(())
    }
}

impl fmt::Display for Ipv4HeaderOpt<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        if self.has_options() {
            write!(f, " opts={}", self.raw_options.len())?;
        }
        Ok(())
    }
}

/// Registry entry for IPv4. Fragments end the walk, reassembly is out of scope.
pub fn decode_ipv4<'a>(
    data: &'a [u8],
    builder: &mut dyn PacketBuilder<'a>,
) -> Result<(), PacketHeaderError> {
    let (ip, rest) = Ipv4Header::from_bytes(data)?;

    let body_len = (ip.total_length() as usize).saturating_sub(ip.header_len());
    let payload = &rest[..body_len.min(rest.len())];

    let next = if ip.is_fragment() {
        NextLayer::Done
    } else {
        NextLayer::Ip(ip.inner_type())
    };

    builder.add_layer(Header::Ipv4(ip));
    builder.next_decoder(next, payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_packet(ihl: u8, total_len: u16, flags_frag: u16, proto: u8) -> Vec<u8> {
        let mut packet = vec![0x40 | ihl, 0x00];
        packet.extend_from_slice(&total_len.to_be_bytes());
        packet.extend_from_slice(&[0x12, 0x34]);
        packet.extend_from_slice(&flags_frag.to_be_bytes());
        packet.extend_from_slice(&[64, proto, 0x00, 0x00]);
        packet.extend_from_slice(&[192, 168, 1, 1]);
        packet.extend_from_slice(&[192, 168, 1, 2]);
        packet.resize(ihl as usize * 4, 0x01);
        packet
    }

    #[test]
    fn test_ipv4_header_size() {
        assert_eq!(std::mem::size_of::<Ipv4Header>(), 20);
        assert_eq!(Ipv4Header::FIXED_LEN, 20);
    }

    #[test]
    fn test_ipv4_parse_fields() {
        let packet = ipv4_packet(5, 20, 0x4000, 17);
        let (ip, payload) = Ipv4Header::from_bytes(&packet).unwrap();

        assert_eq!(ip.version(), 4);
        assert_eq!(ip.ihl(), 5);
        assert_eq!(ip.identification(), 0x1234);
        assert!(ip.dont_fragment());
        assert!(!ip.is_fragment());
        assert_eq!(ip.ttl(), 64);
        assert_eq!(ip.protocol(), IpProto::UDP);
        assert_eq!(ip.src_ip(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(ip.dst_ip(), Ipv4Addr::new(192, 168, 1, 2));
        assert!(!ip.has_options());
        assert!(payload.is_empty());
    }

    #[test]
    fn test_ipv4_with_options() {
        let mut packet = ipv4_packet(6, 28, 0, 1);
        packet.extend_from_slice(b"icmp");

        let (ip, payload) = Ipv4Header::from_bytes(&packet).unwrap();
        assert!(ip.has_options());
        assert_eq!(ip.raw_options, &[0x01; 4]);
        assert_eq!(payload, b"icmp");
    }

    #[test]
    fn test_ipv4_invalid_version() {
        let mut packet = ipv4_packet(5, 20, 0, 6);
        packet[0] = 0x65;
        assert_eq!(
            Ipv4Header::from_bytes(&packet).unwrap_err(),
            PacketHeaderError::Invalid("Ipv4Header")
        );
    }

    #[test]
    fn test_ipv4_invalid_ihl() {
        let mut packet = ipv4_packet(5, 20, 0, 6);
        packet[0] = 0x44;
        assert!(Ipv4Header::from_bytes(&packet).is_err());
    }

    #[test]
    fn test_ipv4_options_truncated() {
        let mut packet = ipv4_packet(5, 24, 0, 6);
        packet[0] = 0x46;
        assert_eq!(
            Ipv4Header::from_bytes(&packet).unwrap_err(),
            PacketHeaderError::TooShort("Ipv4Header")
        );
    }

    #[test]
    fn test_ipv4_fragment_flags() {
        let packet = ipv4_packet(5, 20, 0x2000 | 0x0010, 17);
        let (ip, _) = Ipv4Header::from_bytes(&packet).unwrap();
        assert!(ip.more_fragments());
        assert_eq!(ip.fragment_offset(), 0x10);
        assert!(ip.is_fragment());
        assert!(ip.to_string().contains("frag=128+"));
    }

    #[test]
    fn test_ipv4_display() {
        let packet = ipv4_packet(5, 20, 0, 4);
        let (ip, _) = Ipv4Header::from_bytes(&packet).unwrap();
        assert_eq!(
            ip.to_string(),
            "IPv4 192.168.1.1 -> 192.168.1.2 proto=ip-encap ttl=64 len=20"
        );
    }
}
