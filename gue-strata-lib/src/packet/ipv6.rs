//! IPv6 fixed header parser
//!
//! Only the 40-byte fixed header is parsed. Extension headers are left in the
//! payload and dispatched by Next Header like any other protocol, so a packet
//! carrying them stops at the first one unless a decoder is registered for it.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Version| Traffic Class |           Flow Label                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Payload Length        |  Next Header  |   Hop Limit   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! +                         Source Address                        +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! +                      Destination Address                      +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use std::fmt::{self, Formatter};
use std::net::Ipv6Addr;

use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::header::Header;
use crate::packet::layer::{NextLayer, PacketBuilder};
use crate::packet::protocol::IpProto;
use crate::packet::{HeaderParser, PacketHeader, PacketHeaderError};

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout, Debug, Clone, Copy)]
pub struct Ipv6Header {
    ver_tc_flow: U32<BigEndian>,
    payload_length: U16<BigEndian>,
    next_header: IpProto,
    hop_limit: u8,
    src_ip: [u8; 16],
    dst_ip: [u8; 16],
}

impl Ipv6Header {
    #[inline]
    pub fn version(&self) -> u8 {
        (self.ver_tc_flow.get() >> 28) as u8
    }

    #[inline]
    pub fn traffic_class(&self) -> u8 {
        (self.ver_tc_flow.get() >> 20) as u8
    }

    #[inline]
    pub fn flow_label(&self) -> u32 {
        self.ver_tc_flow.get() & 0x000F_FFFF
    }

    /// Length of everything after the fixed header
    #[inline]
    pub fn payload_length(&self) -> u16 {
        self.payload_length.get()
    }

    #[inline]
    pub fn next_header(&self) -> IpProto {
        self.next_header
    }

    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.hop_limit
    }

    #[inline]
    pub fn src_ip(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.src_ip)
    }

    #[inline]
    pub fn dst_ip(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.dst_ip)
    }
}

impl PacketHeader for Ipv6Header {
    const NAME: &'static str = "Ipv6Header";
    type InnerType = IpProto;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.next_header
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.version() == 6
    }
}

impl HeaderParser for Ipv6Header {
    type Output<'a> = &'a Ipv6Header;

    #[inline]
    fn into_view<'a>(header: &'a Self, _: &'a [u8]) -> Self::Output<'a> {
        header
    }
}

impl fmt::Display for Ipv6Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPv6 {} -> {} next={} hop={} len={}",
            self.src_ip(),
            self.dst_ip(),
            self.next_header(),
            self.hop_limit(),
            self.payload_length()
        )
    }
}

/// Registry entry for IPv6
pub fn decode_ipv6<'a>(
    data: &'a [u8],
    builder: &mut dyn PacketBuilder<'a>,
) -> Result<(), PacketHeaderError> {
    let (ip, rest) = Ipv6Header::from_bytes(data)?;
    let payload = &rest[..(ip.payload_length() as usize).min(rest.len())];

    builder.add_layer(Header::Ipv6(ip));
    builder.next_decoder(NextLayer::Ip(ip.inner_type()), payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv6_packet(payload_len: u16, next: u8) -> Vec<u8> {
        let mut packet = vec![0x6A, 0xB1, 0x23, 0x45];
        packet.extend_from_slice(&payload_len.to_be_bytes());
        packet.extend_from_slice(&[next, 255]);
        packet.extend_from_slice(&Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1).octets());
        packet.extend_from_slice(&Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2).octets());
        packet
    }

    #[test]
    fn test_ipv6_header_size() {
        assert_eq!(std::mem::size_of::<Ipv6Header>(), 40);
    }

    #[test]
    fn test_ipv6_parse_fields() {
        let mut packet = ipv6_packet(4, 17);
        packet.extend_from_slice(b"data");

        let (ip, payload) = Ipv6Header::from_bytes(&packet).unwrap();
        assert_eq!(ip.version(), 6);
        assert_eq!(ip.traffic_class(), 0xAB);
        assert_eq!(ip.flow_label(), 0x12345);
        assert_eq!(ip.payload_length(), 4);
        assert_eq!(ip.next_header(), IpProto::UDP);
        assert_eq!(ip.hop_limit(), 255);
        assert_eq!(ip.src_ip().to_string(), "2001:db8::1");
        assert_eq!(ip.dst_ip().to_string(), "2001:db8::2");
        assert_eq!(payload, b"data");
    }

    #[test]
    fn test_ipv6_wrong_version() {
        let mut packet = ipv6_packet(0, 59);
        packet[0] = 0x4A;
        assert_eq!(
            Ipv6Header::from_bytes(&packet).unwrap_err(),
            PacketHeaderError::Invalid("Ipv6Header")
        );
    }

    #[test]
    fn test_ipv6_too_short() {
        let packet = ipv6_packet(0, 59);
        assert!(Ipv6Header::from_bytes(&packet[..39]).is_err());
    }
}
