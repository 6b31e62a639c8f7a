//! Ethernet II frame header parser
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Destination MAC Address                    |
//! +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                               |                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                      Source MAC Address                       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           EtherType           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! # Examples
//!
//! ```
//! use gue_strata::packet::ether::EtherHeader;
//! use gue_strata::packet::protocol::EtherProto;
//! use gue_strata::packet::HeaderParser;
//!
//! let packet = [
//!     0x02, 0x42, 0x7b, 0x25, 0x22, 0xf5,  // Destination
//!     0x02, 0x42, 0x0a, 0xe0, 0xd9, 0x06,  // Source
//!     0x08, 0x00,                          // EtherType: IPv4
//!     0x45,                                // payload...
//! ];
//!
//! let (header, payload) = EtherHeader::from_bytes(&packet).unwrap();
//! assert_eq!(header.proto(), EtherProto::IPV4);
//! assert_eq!(header.source().to_string(), "02:42:0a:e0:d9:06");
//! assert_eq!(payload, &[0x45]);
//! ```

use std::fmt::{self, Display, Formatter};

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::header::Header;
use crate::packet::layer::{NextLayer, PacketBuilder};
use crate::packet::protocol::EtherProto;
use crate::packet::{HeaderParser, PacketHeader, PacketHeaderError};

const ETH_ALEN: usize = 6;

/// 48-bit MAC address
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
#[repr(transparent)]
pub struct EthAddr(pub [u8; ETH_ALEN]);

impl EthAddr {
    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; ETH_ALEN]
    }

    #[inline]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl Display for EthAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

/// Ethernet II header (14 bytes, no VLAN tag handling)
#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct EtherHeader {
    dest: EthAddr,
    source: EthAddr,
    proto: EtherProto,
}

impl EtherHeader {
    #[inline]
    pub fn dest(&self) -> EthAddr {
        self.dest
    }

    #[inline]
    pub fn source(&self) -> EthAddr {
        self.source
    }

    #[inline]
    pub fn proto(&self) -> EtherProto {
        self.proto
    }
}

impl PacketHeader for EtherHeader {
    const NAME: &'static str = "EtherHeader";
    type InnerType = EtherProto;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.proto
    }
}

impl HeaderParser for EtherHeader {
    type Output<'a> = &'a EtherHeader;

    #[inline]
    fn into_view<'a>(header: &'a Self, _: &'a [u8]) -> Self::Output<'a> {
        header
    }
}

impl Display for EtherHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Ethernet {} -> {} proto={}", self.source(), self.dest(), self.proto())
    }
}

/// Registry entry for Ethernet framed packets
pub fn decode_ether<'a>(
    data: &'a [u8],
    builder: &mut dyn PacketBuilder<'a>,
) -> Result<(), PacketHeaderError> {
    let (eth, payload) = EtherHeader::from_bytes(data)?;
    builder.add_layer(Header::Ethernet(eth));
    builder.next_decoder(NextLayer::Ether(eth.inner_type()), payload);
    Ok(())
}
