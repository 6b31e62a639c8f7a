//! UDP header parser
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Source Port          |       Destination Port        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            Length             |           Checksum            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The UDP payload is dispatched by port: see
//! [`DecoderRegistry::register_udp_port`](crate::packet::registry::DecoderRegistry::register_udp_port).
//!
//! # Examples
//!
//! ```
//! use gue_strata::packet::udp::UdpHeader;
//! use gue_strata::packet::HeaderParser;
//!
//! let packet = [
//!     0x8c, 0x0f,  // Source port: 35855
//!     0x1e, 0x61,  // Destination port: 7777
//!     0x00, 0x0c,  // Length: 12
//!     0x00, 0x00,  // Checksum
//!     0x00, 0x04, 0x00, 0x00,
//! ];
//!
//! let (header, payload) = UdpHeader::from_bytes(&packet).unwrap();
//! assert_eq!(header.dst_port(), 7777);
//! assert_eq!(header.payload_len(), 4);
//! assert_eq!(payload.len(), 4);
//! ```

use std::fmt::{self, Formatter};

use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::header::Header;
use crate::packet::layer::{NextLayer, PacketBuilder};
use crate::packet::{HeaderParser, PacketHeader, PacketHeaderError};

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct UdpHeader {
    src_port: U16<BigEndian>,
    dst_port: U16<BigEndian>,
    length: U16<BigEndian>,
    checksum: U16<BigEndian>,
}

impl UdpHeader {
    #[inline]
    pub fn src_port(&self) -> u16 {
        self.src_port.get()
    }

    #[inline]
    pub fn dst_port(&self) -> u16 {
        self.dst_port.get()
    }

    /// Datagram length, header included
    #[inline]
    pub fn length(&self) -> u16 {
        self.length.get()
    }

    #[inline]
    pub fn checksum(&self) -> u16 {
        self.checksum.get()
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        (self.length() as usize).saturating_sub(Self::FIXED_LEN)
    }
}

impl PacketHeader for UdpHeader {
    const NAME: &'static str = "UdpHeader";
    type InnerType = (u16, u16);

    /// Source and destination port
    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        (self.src_port(), self.dst_port())
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.length() as usize >= Self::FIXED_LEN
    }
}

impl HeaderParser for UdpHeader {
    type Output<'a> = &'a UdpHeader;

    #[inline]
    fn into_view<'a>(header: &'a Self, _: &'a [u8]) -> Self::Output<'a> {
        header
    }
}

impl fmt::Display for UdpHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UDP {} -> {} len={}",
            self.src_port(),
            self.dst_port(),
            self.length()
        )
    }
}

/// Registry entry for UDP. The payload is cut to the UDP length field.
pub fn decode_udp<'a>(
    data: &'a [u8],
    builder: &mut dyn PacketBuilder<'a>,
) -> Result<(), PacketHeaderError> {
    let (udp, rest) = UdpHeader::from_bytes(data)?;
    let payload = &rest[..udp.payload_len().min(rest.len())];

    builder.add_layer(Header::Udp(udp));
    builder.next_decoder(
        NextLayer::Udp {
            src_port: udp.src_port(),
            dst_port: udp.dst_port(),
        },
        payload,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_header_size() {
        assert_eq!(std::mem::size_of::<UdpHeader>(), 8);
    }

    #[test]
    fn test_udp_parse() {
        let packet = [0x00, 0x35, 0xC0, 0x00, 0x00, 0x0A, 0x12, 0x34, 0xAA, 0xBB];
        let (udp, payload) = UdpHeader::from_bytes(&packet).unwrap();

        assert_eq!(udp.src_port(), 53);
        assert_eq!(udp.dst_port(), 49152);
        assert_eq!(udp.length(), 10);
        assert_eq!(udp.checksum(), 0x1234);
        assert_eq!(udp.payload_len(), 2);
        assert_eq!(udp.inner_type(), (53, 49152));
        assert_eq!(payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_udp_invalid_length() {
        let packet = [0x00, 0x35, 0xC0, 0x00, 0x00, 0x07, 0x00, 0x00];
        assert_eq!(
            UdpHeader::from_bytes(&packet).unwrap_err(),
            PacketHeaderError::Invalid("UdpHeader")
        );
    }

    #[test]
    fn test_udp_display() {
        let packet = [0x8c, 0x0f, 0x1e, 0x61, 0x00, 0x60, 0x8c, 0xfa];
        let (udp, _) = UdpHeader::from_bytes(&packet).unwrap();
        assert_eq!(udp.to_string(), "UDP 35855 -> 7777 len=96");
    }
}
