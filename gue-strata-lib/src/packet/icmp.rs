//! ICMP header parser
//!
//! Only the common 8-byte header is decoded; the rest of the message is left
//! as trailing data of the packet.

use std::fmt::{self, Formatter};

use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::header::Header;
use crate::packet::layer::{NextLayer, PacketBuilder};
use crate::packet::{HeaderParser, PacketHeader, PacketHeaderError};

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_DEST_UNREACH: u8 = 3;
pub const ICMP_ECHO: u8 = 8;
pub const ICMP_TIME_EXCEEDED: u8 = 11;

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct IcmpHeader {
    icmp_type: u8,
    code: u8,
    checksum: U16<BigEndian>,
    rest: [U16<BigEndian>; 2],
}

impl IcmpHeader {
    #[inline]
    pub fn icmp_type(&self) -> u8 {
        self.icmp_type
    }

    #[inline]
    pub fn code(&self) -> u8 {
        self.code
    }

    #[inline]
    pub fn checksum(&self) -> u16 {
        self.checksum.get()
    }

    #[inline]
    pub fn is_echo(&self) -> bool {
        matches!(self.icmp_type, ICMP_ECHO | ICMP_ECHO_REPLY)
    }

    /// Identifier of an echo request or reply
    #[inline]
    pub fn echo_id(&self) -> u16 {
        self.rest[0].get()
    }

    /// Sequence number of an echo request or reply
    #[inline]
    pub fn echo_sequence(&self) -> u16 {
        self.rest[1].get()
    }

    fn type_name(&self) -> Option<&'static str> {
        match self.icmp_type {
            ICMP_ECHO_REPLY => Some("echo-reply"),
            ICMP_DEST_UNREACH => Some("dest-unreach"),
            ICMP_ECHO => Some("echo"),
            ICMP_TIME_EXCEEDED => Some("time-exceeded"),
            _ => None,
        }
    }
}

impl PacketHeader for IcmpHeader {
    const NAME: &'static str = "IcmpHeader";
    type InnerType = u8;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.icmp_type
    }
}

impl HeaderParser for IcmpHeader {
    type Output<'a> = &'a IcmpHeader;

    #[inline]
    fn into_view<'a>(header: &'a Self, _: &'a [u8]) -> Self::Output<'a> {
        header
    }
}

impl fmt::Display for IcmpHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.type_name() {
            Some(name) => write!(f, "ICMP {}", name)?,
            None => write!(f, "ICMP type={}", self.icmp_type)?,
        }
        if self.is_echo() {
            write!(f, " id={} seq={}", self.echo_id(), self.echo_sequence())
        } else {
            write!(f, " code={}", self.code)
        }
    }
}

/// Registry entry for ICMP. Always the last decoded layer.
pub fn decode_icmp<'a>(
    data: &'a [u8],
    builder: &mut dyn PacketBuilder<'a>,
) -> Result<(), PacketHeaderError> {
    let (icmp, rest) = IcmpHeader::from_bytes(data)?;
    builder.add_layer(Header::Icmp(icmp));
    builder.next_decoder(NextLayer::Done, rest);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icmp_echo() {
        let packet = [0x08, 0x00, 0x0a, 0x7e, 0x00, 0x5f, 0x00, 0x0c, 0xEE];
        let (icmp, rest) = IcmpHeader::from_bytes(&packet).unwrap();

        assert_eq!(icmp.icmp_type(), ICMP_ECHO);
        assert_eq!(icmp.code(), 0);
        assert_eq!(icmp.checksum(), 0x0a7e);
        assert!(icmp.is_echo());
        assert_eq!(icmp.echo_id(), 0x5f);
        assert_eq!(icmp.echo_sequence(), 12);
        assert_eq!(icmp.to_string(), "ICMP echo id=95 seq=12");
        assert_eq!(rest, &[0xEE]);
    }

    #[test]
    fn test_icmp_unreachable_display() {
        let packet = [0x03, 0x04, 0x00, 0x00, 0x00, 0x00, 0x05, 0xdc];
        let (icmp, _) = IcmpHeader::from_bytes(&packet).unwrap();
        assert!(!icmp.is_echo());
        assert_eq!(icmp.to_string(), "ICMP dest-unreach code=4");
    }

    #[test]
    fn test_icmp_unknown_type() {
        let packet = [0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let (icmp, _) = IcmpHeader::from_bytes(&packet).unwrap();
        assert_eq!(icmp.to_string(), "ICMP type=42 code=0");
    }

    #[test]
    fn test_icmp_too_short() {
        assert!(IcmpHeader::from_bytes(&[0x08, 0x00, 0x00]).is_err());
    }
}
