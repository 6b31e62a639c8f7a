//! GUE (Generic UDP Encapsulation) header codec
//!
//! This module implements encoding and decoding of the GUE header as described
//! in draft-ietf-intarea-gue. GUE carries an arbitrary IP protocol inside a UDP
//! datagram, identified by the 8-bit Protocol field.
//!
//! # GUE Header Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Ver|C|  Hlen   |  Proto/ctype  |             Flags             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! ~                  Extensions Fields (optional)                 ~
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! # Key characteristics
//!
//! - No IANA port: the UDP port is chosen by configuration
//! - Hlen: extension length in 4-byte words (5 bits, 0-124 bytes)
//! - Flags: only the all-zero value is supported, anything else is rejected
//! - The whole Hlen span is kept as a single opaque extension field
//!
//! # Examples
//!
//! ## Decoding
//!
//! ```
//! use gue_strata::packet::protocol::IpProto;
//! use gue_strata::packet::tunnel::gue::GueHeader;
//!
//! let packet = [
//!     0x00, 0x04, 0x00, 0x00,  // Ver=0, C=0, Hlen=0, Proto=IPIP, Flags=0
//!     0x45, 0x00, 0x00, 0x54,  // inner IPv4 packet...
//! ];
//!
//! let gue = GueHeader::decode(&packet).unwrap();
//! assert_eq!(gue.version, 0);
//! assert!(!gue.control);
//! assert_eq!(gue.protocol, IpProto::IP_ENCAP);
//! assert!(gue.extensions.is_empty());
//! assert_eq!(gue.payload, &packet[4..]);
//! ```
//!
//! ## Encoding
//!
//! The encoder produces the header only; the payload is carried alongside.
//!
//! ```
//! use gue_strata::packet::protocol::IpProto;
//! use gue_strata::packet::tunnel::gue::GueHeader;
//!
//! let header = GueHeader::new(IpProto::IPV6)
//!     .with_control(true)
//!     .with_extensions(&[0xde, 0xad, 0xbe, 0xef]);
//!
//! assert_eq!(header.encode().unwrap(), [0x21, 0x29, 0x00, 0x00, 0xde, 0xad, 0xbe, 0xef]);
//! ```

use std::fmt::{self, Formatter};

use thiserror::Error;
use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Ref, Unaligned};

use crate::packet::header::Header;
use crate::packet::layer::{Layer, LayerType, NextLayer, PacketBuilder};
use crate::packet::protocol::IpProto;
use crate::packet::{PacketHeader, PacketHeaderError};

/// UDP port the Linux kernel capture used by this crate's tests is bound to.
/// GUE has no IANA assigned port.
pub const GUE_DEFAULT_PORT: u16 = 7777;

/// Largest value of the 5-bit Hlen field
pub const GUE_MAX_HLEN: usize = 31;

/// Largest extension span in bytes (31 * 4)
pub const GUE_MAX_EXTENSION_LEN: usize = GUE_MAX_HLEN * 4;

/// Errors returned by the GUE codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GueError {
    /// Fewer bytes than the fixed header or the declared Hlen span require
    #[error("truncated GUE header: {needed} bytes required, {available} available")]
    TruncatedHeader { needed: usize, available: usize },
    /// Nonzero flags announce fields this codec cannot interpret
    #[error("unsupported GUE flags 0x{0:04x}")]
    UnsupportedFlags(u16),
    /// Extension data does not fit in 31 words
    #[error("GUE extension of {0} bytes exceeds the 124 byte limit")]
    ExtensionTooLarge(usize),
}

/// Fixed 4-byte part of the GUE header, as laid out on the wire
#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Debug, Clone, Copy, KnownLayout, Immutable)]
pub struct GueFixedHeader {
    ver_c_hlen: u8,
    protocol: IpProto,
    flags: U16<BigEndian>,
}

impl GueFixedHeader {
    const VERSION_SHIFT: u8 = 6;
    const VERSION_MASK: u8 = 0x03;
    const FLAG_C_MASK: u8 = 0x20;
    const HLEN_MASK: u8 = 0x1F;

    /// Pack the fixed header. Version and Hlen are truncated to their field widths.
    pub fn new(version: u8, control: bool, hlen: u8, protocol: IpProto, flags: u16) -> Self {
        let mut ver_c_hlen = (version & Self::VERSION_MASK) << Self::VERSION_SHIFT;
        if control {
            ver_c_hlen |= Self::FLAG_C_MASK;
        }
        ver_c_hlen |= hlen & Self::HLEN_MASK;

        Self {
            ver_c_hlen,
            protocol,
            flags: U16::new(flags),
        }
    }

    #[inline]
    pub fn version(&self) -> u8 {
        self.ver_c_hlen >> Self::VERSION_SHIFT
    }

    /// C bit: the datagram carries a control message rather than a data payload
    #[inline]
    pub fn is_control(&self) -> bool {
        self.ver_c_hlen & Self::FLAG_C_MASK != 0
    }

    /// Extension length in 4-byte words
    #[inline]
    pub fn hlen(&self) -> u8 {
        self.ver_c_hlen & Self::HLEN_MASK
    }

    #[inline]
    pub fn extension_len(&self) -> usize {
        self.hlen() as usize * 4
    }

    #[inline]
    pub fn protocol(&self) -> IpProto {
        self.protocol
    }

    #[inline]
    pub fn flags(&self) -> u16 {
        self.flags.get()
    }

    /// Fixed header plus extension span
    #[inline]
    pub fn header_len(&self) -> usize {
        Self::FIXED_LEN + self.extension_len()
    }
}

impl PacketHeader for GueFixedHeader {
    const NAME: &'static str = "GueHeader";
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
        self.flags() == 0
    }
}

/// A GUE header together with the extension span and the encapsulated payload.
///
/// A decoded value borrows both slices from the input buffer. For encoding the
/// slices are whatever the caller wants to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GueHeader<'a> {
    /// 2-bit version, only the low two bits are encoded
    pub version: u8,
    /// C bit
    pub control: bool,
    /// IP protocol number of the payload
    pub protocol: IpProto,
    /// Must be zero to decode
    pub flags: u16,
    /// Opaque extension span covered by Hlen
    pub extensions: &'a [u8],
    /// Encapsulated inner packet
    pub payload: &'a [u8],
}

impl<'a> GueHeader<'a> {
    /// A version 0 data header with no extensions and an empty payload
    pub fn new(protocol: IpProto) -> Self {
        Self {
            version: 0,
            control: false,
            protocol,
            flags: 0,
            extensions: &[],
            payload: &[],
        }
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn with_control(mut self, control: bool) -> Self {
        self.control = control;
        self
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// Extension bytes; a length that is not a multiple of 4 is zero-padded on encode
    pub fn with_extensions(mut self, extensions: &'a [u8]) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_payload(mut self, payload: &'a [u8]) -> Self {
        self.payload = payload;
        self
    }

    /// Extension length in 4-byte words, rounded up
    #[inline]
    pub fn hlen(&self) -> usize {
        self.extensions.len().div_ceil(4)
    }

    /// Encoded header length in bytes, including extension padding
    #[inline]
    pub fn header_len(&self) -> usize {
        GueFixedHeader::FIXED_LEN + self.hlen() * 4
    }

    /// Decode a GUE header from the start of `buf`.
    ///
    /// Everything after the Hlen span is returned as the payload.
    pub fn decode(buf: &'a [u8]) -> Result<Self, GueError> {
        let (fixed, rest) = Ref::<_, GueFixedHeader>::from_prefix(buf).map_err(|_| {
            GueError::TruncatedHeader {
                needed: GueFixedHeader::FIXED_LEN,
                available: buf.len(),
            }
        })?;
        let fixed = Ref::into_ref(fixed);

        if !fixed.is_valid() {
            return Err(GueError::UnsupportedFlags(fixed.flags()));
        }

        let needed = fixed.total_len(buf);
        if buf.len() < needed {
            return Err(GueError::TruncatedHeader {
                needed,
                available: buf.len(),
            });
        }

        let (extensions, payload) = rest.split_at(fixed.extension_len());

        Ok(Self {
            version: fixed.version(),
            control: fixed.is_control(),
            protocol: fixed.protocol(),
            flags: fixed.flags(),
            extensions,
            payload,
        })
    }

    /// Fixed header for the current field values
    pub fn fixed_header(&self) -> Result<GueFixedHeader, GueError> {
        let hlen = self.hlen();
        if hlen > GUE_MAX_HLEN {
            return Err(GueError::ExtensionTooLarge(self.extensions.len()));
        }

        Ok(GueFixedHeader::new(
            self.version,
            self.control,
            hlen as u8,
            self.protocol,
            self.flags,
        ))
    }

    /// Append the header (fixed part and padded extensions) to `out`.
    ///
    /// Nothing is written when the extensions are too large.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), GueError> {
        let fixed = self.fixed_header()?;
        let padding = self.hlen() * 4 - self.extensions.len();

        out.reserve(self.header_len());
        out.extend_from_slice(fixed.as_bytes());
        out.extend_from_slice(self.extensions);
        out.extend(std::iter::repeat(0).take(padding));
        Ok(())
    }

    /// Encode the header alone; the payload is not included
    pub fn encode(&self) -> Result<Vec<u8>, GueError> {
        let mut out = Vec::with_capacity(self.header_len());
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Encode the header followed by the payload
    pub fn encode_packet(&self) -> Result<Vec<u8>, GueError> {
        let mut out = Vec::with_capacity(self.header_len() + self.payload.len());
        self.encode_into(&mut out)?;
        out.extend_from_slice(self.payload);
        Ok(out)
    }
}

impl<'a> Layer<'a> for GueHeader<'a> {
    fn layer_type(&self) -> LayerType {
        LayerType::Gue
    }

    fn header_len(&self) -> usize {
        GueHeader::header_len(self)
    }

    fn write_header(&self, out: &mut Vec<u8>) -> Result<(), PacketHeaderError> {
        Ok(self.encode_into(out)?)
    }

    fn payload(&self) -> &'a [u8] {
        self.payload
    }

    fn next_layer(&self) -> NextLayer {
        NextLayer::Ip(self.protocol)
    }
}

impl fmt::Display for GueHeader<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GUE v{} proto={} hlen={} flags=0x{:04x}{}",
            self.version,
            self.protocol,
            self.hlen(),
            self.flags,
            if self.control { " [C]" } else { "" }
        )
    }
}

/// Decode a GUE header, record it in `builder` and hand the payload on to the
/// decoder registered for its protocol number.
///
/// Nothing is recorded when decoding fails.
pub fn decode_gue<'a>(
    data: &'a [u8],
    builder: &mut dyn PacketBuilder<'a>,
) -> Result<(), PacketHeaderError> {
    let gue = GueHeader::decode(data)?;
    builder.add_layer(Header::Gue(gue));
    builder.next_decoder(gue.next_layer(), gue.payload);
    Ok(())
}
