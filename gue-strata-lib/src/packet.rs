use smallvec::SmallVec;
use std::fmt;
use std::mem;
use thiserror::Error;
use zerocopy::{FromBytes, Immutable, KnownLayout, Ref, Unaligned};

use crate::packet::{
    header::Header,
    layer::{LinkType, NextLayer, PacketBuilder},
    registry::DecoderRegistry,
    tunnel::gue::{GueError, GueHeader},
};

pub mod ether;
pub mod header;
pub mod icmp;
pub mod ipv4;
pub mod ipv6;
pub mod layer;
pub mod protocol;
pub mod registry;
pub mod tunnel;
pub mod udp;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketHeaderError {
    #[error("buffer too short for {0}")]
    TooShort(&'static str),
    #[error("invalid {0}")]
    Invalid(&'static str),
    #[error("GUE: {0}")]
    Gue(#[from] GueError),
}

pub trait PacketHeader: Sized {
    const FIXED_LEN: usize = mem::size_of::<Self>();
    const NAME: &'static str;
    type InnerType;

    /// return the inner type of the header
    fn inner_type(&self) -> Self::InnerType;

    /// Returns the length of the header, variable part included.
    /// The buffer starts at the header itself.
    fn total_len(&self, buf: &[u8]) -> usize {
        let _ = buf;
        Self::FIXED_LEN
    }

    /// check whether the fixed header is valid
    #[inline]
    fn is_valid(&self) -> bool {
        true
    }
}

pub trait HeaderParser: PacketHeader + FromBytes + KnownLayout + Immutable + Unaligned {
    /// The high-level view returned to the user.
    /// Can be `&'a Self` for fixed headers or a custom wrapper<'a> for variable ones.
    type Output<'a>
    where
        Self: 'a;

    /// Transform the raw struct and the variable part into the Output type.
    fn into_view<'a>(header: &'a Self, options: &'a [u8]) -> Self::Output<'a>;

    /// parse the header, ensuring validity and length
    #[inline]
    fn from_bytes<'a>(buf: &'a [u8]) -> Result<(Self::Output<'a>, &'a [u8]), PacketHeaderError> {
        let (header_ref, rest_buf) = Ref::<_, Self>::from_prefix(buf)
            .map_err(|_| PacketHeaderError::TooShort(Self::NAME))?;

        if !header_ref.is_valid() {
            return Err(PacketHeaderError::Invalid(Self::NAME));
        }

        let header = Ref::into_ref(header_ref);

        let total_len = header.total_len(buf);
        let options_len = total_len.saturating_sub(Self::FIXED_LEN);

        if rest_buf.len() < options_len {
            return Err(PacketHeaderError::TooShort(Self::NAME));
        }

        let (options, payload) = rest_buf.split_at(options_len);

        Ok((Self::into_view(header, options), payload))
    }
}

/// Number of decoded layers stored inline (without heap allocation)
const MAX_INLINE_LAYERS: usize = 8;

/// Upper bound of decode steps for a single packet.
///
/// Nested encapsulation (IP-in-IP inside GUE inside UDP...) stops here
/// instead of recursing without limit.
pub const MAX_LAYERS: usize = 16;

type Layers<'a> = SmallVec<[Header<'a>; MAX_INLINE_LAYERS]>;

/// Collects what the decoders report during a walk
#[derive(Default)]
struct ChainBuilder<'a> {
    headers: Layers<'a>,
    pending: Option<(NextLayer, &'a [u8])>,
}

impl<'a> PacketBuilder<'a> for ChainBuilder<'a> {
    #[inline]
    fn add_layer(&mut self, header: Header<'a>) {
        self.headers.push(header);
    }

    #[inline]
    fn next_decoder(&mut self, next: NextLayer, payload: &'a [u8]) {
        self.pending = Some((next, payload));
    }
}

/// A decoded packet: every recognized header, outermost first, and the bytes
/// no registered decoder claimed.
///
/// When a decoder fails, the headers decoded before it are kept, `data` holds
/// the bytes the failing decoder was given and the failure is in
/// [`error`](Packet::error).
#[derive(Debug, Clone)]
pub struct Packet<'a> {
    headers: Layers<'a>,
    data: &'a [u8],
    error: Option<PacketHeaderError>,
}

impl<'a> Packet<'a> {
    /// Decode `buf` layer by layer, starting from `link_type`.
    ///
    /// Every step looks up the decoder for the protocol announced by the
    /// previous one in `registry`. The walk ends without error when no
    /// decoder is registered, when a decoder reports [`NextLayer::Done`] or
    /// after [`MAX_LAYERS`] steps. A decoder failure stops the walk; the outer
    /// layers stay available and the failure is reported by [`Packet::error`].
    ///
    /// # Examples
    ///
    /// ```
    /// use gue_strata::packet::layer::LinkType;
    /// use gue_strata::packet::registry::DecoderRegistry;
    /// use gue_strata::packet::Packet;
    ///
    /// let registry = DecoderRegistry::default();
    /// let packet = [
    ///     0x45, 0x00, 0x00, 0x1c, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00,
    ///     0x0a, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x02,  // IPv4, proto UDP
    ///     0x30, 0x39, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00,  // UDP 12345 -> 53
    /// ];
    ///
    /// let packet = Packet::from_bytes(&packet, LinkType::RawIpv4, &registry);
    /// assert!(packet.error().is_none());
    /// assert_eq!(packet.headers().len(), 2);
    /// assert!(packet.data().is_empty());
    /// assert!(packet.gue().is_none());
    /// ```
    pub fn from_bytes(
        buf: &'a [u8],
        link_type: LinkType,
        registry: &DecoderRegistry,
    ) -> Self {
        let mut builder = ChainBuilder::default();
        let mut next = NextLayer::Link(link_type);
        let mut remaining = buf;
        let mut error = None;
        let mut steps = 0;

        while let Some(decode) = registry.lookup(next) {
            if steps == MAX_LAYERS {
                break;
            }
            steps += 1;

            if let Err(e) = decode(remaining, &mut builder) {
                error = Some(e);
                break;
            }
            (next, remaining) = builder.pending.take().unwrap_or((NextLayer::Done, &[]));
        }

        Packet {
            headers: builder.headers,
            data: remaining,
            error,
        }
    }

    /// Decoded headers, outermost first
    #[inline]
    pub fn headers(&self) -> &[Header<'a>] {
        &self.headers
    }

    /// Bytes left after the last decoded header
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Failure that stopped the walk, if any
    #[inline]
    pub fn error(&self) -> Option<&PacketHeaderError> {
        self.error.as_ref()
    }

    /// The outermost GUE header, if any
    pub fn gue(&self) -> Option<&GueHeader<'a>> {
        self.headers.iter().find_map(|h| match h {
            Header::Gue(gue) => Some(gue),
            _ => None,
        })
    }
}

impl fmt::Display for Packet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in &self.headers {
            writeln!(f, "{}", header)?;
        }
        write!(f, "data: {} bytes", self.data.len())?;
        if let Some(e) = &self.error {
            write!(f, "\nerror: {}", e)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::icmp::ICMP_ECHO;
    use crate::packet::layer::LayerType;
    use crate::packet::protocol::IpProto;
    use crate::packet::tunnel::gue::{decode_gue, GUE_DEFAULT_PORT};

    /// Linux kernel GUE tunnel, captured with pcap: Ethernet / IPv4 /
    /// UDP 35855 -> 7777 / GUE / IPv4 / ICMP echo request
    const KERNEL_GUE_PING: [u8; 130] = [
        0x02, 0x42, 0x7b, 0x25, 0x22, 0xf5, 0x02, 0x42, 0x0a, 0xe0, 0xd9, 0x06, // Ethernet
        0x08, 0x00,
        0x45, 0x00, 0x00, 0x74, 0x51, 0xea, 0x40, 0x00, 0xff, 0x11, 0x9d, 0x05, // IPv4
        0x0a, 0xe0, 0xd9, 0x06, 0x0a, 0xfa, 0x9d, 0xa8,
        0x8c, 0x0f, 0x1e, 0x61, 0x00, 0x60, 0x8c, 0xfa, // UDP
        0x00, 0x04, 0x00, 0x00, // GUE
        0x45, 0x00, 0x00, 0x54, 0x59, 0xf2, 0x40, 0x00, 0x40, 0x01, 0xe2, 0xcd, // inner IPv4
        0x0a, 0xe0, 0xd9, 0x06, 0x0a, 0xfd, 0x0f, 0x06,
        0x08, 0x00, 0x0a, 0x7e, 0x00, 0x5f, 0x00, 0x0c, // ICMP echo
        0xea, 0x81, 0x1f, 0x59, 0x00, 0x00, 0x00, 0x00, 0x5d, 0xaa, 0x08, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
        0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11, 0x12, 0x13,
        0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f,
        0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27,
    ];

    const UDP_OFFSET: usize = 34;
    const GUE_OFFSET: usize = 42;

    fn layer_types(packet: &Packet) -> Vec<LayerType> {
        packet.headers().iter().map(Header::layer_type).collect()
    }

    #[test]
    fn test_kernel_capture() {
        let registry = DecoderRegistry::default().with_gue_port(GUE_DEFAULT_PORT);
        let packet = Packet::from_bytes(&KERNEL_GUE_PING, LinkType::Ethernet, &registry);
        assert!(packet.error().is_none());

        assert_eq!(
            layer_types(&packet),
            vec![
                LayerType::Ethernet,
                LayerType::Ipv4,
                LayerType::Udp,
                LayerType::Gue,
                LayerType::Ipv4,
                LayerType::Icmp,
            ]
        );

        let gue = packet.gue().unwrap();
        assert_eq!(gue.version, 0);
        assert!(!gue.control);
        assert_eq!(gue.protocol, IpProto::IP_ENCAP);
        assert_eq!(gue.flags, 0);
        assert!(gue.extensions.is_empty());
        assert_eq!(gue.payload.len(), 0x54);

        match &packet.headers()[5] {
            Header::Icmp(icmp) => {
                assert_eq!(icmp.icmp_type(), ICMP_ECHO);
                assert_eq!(icmp.echo_id(), 0x5f);
                assert_eq!(icmp.echo_sequence(), 0x0c);
            }
            other => panic!("expected ICMP, got {}", other),
        }

        // ICMP echo payload: 84 - 20 (IPv4) - 8 (ICMP)
        assert_eq!(packet.data().len(), 56);
    }

    #[test]
    fn test_kernel_capture_display() {
        let registry = DecoderRegistry::default().with_gue_port(GUE_DEFAULT_PORT);
        let packet = Packet::from_bytes(&KERNEL_GUE_PING, LinkType::Ethernet, &registry);
        let text = packet.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[2], "UDP 35855 -> 7777 len=96");
        assert_eq!(lines[3], "GUE v0 proto=ip-encap hlen=0 flags=0x0000");
        assert_eq!(lines[5], "ICMP echo id=95 seq=12");
        assert_eq!(lines[6], "data: 56 bytes");
    }

    #[test]
    fn test_without_gue_port_stops_at_udp() {
        let registry = DecoderRegistry::default();
        let packet = Packet::from_bytes(&KERNEL_GUE_PING, LinkType::Ethernet, &registry);

        assert_eq!(
            layer_types(&packet),
            vec![LayerType::Ethernet, LayerType::Ipv4, LayerType::Udp]
        );
        assert!(packet.gue().is_none());
        assert_eq!(packet.data(), &KERNEL_GUE_PING[GUE_OFFSET..]);
        assert_eq!(&packet.data()[..4], &[0x00, 0x04, 0x00, 0x00]);
    }

    #[test]
    fn test_gue_on_source_port() {
        // Reply direction: GUE port is the UDP source
        let mut reply = KERNEL_GUE_PING;
        reply[UDP_OFFSET..UDP_OFFSET + 4].copy_from_slice(&[0x1e, 0x61, 0x8c, 0x0f]);

        let registry = DecoderRegistry::default().with_gue_port(GUE_DEFAULT_PORT);
        let packet = Packet::from_bytes(&reply, LinkType::Ethernet, &registry);
        assert_eq!(packet.headers().len(), 6);
        assert!(packet.gue().is_some());
    }

    #[test]
    fn test_custom_gue_port() {
        let registry = DecoderRegistry::default().with_gue_port(6080);
        let packet = Packet::from_bytes(&KERNEL_GUE_PING, LinkType::Ethernet, &registry);
        assert!(packet.gue().is_none());

        let mut registry = DecoderRegistry::default();
        registry.register_udp_port(35855, decode_gue);
        let packet = Packet::from_bytes(&KERNEL_GUE_PING, LinkType::Ethernet, &registry);
        assert!(packet.gue().is_some());
    }

    #[test]
    fn test_gue_unsupported_flags_keeps_outer_layers() {
        let mut packet = KERNEL_GUE_PING;
        packet[GUE_OFFSET + 3] = 0x01;

        let registry = DecoderRegistry::default().with_gue_port(GUE_DEFAULT_PORT);
        let packet = Packet::from_bytes(&packet, LinkType::Ethernet, &registry);

        let err = packet.error().unwrap();
        assert_eq!(err, &PacketHeaderError::Gue(GueError::UnsupportedFlags(1)));
        assert_eq!(err.to_string(), "GUE: unsupported GUE flags 0x0001");

        assert_eq!(
            layer_types(&packet),
            vec![LayerType::Ethernet, LayerType::Ipv4, LayerType::Udp]
        );
        assert!(packet.gue().is_none());
        assert_eq!(packet.data().len(), 88);
        assert_eq!(&packet.data()[..4], &[0x00, 0x04, 0x00, 0x01]);
    }

    #[test]
    fn test_gue_flags_on_raw_ip_keep_outer_layers() {
        let buf = [
            0x45, 0x00, 0x00, 0x20, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00,
            0x0a, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x02, // IPv4, proto UDP
            0x8c, 0x0f, 0x1e, 0x61, 0x00, 0x0c, 0x00, 0x00, // UDP 35855 -> 7777
            0x00, 0x04, 0x00, 0x01, // GUE with flags
        ];

        let registry = DecoderRegistry::default().with_gue_port(GUE_DEFAULT_PORT);
        let packet = Packet::from_bytes(&buf, LinkType::RawIpv4, &registry);

        assert_eq!(
            packet.error(),
            Some(&PacketHeaderError::Gue(GueError::UnsupportedFlags(1)))
        );
        assert_eq!(layer_types(&packet), vec![LayerType::Ipv4, LayerType::Udp]);
        assert!(packet.to_string().ends_with("error: GUE: unsupported GUE flags 0x0001"));
    }

    #[test]
    fn test_gue_truncated_extensions_keeps_outer_layers() {
        // hlen = 31 words, far more than the 84 byte payload
        let mut packet = KERNEL_GUE_PING;
        packet[GUE_OFFSET] = 0x1f;

        let registry = DecoderRegistry::default().with_gue_port(GUE_DEFAULT_PORT);
        let packet = Packet::from_bytes(&packet, LinkType::Ethernet, &registry);
        assert_eq!(
            packet.error(),
            Some(&PacketHeaderError::Gue(GueError::TruncatedHeader {
                needed: 128,
                available: 88,
            }))
        );
        assert_eq!(packet.headers().len(), 3);
    }

    #[test]
    fn test_unknown_inner_protocol_ends_walk() {
        // GUE announcing TCP: no decoder, the inner packet stays as data
        let mut packet = KERNEL_GUE_PING;
        packet[GUE_OFFSET + 1] = IpProto::TCP.value();

        let registry = DecoderRegistry::default().with_gue_port(GUE_DEFAULT_PORT);
        let packet = Packet::from_bytes(&packet, LinkType::Ethernet, &registry);
        assert_eq!(packet.headers().len(), 4);
        assert_eq!(packet.gue().unwrap().protocol, IpProto::TCP);
        assert_eq!(packet.data().len(), 0x54);
    }

    #[test]
    fn test_truncated_outer_header() {
        let registry = DecoderRegistry::default();
        let packet = Packet::from_bytes(&KERNEL_GUE_PING[..20], LinkType::Ethernet, &registry);
        assert_eq!(packet.error(), Some(&PacketHeaderError::TooShort("Ipv4Header")));
        assert_eq!(layer_types(&packet), vec![LayerType::Ethernet]);
        assert_eq!(packet.data(), &KERNEL_GUE_PING[14..20]);
    }

    #[test]
    fn test_empty_registry_keeps_everything_as_data() {
        let registry = DecoderRegistry::empty();
        let packet = Packet::from_bytes(&KERNEL_GUE_PING, LinkType::Ethernet, &registry);
        assert!(packet.headers().is_empty());
        assert_eq!(packet.data().len(), KERNEL_GUE_PING.len());
    }

    #[test]
    fn test_nesting_is_bounded() {
        // IPv4 packets nested inside each other, all with protocol IP_ENCAP
        const DEPTH: usize = MAX_LAYERS + 4;
        let total = DEPTH * 20;
        let mut buf = Vec::with_capacity(total);
        for i in 0..DEPTH {
            let len = (total - i * 20) as u16;
            buf.extend_from_slice(&[0x45, 0x00]);
            buf.extend_from_slice(&len.to_be_bytes());
            buf.extend_from_slice(&[0x00, 0x00, 0x40, 0x00, 0x40, 0x04, 0x00, 0x00]);
            buf.extend_from_slice(&[10, 0, 0, 1, 10, 0, 0, 2]);
        }

        let registry = DecoderRegistry::default();
        let packet = Packet::from_bytes(&buf, LinkType::RawIpv4, &registry);
        assert_eq!(packet.headers().len(), MAX_LAYERS);
        assert_eq!(packet.data().len(), (DEPTH - MAX_LAYERS) * 20);
    }

    #[test]
    fn test_rebuild_gue_datagram() {
        let registry = DecoderRegistry::default().with_gue_port(GUE_DEFAULT_PORT);
        let packet = Packet::from_bytes(&KERNEL_GUE_PING, LinkType::Ethernet, &registry);

        let gue = packet.gue().unwrap();
        assert_eq!(gue.encode_packet().unwrap(), &KERNEL_GUE_PING[GUE_OFFSET..]);
    }
}
