//! Zero-copy packet parsing with a GUE (Generic UDP Encapsulation) codec.
//!
//! The [`packet`] module holds header parsers for Ethernet, IPv4, IPv6, UDP
//! and ICMP, the [`GUE codec`](packet::tunnel::gue) and a registry driven
//! decode loop ([`Packet::from_bytes`](packet::Packet::from_bytes)) that
//! chains them.
//!
//! ```
//! use gue_strata::packet::layer::LinkType;
//! use gue_strata::packet::protocol::IpProto;
//! use gue_strata::packet::registry::DecoderRegistry;
//! use gue_strata::packet::tunnel::gue::GUE_DEFAULT_PORT;
//! use gue_strata::packet::Packet;
//!
//! let registry = DecoderRegistry::default().with_gue_port(GUE_DEFAULT_PORT);
//! let buf = [
//!     0x45, 0x00, 0x00, 0x20, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00,
//!     0x0a, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x02,  // IPv4, proto UDP
//!     0x8c, 0x0f, 0x1e, 0x61, 0x00, 0x0c, 0x00, 0x00,  // UDP 35855 -> 7777
//!     0x00, 0x3b, 0x00, 0x00,                          // GUE, no next header
//! ];
//!
//! let packet = Packet::from_bytes(&buf, LinkType::RawIpv4, &registry);
//! assert!(packet.error().is_none());
//! let gue = packet.gue().unwrap();
//! assert_eq!(gue.version, 0);
//! assert_eq!(gue.protocol, IpProto::IPV6_NONXT);
//! ```

mod macros;

pub mod packet;
