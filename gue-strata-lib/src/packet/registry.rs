//! Protocol number to decoder lookup
//!
//! The registry is the only place that knows which decoder handles which
//! EtherType, IP protocol number or UDP port. Decoders themselves only report a
//! [`NextLayer`].
//!
//! GUE has no well-known port, so it is never bound by default:
//!
//! ```
//! use gue_strata::packet::layer::NextLayer;
//! use gue_strata::packet::registry::DecoderRegistry;
//! use gue_strata::packet::tunnel::gue::GUE_DEFAULT_PORT;
//!
//! let plain = DecoderRegistry::default();
//! let next = NextLayer::Udp { src_port: 40000, dst_port: GUE_DEFAULT_PORT };
//! assert!(plain.lookup(next).is_none());
//!
//! let registry = DecoderRegistry::default().with_gue_port(GUE_DEFAULT_PORT);
//! assert!(registry.lookup(next).is_some());
//! ```

use std::collections::HashMap;
use std::fmt;

use ahash::RandomState;

use crate::packet::ether::decode_ether;
use crate::packet::icmp::decode_icmp;
use crate::packet::ipv4::decode_ipv4;
use crate::packet::ipv6::decode_ipv6;
use crate::packet::layer::{DecodeFn, LinkType, NextLayer};
use crate::packet::protocol::{EtherProto, IpProto};
use crate::packet::tunnel::gue::decode_gue;
use crate::packet::udp::decode_udp;

#[derive(Clone)]
pub struct DecoderRegistry {
    link: HashMap<LinkType, DecodeFn, RandomState>,
    ether: HashMap<EtherProto, DecodeFn, RandomState>,
    ip: HashMap<IpProto, DecodeFn, RandomState>,
    udp_ports: HashMap<u16, DecodeFn, RandomState>,
}

impl DecoderRegistry {
    /// A registry without any decoder
    pub fn empty() -> Self {
        Self {
            link: HashMap::with_hasher(RandomState::new()),
            ether: HashMap::with_hasher(RandomState::new()),
            ip: HashMap::with_hasher(RandomState::new()),
            udp_ports: HashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn register_link(&mut self, link_type: LinkType, decode: DecodeFn) -> &mut Self {
        self.link.insert(link_type, decode);
        self
    }

    pub fn register_ether(&mut self, proto: EtherProto, decode: DecodeFn) -> &mut Self {
        self.ether.insert(proto, decode);
        self
    }

    pub fn register_ip(&mut self, proto: IpProto, decode: DecodeFn) -> &mut Self {
        self.ip.insert(proto, decode);
        self
    }

    /// Bind a UDP port. Either the destination or the source port may match.
    pub fn register_udp_port(&mut self, port: u16, decode: DecodeFn) -> &mut Self {
        self.udp_ports.insert(port, decode);
        self
    }

    pub fn unregister_udp_port(&mut self, port: u16) -> Option<DecodeFn> {
        self.udp_ports.remove(&port)
    }

    /// Bind GUE to `port`
    pub fn with_gue_port(mut self, port: u16) -> Self {
        self.register_udp_port(port, decode_gue);
        self
    }

    /// Decoder for `next`, if any. UDP checks the destination port first.
    pub fn lookup(&self, next: NextLayer) -> Option<DecodeFn> {
        match next {
            NextLayer::Link(link_type) => self.link.get(&link_type).copied(),
            NextLayer::Ether(proto) => self.ether.get(&proto).copied(),
            NextLayer::Ip(proto) => self.ip.get(&proto).copied(),
            NextLayer::Udp { src_port, dst_port } => self
                .udp_ports
                .get(&dst_port)
                .or_else(|| self.udp_ports.get(&src_port))
                .copied(),
            NextLayer::Done => None,
        }
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("link", &self.link.keys().collect::<Vec<_>>())
            .field("ether", &self.ether.keys().collect::<Vec<_>>())
            .field("ip", &self.ip.keys().collect::<Vec<_>>())
            .field("udp_ports", &self.udp_ports.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for DecoderRegistry {
    /// Ethernet, IPv4, IPv6 (including IP-in-IP), UDP and ICMP
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register_link(LinkType::Ethernet, decode_ether)
            .register_link(LinkType::RawIpv4, decode_ipv4)
            .register_link(LinkType::RawIpv6, decode_ipv6)
            .register_ether(EtherProto::IPV4, decode_ipv4)
            .register_ether(EtherProto::IPV6, decode_ipv6)
            .register_ip(IpProto::ICMP, decode_icmp)
            .register_ip(IpProto::UDP, decode_udp)
            .register_ip(IpProto::IP_ENCAP, decode_ipv4)
            .register_ip(IpProto::IPV6, decode_ipv6);
        registry
    }
}
