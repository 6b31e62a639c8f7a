//! Header enum wrapping every decoded layer
//!
//! [`Header`] is what decoders hand to
//! [`PacketBuilder::add_layer`](crate::packet::layer::PacketBuilder::add_layer)
//! and what a [`Packet`](crate::packet::Packet) stores.

use std::fmt;

use super::ether::EtherHeader;
use super::icmp::IcmpHeader;
use super::ipv4::Ipv4HeaderOpt;
use super::ipv6::Ipv6Header;
use super::layer::LayerType;
use super::tunnel::gue::GueHeader;
use super::udp::UdpHeader;

#[derive(Debug, Clone)]
pub enum Header<'a> {
    Ethernet(&'a EtherHeader),
    Ipv4(Ipv4HeaderOpt<'a>),
    Ipv6(&'a Ipv6Header),
    Udp(&'a UdpHeader),
    Icmp(&'a IcmpHeader),
    Gue(GueHeader<'a>),
}

impl Header<'_> {
    /// Returns the layer kind
    pub fn layer_type(&self) -> LayerType {
        match self {
            Header::Ethernet(_) => LayerType::Ethernet,
            Header::Ipv4(_) => LayerType::Ipv4,
            Header::Ipv6(_) => LayerType::Ipv6,
            Header::Udp(_) => LayerType::Udp,
            Header::Icmp(_) => LayerType::Icmp,
            Header::Gue(_) => LayerType::Gue,
        }
    }

    /// Returns the protocol name
    pub fn name(&self) -> &'static str {
        match self {
            Header::Ethernet(_) => "Ethernet",
            Header::Ipv4(_) => "IPv4",
            Header::Ipv6(_) => "IPv6",
            Header::Udp(_) => "UDP",
            Header::Icmp(_) => "ICMP",
            Header::Gue(_) => "GUE",
        }
    }
}

impl fmt::Display for Header<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Header::Ethernet(h) => write!(f, "{}", h),
            Header::Ipv4(h) => write!(f, "{}", h),
            Header::Ipv6(h) => write!(f, "{}", h),
            Header::Udp(h) => write!(f, "{}", h),
            Header::Icmp(h) => write!(f, "{}", h),
            Header::Gue(h) => write!(f, "{}", h),
        }
    }
}
