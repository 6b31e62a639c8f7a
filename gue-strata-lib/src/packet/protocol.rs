//! EtherType and IP protocol numbers
//!
//! Only the numbers this crate dispatches on, plus the ones commonly seen
//! inside GUE tunnels, carry a name. Any other value is still representable
//! and displays as hex.
//!
//! # Examples
//!
//! ```
//! use gue_strata::packet::protocol::IpProto;
//!
//! assert_eq!(IpProto::from(4), IpProto::IP_ENCAP);
//! assert_eq!(IpProto::IP_ENCAP.to_string(), "ip-encap");
//! assert_eq!(IpProto::from(200).to_string(), "0xc8");
//! assert_eq!("ipv6-icmp".parse::<IpProto>().unwrap(), IpProto::IPV6_ICMP);
//!
//! let value: u8 = IpProto::UDP.into();
//! assert_eq!(value, 17);
//! ```

use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U16};

crate::protocol_constants! {
    /// EtherType carried by Ethernet II frames.
    EtherProto, U16<BigEndian>, u16:
        IPV4 = 0x0800;
        ARP = 0x0806;
        TEB = 0x6558;
        VLAN_8021Q = 0x8100;
        IPV6 = 0x86DD;
        MPLS_UC = 0x8847;
        MPLS_MC = 0x8848;
        VLAN_8021AD = 0x88A8;
}

crate::protocol_constants! {
    /// IP protocol number (IPv4 Protocol, IPv6 Next Header, GUE Protocol).
    IpProto, u8:
        IPV6_HOPOPT = 0;
        ICMP = 1;
        IGMP = 2;
        IP_ENCAP = 4;
        TCP = 6;
        UDP = 17;
        IPV6 = 41;
        IPV6_ROUTE = 43;
        IPV6_FRAG = 44;
        GRE = 47;
        ESP = 50;
        AH = 51;
        IPV6_ICMP = 58;
        IPV6_NONXT = 59;
        IPV6_OPTS = 60;
        ETHERIP = 97;
        SCTP = 132;
        UDPLITE = 136;
        MPLS_IN_IP = 137;
}

impl IpProto {
    /// Protocols whose payload is itself an IP packet
    #[inline]
    pub fn is_ip_in_ip(&self) -> bool {
        matches!(*self, IpProto::IP_ENCAP | IpProto::IPV6)
    }
}
