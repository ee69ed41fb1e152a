//! Every decoded protocol's header type, bundled into one closed enum, and
//! the `register_all` wiring that matches `register.h`.

pub mod arp;
pub mod dhcp;
pub mod dns;
pub mod eth;
pub mod http;
pub mod icmp;
pub mod igmp;
pub mod imap;
pub mod ip;
pub mod nbds;
pub mod nbns;
pub mod pim;
pub mod smb;
pub mod smtp;
pub mod snmp;
pub mod ssdp;
pub mod stp;
pub mod tcp;
pub mod tls;
pub mod udp;

use crate::layer::{ethertype, ip_proto, llc, port, Layer, LINK_ETHERNET};
use crate::registry::Registry;

/// Every protocol's decoded header, keyed by which handler produced it.
/// A `Pdu` carries exactly one of these alongside its dispatch key.
pub enum ProtocolData<'p> {
    /// A frame no registered handler would touch; the bytes are kept
    /// verbatim so the packet is still inspectable.
    Raw(&'p [u8]),
    Ethernet(eth::EthernetFrame<'p>),
    Snap(eth::SnapFrame),
    Stp { llc: eth::LlcHeader, bpdu: stp::StpBpdu },
    Arp(arp::ArpPacket),
    Ipv4(ip::Ipv4Header<'p>),
    Ipv6(ip::Ipv6Header),
    Icmp(icmp::IcmpPacket<'p>),
    Icmpv6(icmp::IcmpPacket<'p>),
    Igmp(igmp::IgmpPacket),
    Pim(pim::PimHeader),
    Tcp(tcp::TcpHeader<'p>),
    Udp(udp::UdpHeader),
    Dns(dns::DnsMessage<'p>),
    Nbns(nbns::NbnsMessage<'p>),
    Nbds(nbds::NbdsHeader),
    Dhcp(dhcp::DhcpMessage<'p>),
    Http(http::HttpMessage<'p>),
    Imap(imap::ImapLine<'p>),
    Smtp(smtp::SmtpLine<'p>),
    Snmp(snmp::SnmpMessage<'p>),
    Ssdp(ssdp::SsdpMessage<'p>),
    Tls(tls::TlsRecord),
    Smb(smb::SmbHeader),
}

/// Register every handler under its dispatch key. Mirrors the grounding
/// source's `register.h`: one `register(...)` call per protocol, link
/// layer down through the application layer.
pub fn register_all(registry: &mut Registry) {
    registry.register(Layer::Link, LINK_ETHERNET, "eth", "Ethernet", Box::new(eth::EthernetHandler::new()));

    registry.register(Layer::EtherType, ethertype::ARP, "arp", "Address Resolution Protocol", Box::new(arp::ArpHandler::new()));
    registry.register(Layer::EtherType, ethertype::IPV4, "ipv4", "Internet Protocol version 4", Box::new(ip::Ipv4Handler::new()));
    registry.register(Layer::EtherType, ethertype::IPV6, "ipv6", "Internet Protocol version 6", Box::new(ip::Ipv6Handler::new()));

    registry.register(Layer::Llc802, llc::SNAP, "snap", "Subnetwork Access Protocol", Box::new(eth::SnapHandler::new()));
    registry.register(Layer::Llc802, llc::STP, "stp", "Spanning Tree Protocol", Box::new(stp::StpHandler::new()));

    registry.register(Layer::IpProto, ip_proto::ICMP, "icmp", "Internet Control Message Protocol", Box::new(icmp::IcmpHandler::new()));
    registry.register(Layer::IpProto, ip_proto::IGMP, "igmp", "Internet Group Management Protocol", Box::new(igmp::IgmpHandler::new()));
    registry.register(Layer::IpProto, ip_proto::TCP, "tcp", "Transmission Control Protocol", Box::new(tcp::TcpHandler::new()));
    registry.register(Layer::IpProto, ip_proto::UDP, "udp", "User Datagram Protocol", Box::new(udp::UdpHandler::new()));
    registry.register(Layer::IpProto, ip_proto::IPV6_ICMP, "icmpv6", "ICMP for IPv6", Box::new(icmp::Icmpv6Handler::new()));
    registry.register(Layer::IpProto, ip_proto::PIM, "pim", "Protocol Independent Multicast", Box::new(pim::PimHandler::new()));

    registry.register(Layer::Port, port::DNS, "dns", "Domain Name System", Box::new(dns::DnsHandler::new()));
    registry.register(Layer::Port, port::NBNS, "nbns", "NetBIOS Name Service", Box::new(nbns::NbnsHandler::new()));
    registry.register(Layer::Port, port::NBDS, "nbds", "NetBIOS Datagram Service", Box::new(nbds::NbdsHandler::new()));
    registry.register(Layer::Port, port::DHCP, "dhcp", "Dynamic Host Configuration Protocol", Box::new(dhcp::DhcpHandler::new()));
    registry.register(Layer::Port, port::DHCP_SERVER, "dhcp", "Dynamic Host Configuration Protocol", Box::new(dhcp::DhcpHandler::new()));
    registry.register(Layer::Port, port::HTTP, "http", "Hypertext Transfer Protocol", Box::new(http::HttpHandler::new()));
    registry.register(Layer::Port, port::IMAP, "imap", "Internet Message Access Protocol", Box::new(imap::ImapHandler::new()));
    registry.register(Layer::Port, port::SMTP, "smtp", "Simple Mail Transfer Protocol", Box::new(smtp::SmtpHandler::new()));
    registry.register(Layer::Port, port::SNMP, "snmp", "Simple Network Management Protocol", Box::new(snmp::SnmpHandler::new()));
    registry.register(Layer::Port, port::SSDP, "ssdp", "Simple Service Discovery Protocol", Box::new(ssdp::SsdpHandler::new()));
    registry.register(Layer::Port, port::TLS, "tls", "Transport Layer Security", Box::new(tls::TlsHandler::new()));
    registry.register(Layer::Port, port::SMB, "smb", "Server Message Block", Box::new(smb::SmbHandler::new()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_protocol_named_in_register_all_is_reachable_by_lookup() {
        let mut registry = Registry::new();
        register_all(&mut registry);
        assert!(registry.get(Layer::Link, LINK_ETHERNET).is_some());
        assert!(registry.get(Layer::EtherType, ethertype::IPV4).is_some());
        assert!(registry.get(Layer::EtherType, ethertype::IPV6).is_some());
        assert!(registry.get(Layer::IpProto, ip_proto::TCP).is_some());
        assert!(registry.get(Layer::Port, port::DNS).is_some());
        assert!(registry.get(Layer::Port, port::SMB).is_some());
    }
}
