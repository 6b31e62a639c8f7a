use clap::Parser;
use gue_strata::packet::layer::LinkType;
use gue_strata::packet::registry::DecoderRegistry;
use gue_strata::packet::tunnel::gue::GUE_DEFAULT_PORT;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

mod packet_metadata;
mod process;
mod stats;

use packet_metadata::link_type_of;

#[derive(Parser, Debug)]
#[command(name = "gue-reader")]
#[command(about = "Decode GUE tunnels in PCAP/PCAPNG captures", long_about = None)]
struct Args {
    /// Path to the PCAP file to read
    #[arg(short, long, value_name = "FILE")]
    pcap: PathBuf,

    /// UDP port carrying GUE
    #[arg(short, long, value_name = "PORT", default_value_t = GUE_DEFAULT_PORT)]
    gue_port: u16,

    /// dump packet contents
    #[arg(short, long)]
    dump_packet: bool,

    /// print statistics at the end
    #[arg(short, long)]
    stats: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let stats = stats::Stats::default();
    let registry = DecoderRegistry::default().with_gue_port(args.gue_port);

    info!("Reading PCAP file: {:?} (GUE on UDP port {})", args.pcap, args.gue_port);
    if let Err(e) = process_pcap(&args.pcap, &args, &registry, &stats) {
        error!("Failed to process PCAP file: {}", e);
        std::process::exit(1);
    }
    if args.stats {
        println!("{stats}");
    }
    info!("PCAP processing completed!");
}

/// Link type announced by a capture header. Unsupported types fall back to
/// guessing from each packet.
fn capture_link_type(linktype: Linktype) -> Option<LinkType> {
    let link_type = link_type_of(linktype);
    if link_type.is_none() {
        warn!("Unsupported link type {:?}, guessing from packet contents", linktype);
    }
    link_type
}

fn open(pcap_path: &Path) -> Result<File, String> {
    File::open(pcap_path).map_err(|e| format!("Cannot open {:?}: {}", pcap_path, e))
}

/// Process PCAP file packet by packet
fn process_pcap(
    pcap_path: &Path,
    args: &Args,
    registry: &DecoderRegistry,
    stats: &stats::Stats,
) -> Result<(), String> {
    let mut local_stats = stats::LocalStats::new();

    let mut packet_count = 0;
    let mut bytes_count = 0;

    let start = std::time::Instant::now();

    let mut link_type = None;

    match PcapNGReader::new(65536, open(pcap_path)?) {
        Ok(mut reader) => {
            info!("Detected PCAPNG format");
            loop {
                match reader.next() {
                    Ok((offset, block)) => {
                        match block {
                            PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                                packet_count += 1;
                                bytes_count += epb.caplen as u64;
                                process::process_packet(
                                    packet_count,
                                    link_type,
                                    &epb,
                                    registry,
                                    &mut local_stats,
                                    stats,
                                    args.dump_packet,
                                );
                            }
                            PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                                packet_count += 1;
                                bytes_count += spb.origlen as u64;
                                process::process_packet(
                                    packet_count,
                                    link_type,
                                    &spb,
                                    registry,
                                    &mut local_stats,
                                    stats,
                                    args.dump_packet,
                                );
                            }
                            PcapBlockOwned::NG(Block::SectionHeader(_shb)) => {
                                info!("PCAPNG Section Header found");
                            }
                            PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                                // Only the last interface is tracked
                                info!("PCAPNG Interface Description found: {:?}", idb.linktype);
                                link_type = capture_link_type(idb.linktype);
                            }
                            _ => {}
                        }
                        reader.consume(offset);
                    }
                    Err(PcapError::Eof) => break,
                    Err(PcapError::Incomplete(_)) => {
                        reader
                            .refill()
                            .map_err(|e| format!("Error refilling PCAPNG buffer: {:?}", e))?;
                    }
                    Err(e) => {
                        return Err(format!("Error reading PCAPNG: {:?}", e));
                    }
                }
            }
        }
        Err(_) => {
            let mut reader = LegacyPcapReader::new(65536, open(pcap_path)?)
                .map_err(|e| format!("Failed to create PCAP reader: {:?}", e))?;

            loop {
                match reader.next() {
                    Ok((offset, block)) => {
                        match block {
                            PcapBlockOwned::Legacy(packet) => {
                                packet_count += 1;
                                bytes_count += packet.caplen as u64;
                                process::process_packet(
                                    packet_count,
                                    link_type,
                                    &packet,
                                    registry,
                                    &mut local_stats,
                                    stats,
                                    args.dump_packet,
                                );
                            }
                            PcapBlockOwned::LegacyHeader(header) => {
                                info!("Legacy PCAP header found: {:?}", header.network);
                                link_type = capture_link_type(header.network);
                            }
                            _ => {}
                        }
                        reader.consume(offset);
                    }
                    Err(PcapError::Eof) => break,
                    Err(PcapError::Incomplete(_)) => {
                        reader
                            .refill()
                            .map_err(|e| format!("Error refilling PCAP buffer: {:?}", e))?;
                    }
                    Err(e) => {
                        return Err(format!("Error reading PCAP: {:?}", e));
                    }
                }
            }
        }
    }

    local_stats.flush(stats);

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "Total packets processed: {}, {:.3}M pkt/sec, {:.3} Gbps",
        packet_count,
        (packet_count as f64 / elapsed) / 1_000_000.0,
        (bytes_count as f64 * 8.0) / (elapsed * 1_000_000_000.0)
    );
    Ok(())
}
