use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use log::{error, info};
use pcap::{Active, Capture, Device};

/// One captured frame, stamped when it left the capture loop.
#[derive(Debug)]
pub struct PacketObj {
    pub ts: Instant,
    pub data: Vec<u8>,
}

/// Open the capture device and install the port filter. Fails fast so
/// the caller can exit before any thread is spawned.
pub fn open(interface: &str, port: u16) -> Result<Capture<Active>, Box<dyn std::error::Error>> {
    let device = if interface == "any" {
        Device::lookup()?.ok_or("no capture device found")?
    } else {
        Device::from(interface)
    };

    let mut cap = Capture::from_device(device)?
        .promisc(true)
        .snaplen(65535)
        .timeout(100)
        .open()?;

    cap.filter(&format!("tcp port {}", port), true)?;
    Ok(cap)
}

/// Forward captured frames to the analyzer until the stop flag drops or
/// the receiving side goes away.
pub fn run(mut cap: Capture<Active>, tx: Sender<PacketObj>, running: Arc<AtomicBool>) {
    info!("capture loop started");

    while running.load(Ordering::Relaxed) {
        match cap.next_packet() {
            Ok(packet) => {
                let obj = PacketObj {
                    ts: Instant::now(),
                    data: packet.data.to_vec(),
                };
                if tx.send(obj).is_err() {
                    break;
                }
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                error!("capture read failed: {}", e);
                break;
            }
        }
    }

    info!("capture loop stopping");
}
