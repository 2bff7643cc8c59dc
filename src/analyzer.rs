//! The analyzer thread: demultiplexes captured segments into per-client
//! flows, drives the MySQL framing state machine, pairs queries with
//! responses, and maintains the fingerprint aggregates.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use etherparse::{IpHeader, PacketHeaders, TransportHeader};
use log::{debug, info, warn};
use rand::Rng;

use crate::capture::PacketObj;
use crate::fingerprint::QueryFormatter;
use crate::flow::Flow;
use crate::query::decode_com_query;
use crate::report::{self, SortKey, Totals};
use crate::stats::{QueryStats, Reservoir, TIME_BUCKETS};
use crate::wire::{carve_packet, command_name, COM_QUERY};

/// Cap on per-direction flow buffers. A stream that grows past this
/// cannot be framed any more and is treated as desynchronized.
const MAX_BUFFER_BYTES: usize = 64 << 20;

/// Minimum spacing between idle-flow sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct Options {
    pub port: u16,
    pub verbose: bool,
    pub show_rows: bool,
    pub interval: Duration,
    pub display_count: usize,
    pub sort: SortKey,
    pub cutoff: u64,
    pub flow_timeout: Duration,
}

/// Owns every piece of mutable analysis state: the flow map, the
/// fingerprint table, the counters, and the global latency reservoir.
/// Everything runs on the one thread that calls [`Analyzer::run`].
pub struct Analyzer {
    opts: Options,
    formatter: QueryFormatter,
    flows: HashMap<String, Flow>,
    queries: HashMap<String, QueryStats>,
    times: Reservoir,
    packets_rcvd: u64,
    packets_rcvd_sync: u64,
    desyncs: u64,
    streams: u64,
    query_count: u64,
    started: Instant,
}

impl Analyzer {
    pub fn new(opts: Options, formatter: QueryFormatter) -> Self {
        Self {
            opts,
            formatter,
            flows: HashMap::new(),
            queries: HashMap::new(),
            times: Reservoir::new(),
            packets_rcvd: 0,
            packets_rcvd_sync: 0,
            desyncs: 0,
            streams: 0,
            query_count: 0,
            started: Instant::now(),
        }
    }

    /// Drain the capture channel until it closes. Status reports and the
    /// idle-flow sweep piggyback on packet arrivals.
    pub fn run(mut self, rx: Receiver<PacketObj>) {
        let mut last_report = Instant::now();
        let mut last_sweep = Instant::now();

        while let Ok(pkt) = rx.recv() {
            self.handle_packet(&pkt);

            if last_sweep.elapsed() >= SWEEP_INTERVAL {
                last_sweep = Instant::now();
                self.evict_idle(Instant::now());
            }

            if !self.opts.verbose
                && self.query_count % 1000 == 0
                && last_report.elapsed() >= self.opts.interval
            {
                last_report = Instant::now();
                self.print_status();
            }
        }

        info!("capture source closed");
        if !self.opts.verbose {
            self.print_status();
        }
    }

    /// Demultiplex one captured frame down to a `(direction, payload)`
    /// segment for the client endpoint that owns the connection.
    fn handle_packet(&mut self, pkt: &PacketObj) {
        let headers = match PacketHeaders::from_ethernet_slice(&pkt.data) {
            Ok(h) => h,
            Err(_) => return,
        };

        let (src_ip, dst_ip) = match headers.ip {
            Some(IpHeader::Version4(h, _)) => (
                Ipv4Addr::from(h.source).to_string(),
                Ipv4Addr::from(h.destination).to_string(),
            ),
            Some(IpHeader::Version6(h, _)) => (
                Ipv6Addr::from(h.source).to_string(),
                Ipv6Addr::from(h.destination).to_string(),
            ),
            None => return,
        };

        let (src_port, dst_port) = match headers.transport {
            Some(TransportHeader::Tcp(t)) => (t.source_port, t.destination_port),
            _ => return,
        };

        let payload = headers.payload;
        if payload.is_empty() {
            return;
        }

        // The client side of the connection is whichever end is not the
        // server port; that endpoint keys the flow.
        let (ip, port, is_request) = if src_port == self.opts.port {
            (dst_ip, dst_port, false)
        } else if dst_port == self.opts.port {
            (src_ip, src_port, true)
        } else {
            warn!("segment on unexpected ports {} -> {}", src_port, dst_port);
            return;
        };

        let endpoint = format!("{}:{}", ip, port);
        self.process_segment(&endpoint, &ip, is_request, payload, pkt.ts);
    }

    fn process_segment(
        &mut self,
        endpoint: &str,
        src_ip: &str,
        is_request: bool,
        data: &[u8],
        ts: Instant,
    ) {
        if !self.flows.contains_key(endpoint) {
            debug!("new flow from {}", endpoint);
            self.streams += 1;
            self.flows.insert(
                endpoint.to_string(),
                Flow::new(endpoint.to_string(), src_ip.to_string(), ts),
            );
        }

        self.packets_rcvd += 1;
        if let Some(flow) = self.flows.get_mut(endpoint) {
            flow.last_seen = ts;
            if flow.synced {
                self.packets_rcvd_sync += 1;
            }
        }

        if is_request {
            self.process_request(endpoint, data, ts);
        } else {
            self.process_response(endpoint, data, ts);
        }
    }

    fn process_request(&mut self, endpoint: &str, data: &[u8], ts: Instant) {
        let Some(flow) = self.flows.get_mut(endpoint) else {
            return;
        };

        // A response still buffered when a new request arrives means the
        // previous exchange was never paired; drop everything and wait
        // for the next COM_QUERY.
        if !flow.resp_buffer.is_empty() {
            self.desyncs += 1;
            flow.desync();
        }

        flow.req_buffer.extend_from_slice(data);
        if flow.req_buffer.len() > MAX_BUFFER_BYTES {
            debug!("request buffer overflow on {}, desyncing", endpoint);
            self.desyncs += 1;
            flow.desync();
            flow.req_sent = None;
            return;
        }

        let (command, payload) = match carve_packet(&mut flow.req_buffer) {
            Ok(v) => v,
            Err(e) => {
                debug!("no complete request packet from {}: {}", endpoint, e);
                return;
            }
        };

        if !flow.synced {
            if command != COM_QUERY {
                debug!(
                    "ignoring {} from {} while unsynced",
                    command_name(command),
                    endpoint
                );
                flow.req_buffer.clear();
                flow.resp_buffer.clear();
                return;
            }
            flow.synced = true;
        }

        let payload_len = payload.len() as u64;
        let query: Vec<u8> = if command == COM_QUERY {
            match decode_com_query(&payload) {
                Ok(text) => text.to_vec(),
                Err(e) => {
                    debug!("failed to decode COM_QUERY from {}: {}", endpoint, e);
                    return;
                }
            }
        } else {
            // Other commands on a synced flow are recorded with their
            // raw payload standing in for the query text.
            payload
        };

        flow.req_sent = Some(ts);
        self.query_count += 1;

        let key = self.formatter.render(&flow.endpoint, &flow.src_ip, &query);
        let stats = self.queries.entry(key.clone()).or_default();
        stats.count += 1;
        stats.bytes += payload_len;
        flow.last_key = Some(key);
        flow.last_bytes = payload_len;
    }

    fn process_response(&mut self, endpoint: &str, data: &[u8], ts: Instant) {
        let Some(flow) = self.flows.get_mut(endpoint) else {
            return;
        };

        flow.resp_buffer.extend_from_slice(data);
        if flow.resp_buffer.len() > MAX_BUFFER_BYTES {
            debug!("response buffer overflow on {}, desyncing", endpoint);
            self.desyncs += 1;
            flow.desync();
            flow.req_sent = None;
            return;
        }

        let Some(sent) = flow.req_sent else {
            // No outstanding request: keep accumulating. The bytes still
            // belong to the last recorded query's volume.
            if let Some(key) = &flow.last_key {
                if let Some(stats) = self.queries.get_mut(key) {
                    stats.bytes += data.len() as u64;
                }
            }
            return;
        };

        let latency = ts.saturating_duration_since(sent).as_nanos() as u64;

        // One uniform draw shared by all three reservoirs.
        let slot = rand::thread_rng().gen_range(0..TIME_BUCKETS);
        flow.times.set(slot, latency);
        self.times.set(slot, latency);
        if let Some(key) = &flow.last_key {
            if let Some(stats) = self.queries.get_mut(key) {
                stats.times.set(slot, latency);
                stats.bytes += data.len() as u64;
            }
        }

        flow.req_sent = None;

        if self.opts.verbose {
            if let Some(key) = &flow.last_key {
                report::print_query_result(
                    &flow.endpoint,
                    key,
                    &flow.resp_buffer,
                    latency,
                    flow.last_bytes,
                    self.opts.show_rows,
                );
            }
        }

        flow.resp_buffer.clear();
    }

    fn evict_idle(&mut self, now: Instant) {
        let timeout = self.opts.flow_timeout;
        let before = self.flows.len();
        self.flows
            .retain(|_, flow| now.saturating_duration_since(flow.last_seen) < timeout);
        let evicted = before - self.flows.len();
        if evicted > 0 {
            debug!("evicted {} idle flow(s)", evicted);
        }
    }

    fn print_status(&self) {
        let totals = Totals {
            queries: self.query_count,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            packets: self.packets_rcvd,
            packets_synced: self.packets_rcvd_sync,
            desyncs: self.desyncs,
            streams: self.streams,
        };
        report::print_status(
            &totals,
            &self.times,
            &self.queries,
            self.opts.display_count,
            self.opts.sort,
            self.opts.cutoff,
        );
    }
}
