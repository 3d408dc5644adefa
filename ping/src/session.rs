use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use log::debug;
use socket2::Socket;

use crate::app::{Config, PingError, PingResult};
use crate::icmp::{self, DecodeError};
use crate::ip;
use crate::stats::{ProbeResult, Statistics, Summary};
use crate::stop::StopToken;

/// Longest single blocking receive, so a stop request is seen promptly.
const POLL_SLICE: Duration = Duration::from_millis(100);
const RECV_BUFFER_SIZE: usize = 65536;

/// Where echo requests go out and raw IPv4 datagrams come back in.
pub trait Transport {
    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> io::Result<usize>;

    /// Waits at most `wait` for one datagram. `Ok(None)` when nothing came.
    fn recv(&mut self, buffer: &mut [u8], wait: Duration) -> io::Result<Option<usize>>;
}

impl Transport for Socket {
    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> io::Result<usize> {
        Socket::send_to(self, packet, &SocketAddr::new(dest.into(), 0).into())
    }

    fn recv(&mut self, buffer: &mut [u8], wait: Duration) -> io::Result<Option<usize>> {
        // a zero timeout means "block forever" to setsockopt
        self.set_read_timeout(Some(wait.max(Duration::from_millis(1))))?;
        match self.read(buffer) {
            Ok(len) => Ok(Some(len)),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// One ping run against a single resolved destination.
pub struct Session<T, W> {
    transport: T,
    out: W,
    dest: Ipv4Addr,
    label: String,
    config: Config,
    stop: StopToken,
    stats: Statistics,
    ident: u16,
    seq_cnt: u16,
    buffer: Vec<u8>,
}

impl<T: Transport, W: Write> Session<T, W> {
    pub fn new(
        transport: T,
        out: W,
        dest: Ipv4Addr,
        label: String,
        config: Config,
        stop: StopToken,
    ) -> Session<T, W> {
        Session {
            transport,
            out,
            dest,
            label,
            config,
            stop,
            stats: Statistics::new(),
            ident: std::process::id() as u16,
            seq_cnt: 1,
            buffer: vec![0u8; RECV_BUFFER_SIZE],
        }
    }

    #[cfg(test)]
    pub fn with_ident(mut self, ident: u16) -> Self {
        self.ident = ident;
        self
    }

    /// Probes until the count is reached or a stop is requested, then
    /// prints the trailer and returns the final summary.
    pub fn run(&mut self) -> PingResult<Summary> {
        let size = self.config.payload_size;
        writeln!(
            self.out,
            "PING {} ({}) {}({}) bytes of data.",
            self.label,
            self.dest,
            size,
            size + icmp::HEADER_SIZE + ip::MIN_HEADER_SIZE
        )?;
        if self.config.verbose {
            writeln!(self.out, "ft_ping: identifier 0x{:04x}", self.ident)?;
        }
        debug!("session identifier {}", self.ident);

        let mut probes = 0u64;
        while !self.stop.is_stopped() {
            self.probe()?;
            probes += 1;

            if self.config.count.map_or(false, |count| probes >= count) {
                break;
            }
            self.seq_cnt = self.seq_cnt.wrapping_add(1);
            if self.stop.wait_timeout(self.config.interval) {
                break;
            }
        }

        self.finish()
    }

    /// One send, wait, report cycle.
    fn probe(&mut self) -> PingResult<()> {
        let packet = icmp::build_echo_request(self.ident, self.seq_cnt, self.config.payload_size);

        let sent_at = Instant::now();
        self.transport
            .send_to(&packet, self.dest)
            .map_err(PingError::Send)?;
        self.stats.record_sent();
        debug!("sent icmp_seq={} ({} bytes)", self.seq_cnt, packet.len());

        match self.wait_reply(sent_at)? {
            Some(result) => {
                self.stats.record_received(result.rtt_ms());
                writeln!(self.out, "{}", result)?;
            }
            None if self.stop.is_stopped() => {}
            None => {
                debug!("no reply for icmp_seq={}", self.seq_cnt);
                if self.config.verbose {
                    writeln!(self.out, "Request timeout for icmp_seq {}", self.seq_cnt)?;
                }
            }
        }
        Ok(())
    }

    /// Reads datagrams until the outstanding request is answered, the
    /// timeout runs out or a stop is requested.
    fn wait_reply(&mut self, sent_at: Instant) -> PingResult<Option<ProbeResult>> {
        let deadline = sent_at + self.config.timeout;

        loop {
            if self.stop.is_stopped() {
                return Ok(None);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let wait = (deadline - now).min(POLL_SLICE);
            let len = match self
                .transport
                .recv(&mut self.buffer, wait)
                .map_err(PingError::Receive)?
            {
                Some(len) => len,
                None => continue,
            };
            let received_at = Instant::now();

            match icmp::parse_reply(&self.buffer[..len]) {
                Ok(reply) if reply.ident != self.ident => {
                    debug!("ignoring reply for identifier {}", reply.ident);
                }
                Ok(reply) if reply.seq_cnt != self.seq_cnt => {
                    debug!(
                        "ignoring stale reply icmp_seq={} (waiting for {})",
                        reply.seq_cnt, self.seq_cnt
                    );
                }
                Ok(reply) => {
                    return Ok(Some(ProbeResult {
                        seq_cnt: reply.seq_cnt,
                        rtt: received_at.duration_since(sent_at),
                        source: reply.source,
                        ttl: reply.ttl,
                        bytes: reply.len,
                    }));
                }
                // our own requests show up on the raw socket when pinging localhost
                Err(DecodeError::Unexpected {
                    kind: icmp::ECHO_REQUEST,
                    ..
                }) => {}
                Err(DecodeError::Unexpected { from, kind, code }) => {
                    debug!("icmp type={} code={} from {}", kind, code, from);
                    if self.config.verbose {
                        writeln!(self.out, "From {}: {}", from, icmp::describe(kind, code))?;
                    }
                }
                Err(err) => {
                    debug!("dropping malformed reply ({} bytes): {}", len, err);
                }
            }
        }
    }

    fn finish(&mut self) -> PingResult<Summary> {
        let summary = self.stats.summarize();
        writeln!(self.out)?;
        writeln!(self.out, "--- {} ping statistics ---", self.label)?;
        writeln!(self.out, "{}", summary)?;
        self.out.flush()?;
        Ok(summary)
    }
}
