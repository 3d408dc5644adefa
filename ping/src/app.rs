use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use clap::{App, Arg, ArgMatches};
use log::{debug, info};
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::Resolver;

use crate::session::Session;
use crate::stop::StopToken;

/// Largest ICMP payload that fits in one IPv4 datagram.
const MAX_PAYLOAD_SIZE: usize = 65507 - 8;
const MIN_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum PingError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0}: Name or service not known")]
    UnknownHost(String),
    #[error("{0}: IPv6 is not supported")]
    Ipv6Unsupported(String),
    #[error("socket: {0}")]
    Socket(#[source] io::Error),
    #[error("sendto: {0}")]
    Send(#[source] io::Error),
    #[error("recvmsg: {0}")]
    Receive(#[source] io::Error),
    #[error("signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("io error: {error}")]
    IoError {
        #[from]
        #[source]
        error: io::Error,
    },
}
pub type PingResult<T> = Result<T, PingError>;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub count: Option<u64>,
    pub interval: Duration,
    pub timeout: Duration,
    pub payload_size: usize,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: String::new(),
            count: None,
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(1),
            payload_size: 56,
            verbose: false,
        }
    }
}

impl Config {
    fn from_matches(matches: &ArgMatches) -> PingResult<Config> {
        let mut config = Config {
            host: matches
                .value_of("DESTINATION")
                .unwrap_or_default()
                .to_string(),
            verbose: matches.is_present("verbose"),
            ..Config::default()
        };

        if let Some(count) = matches.value_of("count") {
            match count.parse::<u64>() {
                Ok(count) if count > 0 => config.count = Some(count),
                _ => return Err(invalid("count", count)),
            }
        }
        if let Some(interval) = matches.value_of("interval") {
            let interval = parse_seconds("interval", interval)?;
            if interval < MIN_INTERVAL {
                return Err(PingError::InvalidArgument(format!(
                    "interval {:?} is below the minimum of {:?}",
                    interval, MIN_INTERVAL
                )));
            }
            config.interval = interval;
        }
        if let Some(timeout) = matches.value_of("timeout") {
            let timeout = parse_seconds("timeout", timeout)?;
            if timeout.is_zero() {
                return Err(invalid("timeout", "0"));
            }
            config.timeout = timeout;
        }
        if let Some(size) = matches.value_of("size") {
            match size.parse::<usize>() {
                Ok(size) if size <= MAX_PAYLOAD_SIZE => config.payload_size = size,
                _ => return Err(invalid("size", size)),
            }
        }

        Ok(config)
    }
}

fn invalid(name: &str, value: &str) -> PingError {
    PingError::InvalidArgument(format!("{}: '{}'", name, value))
}

/// Fractional seconds, as in `-i 0.5`.
fn parse_seconds(name: &str, value: &str) -> PingResult<Duration> {
    match value.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 && secs < u32::MAX as f64 => {
            Ok(Duration::from_secs_f64(secs))
        }
        _ => Err(invalid(name, value)),
    }
}

pub struct PingApp {
    config: Config,
}

impl PingApp {
    fn command() -> App<'static> {
        App::new("ft_ping")
            .arg(
                Arg::new("DESTINATION")
                    .takes_value(true)
                    .required(true)
                    .help("IPv4 address or host name to ping"),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Verbose output"),
            )
            .arg(
                Arg::new("count")
                    .takes_value(true)
                    .short('c')
                    .long("count")
                    .value_name("COUNT")
                    .help("Stop after sending COUNT packets"),
            )
            .arg(
                Arg::new("interval")
                    .takes_value(true)
                    .allow_hyphen_values(true)
                    .short('i')
                    .long("interval")
                    .value_name("SECS")
                    .help("Wait SECS seconds between packets (default 1)"),
            )
            .arg(
                Arg::new("size")
                    .takes_value(true)
                    .short('s')
                    .long("size")
                    .value_name("BYTES")
                    .help("Send BYTES bytes of data (default 56)"),
            )
            .arg(
                Arg::new("timeout")
                    .takes_value(true)
                    .allow_hyphen_values(true)
                    .short('W')
                    .long("timeout")
                    .value_name("SECS")
                    .help("Wait at most SECS seconds for each reply (default 1)"),
            )
            .mut_arg("help", |arg| arg.short_alias('?'))
            .about("Send ICMP ECHO_REQUEST packets to network hosts.")
            .version("0.1.0")
    }

    pub fn from_args() -> PingResult<PingApp> {
        let matches = Self::command().get_matches();
        Ok(PingApp {
            config: Config::from_matches(&matches)?,
        })
    }

    pub fn verbose(&self) -> bool {
        self.config.verbose
    }

    pub fn run(&self) -> PingResult<()> {
        let addr = look_up_ip(&self.config.host)?;
        info!("{} resolved to {}", self.config.host, addr);

        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(PingError::Socket)?;

        let stop = StopToken::new();
        stop.install_handler()?;

        let stdout = io::stdout();
        let mut session = Session::new(
            socket,
            stdout.lock(),
            addr,
            self.config.host.clone(),
            self.config.clone(),
            stop,
        );
        session.run()?;
        Ok(())
    }
}

fn look_up_ip(host: &str) -> PingResult<Ipv4Addr> {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => return Ok(addr),
        Ok(IpAddr::V6(_)) => return Err(PingError::Ipv6Unsupported(host.to_string())),
        Err(_) => {}
    }

    let resolver = Resolver::from_system_conf()
        .or_else(|_| Resolver::new(ResolverConfig::default(), ResolverOpts::default()))?;
    let lookup = resolver.lookup_ip(host).map_err(|err| {
        debug!("lookup of {} failed: {}", host, err);
        PingError::UnknownHost(host.to_string())
    })?;

    lookup
        .iter()
        .find_map(|ip| match ip {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| PingError::UnknownHost(host.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> PingResult<Config> {
        let matches = PingApp::command()
            .try_get_matches_from(std::iter::once("ft_ping").chain(args.iter().copied()))
            .expect("clap rejected the arguments");
        Config::from_matches(&matches)
    }

    #[test]
    fn defaults() {
        let config = parse(&["example.com"]).unwrap();
        assert_eq!(config.host, "example.com");
        assert_eq!(config.count, None);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.payload_size, 56);
        assert!(!config.verbose);
    }

    #[test]
    fn all_options() {
        let config = parse(&["-v", "-c", "5", "-i", "0.5", "-s", "100", "-W", "2.5", "10.0.0.1"]).unwrap();
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.count, Some(5));
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.payload_size, 100);
        assert!(config.verbose);
    }

    #[test]
    fn bad_values() {
        assert!(matches!(parse(&["-c", "0", "h"]), Err(PingError::InvalidArgument(_))));
        assert!(matches!(parse(&["-c", "x", "h"]), Err(PingError::InvalidArgument(_))));
        assert!(matches!(parse(&["-i", "0.1", "h"]), Err(PingError::InvalidArgument(_))));
        assert!(matches!(parse(&["-W", "0", "h"]), Err(PingError::InvalidArgument(_))));
        assert!(matches!(parse(&["-s", "70000", "h"]), Err(PingError::InvalidArgument(_))));
    }

    #[test]
    fn negative_durations_are_rejected() {
        assert!(matches!(parse(&["-i", "-1", "h"]), Err(PingError::InvalidArgument(_))));
        assert!(matches!(parse(&["--interval=-0.5", "h"]), Err(PingError::InvalidArgument(_))));
        assert!(matches!(parse(&["-W", "-2", "h"]), Err(PingError::InvalidArgument(_))));
        assert!(matches!(parse(&["--timeout", "-inf", "h"]), Err(PingError::InvalidArgument(_))));
    }

    #[test]
    fn question_mark_asks_for_help() {
        let err = PingApp::command()
            .try_get_matches_from(["ft_ping", "-?"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::ErrorKind::DisplayHelp);
    }

    #[test]
    fn destination_is_required() {
        assert!(PingApp::command().try_get_matches_from(["ft_ping"]).is_err());
    }

    #[test]
    fn literal_addresses_skip_the_resolver() {
        assert_eq!(look_up_ip("192.0.2.1").unwrap(), Ipv4Addr::new(192, 0, 2, 1));
        assert!(matches!(look_up_ip("::1"), Err(PingError::Ipv6Unsupported(_))));
    }
}
