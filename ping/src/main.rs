mod app;
mod icmp;
mod ip;
mod session;
mod stats;
mod stop;

use std::io;
use std::process;

use app::PingApp;
use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use log::LevelFilter;

fn main() {
    let app = match PingApp::from_args() {
        Ok(app) => app,
        Err(err) => exit_with(err),
    };

    let level = if app.verbose() {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(err) = app.run() {
        exit_with(err);
    }
}

fn exit_with(err: app::PingError) -> ! {
    if io::stderr().is_tty() {
        eprintln!("{} {}", "ft_ping:".red(), err);
    } else {
        eprintln!("ft_ping: {}", err);
    }
    process::exit(1);
}
