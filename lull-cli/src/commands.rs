use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use lull_config::LullConfig;
use lull_core::Timeout;
use lull_net::socket::{self, Connect};
use lull_net::{poll, PollEvents, PollFd};
use lull_timer::{Timer, Wait};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "lull", version, about)]
pub struct Cli {
    /// Config file to load instead of `config/lull.yaml`
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Block for a timeout (`20ms`, `2s`, `forever`, ...)
    Sleep(SleepArgs),
    /// Arm a periodic timer and wait for a number of expirations
    Timer(TimerArgs),
    /// Non-blocking TCP connect with a timeout
    Probe(ProbeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SleepArgs {
    pub timeout: Timeout,
}

#[derive(Args, Debug, Clone)]
pub struct TimerArgs {
    /// First expiration; defaults to the period
    #[arg(long)]
    pub delay: Option<Timeout>,
    /// Interval between expirations; defaults to `timer.default_period`
    #[arg(long)]
    pub period: Option<Timeout>,
    /// Expirations to wait for
    #[arg(long, default_value_t = 3)]
    pub ticks: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    pub ip: String,
    pub port: u16,
    /// Defaults to `net.connect_timeout`
    #[arg(long)]
    pub timeout: Option<Timeout>,
}

pub fn run_command(command: Commands, config: &LullConfig) -> anyhow::Result<()> {
    match command {
        Commands::Sleep(args) => run_sleep(args),
        Commands::Timer(args) => run_timer(args, config),
        Commands::Probe(args) => run_probe(args, config),
    }
}

fn run_sleep(args: SleepArgs) -> anyhow::Result<()> {
    info!(timeout = %args.timeout, "sleeping");
    let start = Instant::now();
    lull_core::sleep(args.timeout);
    info!(elapsed = ?start.elapsed(), "awake");
    Ok(())
}

fn run_timer(args: TimerArgs, config: &LullConfig) -> anyhow::Result<()> {
    let period = args.period.unwrap_or(config.timer.default_period);
    let delay = args.delay.unwrap_or(period);
    if args.ticks > 1 && period.as_nanos() <= 0 {
        bail!("{} ticks need a positive period, got {period}", args.ticks);
    }
    if delay.as_nanos() <= 0 {
        bail!("delay must be positive, got {delay}");
    }

    let timer = Timer::with_clock(config.timer.clock)?;
    timer.start_periodic(delay, period);
    info!(clock = ?timer.clock(), %delay, %period, ticks = args.ticks, "timer started");

    let mut seen = 0;
    while seen < args.ticks {
        match timer.wait_ready(Timeout::FOREVER).context("waiting for timer")? {
            Wait::Ready => {
                let expirations = timer.ack();
                seen += expirations;
                info!(expirations, total = seen, "tick");
            }
            Wait::TimedOut => continue,
        }
    }
    timer.stop();
    Ok(())
}

fn run_probe(args: ProbeArgs, config: &LullConfig) -> anyhow::Result<()> {
    let timeout = args.timeout.unwrap_or(config.net.connect_timeout);
    let target = format!("{}:{}", args.ip, args.port);

    let fd = socket::tcp_socket(config.net.non_blocking).context("creating socket")?;
    let started = Instant::now();
    if socket::connect(&fd, &args.ip, args.port).with_context(|| format!("connecting to {target}"))?
        == Connect::InProgress
    {
        let mut fds = [PollFd::new(fd.as_raw_fd(), PollEvents::WRITABLE)];
        if poll(&mut fds, timeout)? == 0 {
            warn!(%target, %timeout, "connect timed out");
            bail!("connect to {target} timed out after {timeout}");
        }
        match socket::socket_status(&fd).with_context(|| format!("connecting to {target}"))? {
            Connect::Connected => {}
            Connect::InProgress => bail!("connect to {target} still in progress after poll"),
        }
    }

    info!(%target, elapsed = ?started.elapsed(), "connected");
    println!("{target} open");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_timeouts() {
        let cli = Cli::try_parse_from(["lull", "timer", "--period", "20ms", "--ticks", "2"]).unwrap();
        match cli.command {
            Commands::Timer(args) => {
                assert_eq!(args.period, Some(Timeout::from_millis(20)));
                assert_eq!(args.delay, None);
                assert_eq!(args.ticks, 2);
            }
            other => panic!("expected timer, got {other:?}"),
        }

        let cli = Cli::try_parse_from(["lull", "sleep", "forever"]).unwrap();
        assert!(matches!(cli.command, Commands::Sleep(SleepArgs { timeout }) if timeout.is_forever()));

        assert!(Cli::try_parse_from(["lull", "sleep", "soon"]).is_err());
    }

    #[test]
    fn sleep_no_wait_returns() {
        let args = SleepArgs {
            timeout: Timeout::NO_WAIT,
        };
        run_command(Commands::Sleep(args), &LullConfig::default()).unwrap();
    }

    #[test]
    fn timer_counts_ticks() {
        let args = TimerArgs {
            delay: None,
            period: Some(Timeout::from_millis(5)),
            ticks: 2,
        };
        run_command(Commands::Timer(args), &LullConfig::default()).unwrap();
    }

    #[test]
    fn timer_rejects_repeats_without_period() {
        let args = TimerArgs {
            delay: Some(Timeout::from_millis(5)),
            period: Some(Timeout::NO_WAIT),
            ticks: 2,
        };
        assert!(run_command(Commands::Timer(args), &LullConfig::default()).is_err());
    }

    #[test]
    fn probe_reaches_local_listener() {
        let listener = socket::tcp_socket(false).unwrap();
        socket::listen(&listener, 0, 8).unwrap();
        let port = socket::local_port(&listener).unwrap();

        let args = ProbeArgs {
            ip: "127.0.0.1".into(),
            port,
            timeout: Some(Timeout::from_secs(1)),
        };
        run_command(Commands::Probe(args), &LullConfig::default()).unwrap();
    }

    #[test]
    fn probe_rejects_bad_address() {
        let args = ProbeArgs {
            ip: "not-an-ip".into(),
            port: 80,
            timeout: Some(Timeout::from_millis(10)),
        };
        assert!(run_command(Commands::Probe(args), &LullConfig::default()).is_err());
    }
}
