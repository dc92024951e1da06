// Slicing subsystem binary: builds the DL scheduler, the RAN manager and the
// controller agent, drives an idle MAC cadence, and keeps everything alive
// until Ctrl+C.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ran_slicer::agent::RrcInterface;
use ran_slicer::agent::RrcMeasConfig;
use ran_slicer::config::AgentConfig;
use ran_slicer::error::SliceResult;
use ran_slicer::mac::UeDb;
use ran_slicer::threading::{set_cpu_affinity, set_thread_core, set_thread_priority};
use ran_slicer::transport::ControllerLink;
use ran_slicer::{AgentDispatch, ControlAgent, DlRanScheduler, RanManager};

/// Command-line options layered over the configuration file.
struct CliOptions {
    config: Option<PathBuf>,
    ctrl_addr: Option<String>,
    ctrl_port: Option<u16>,
    no_agent: bool,
}

fn parse_cli_options() -> CliOptions {
    let mut options =
        CliOptions { config: None, ctrl_addr: None, ctrl_port: None, no_agent: false };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let (key, inline) = match arg.split_once('=') {
            Some((k, v)) => (k.to_string(), Some(v.to_string())),
            None => (arg, None),
        };
        let value = |args: &mut dyn Iterator<Item = String>| inline.clone().or_else(|| args.next());
        match key.as_str() {
            "--config" => options.config = value(&mut args).map(PathBuf::from),
            "--ctrl-addr" => options.ctrl_addr = value(&mut args),
            "--ctrl-port" => {
                options.ctrl_port = value(&mut args).and_then(|v| v.parse().ok());
            }
            "--no-agent" => options.no_agent = true,
            _ => {}
        }
    }
    options
}

/// Allocatable RBGs for a cell width.
fn nof_rbg_for_prbs(n_prb: u8) -> u32 {
    match n_prb {
        6 => 6,
        15 => 8,
        25 => 13,
        50 => 17,
        75 => 19,
        _ => 25,
    }
}

/// RRC seam of the binary: the RRC stack lives outside this crate, so
/// measurement reconfigurations are only logged here.
struct LoggingRrc;

impl RrcInterface for LoggingRrc {
    fn setup_ue_measurement(&self, rnti: u16, cfg: &RrcMeasConfig) -> SliceResult<()> {
        info!(rnti, entries = cfg.entries.len(), "RRC measurement reconfiguration");
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = parse_cli_options();
    let mut cfg = match &options.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    if let Some(addr) = options.ctrl_addr {
        cfg.ctrl_addr = addr;
    }
    if let Some(port) = options.ctrl_port {
        cfg.ctrl_port = port;
    }
    cfg.validate()?;

    // Keep the subsystem on a small, fixed set of cores.
    set_cpu_affinity(3);

    let mac = Arc::new(DlRanScheduler::new());
    let ran = Arc::new(RanManager::new(mac.clone()));

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::Relaxed);
    })?;

    // Simulated MAC cadence: with no PHY attached the UE database stays
    // empty, but the scheduler runs its real per-subframe path.
    let nof_rbg = nof_rbg_for_prbs(cfg.n_prb);
    let driver_mac = mac.clone();
    let driver_running = shutdown.clone();
    let tti_counter = Arc::new(AtomicU32::new(0));
    let driver_tti = tti_counter.clone();
    let _driver = std::thread::Builder::new().name("tti-driver".to_string()).spawn(move || {
        set_thread_priority(2);
        set_thread_core(0);
        let ue_db = UeDb::new();
        while !driver_running.load(Ordering::Relaxed) {
            let tti = driver_tti.fetch_add(1, Ordering::Relaxed) % 10240;
            driver_mac.new_tti(&ue_db, 0, nof_rbg, 3, tti);
            std::thread::sleep(Duration::from_millis(1));
        }
    })?;

    let agent_handles = if options.no_agent {
        info!("agent disabled, running scheduler only");
        None
    } else {
        let agent = Arc::new(ControlAgent::new(cfg.clone(), ran.clone(), Arc::new(LoggingRrc)));
        let dispatch = Arc::new(AgentDispatch::new(agent.clone(), ran.clone()));
        let link = ControllerLink::start(cfg.enb_id, cfg.ctrl_endpoint(), dispatch)?;
        agent.set_transport(link.clone());
        agent.clone().start()?;
        info!(endpoint = %cfg.ctrl_endpoint(), enb_id = cfg.enb_id, "agent running");
        Some((agent, link))
    };

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("shutting down");
    if let Some((agent, link)) = agent_handles {
        agent.stop();
        link.stop();
    }

    Ok(())
}
