use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use logauge_tonic_core::{
    logauge::{System, Workload},
    types::WorkerId,
};
use std::{path::PathBuf, sync::Arc};

/// Runtime configuration for the `logauge-controller` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first when present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "logauge-controller",
    version,
    about = "Coordinates logauge workers through a log generation run"
)]
pub struct ControllerArgs {
    /// Address the controller listens on for worker registrations.
    ///
    /// Environment variable: `LISTEN_ADDR`
    #[arg(long, env = "LISTEN_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub listen_addr: String,

    /// Target system. Defaults to the workload's `system` key.
    ///
    /// Environment variable: `SYSTEM`
    #[arg(long, env = "SYSTEM")]
    pub system: Option<String>,

    /// YAML workload file describing the run.
    ///
    /// Environment variable: `WORKLOAD_FILE`
    #[arg(long, env = "WORKLOAD_FILE")]
    pub workload_file: PathBuf,

    /// Number of workers to wait for before the first phase starts.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 1)]
    pub num_workers: WorkerId,

    /// Append-only file receiving one line per successful worker result.
    ///
    /// Environment variable: `RESULTS_FILE`
    #[arg(long, env = "RESULTS_FILE", default_value = "results.log")]
    pub results_file: PathBuf,

    /// Per-call timeout for phase broadcasts in seconds. 0 waits forever.
    ///
    /// Environment variable: `PHASE_TIMEOUT_SECS`
    #[arg(long, env = "PHASE_TIMEOUT_SECS", default_value_t = 0)]
    pub phase_timeout_secs: u64,

    /// Delay between the terminate broadcast and controller shutdown.
    ///
    /// Environment variable: `SHUTDOWN_GRACE_MS`
    #[arg(long, env = "SHUTDOWN_GRACE_MS", default_value_t = 1000)]
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub listen_addr: String,
    pub system: System,
    pub workload: Arc<Workload>,
    pub num_workers: WorkerId,
    pub results_file: PathBuf,
    pub phase_timeout: Option<Duration>,
    pub shutdown_grace: Duration,
}

impl ControllerConfig {
    /// Builds a configuration around an already loaded workload.
    ///
    /// # Errors
    ///
    /// Fails when the worker count is zero or the workload does not validate.
    pub fn new(workload: Workload, num_workers: WorkerId) -> anyhow::Result<Self> {
        if num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }
        workload.validate()?;
        Ok(Self {
            listen_addr: "0.0.0.0:50051".to_string(),
            system: workload.target()?,
            workload: Arc::new(workload),
            num_workers,
            results_file: PathBuf::from("results.log"),
            phase_timeout: None,
            shutdown_grace: Duration::from_millis(1000),
        })
    }
}

impl TryFrom<ControllerArgs> for ControllerConfig {
    type Error = anyhow::Error;

    fn try_from(args: ControllerArgs) -> Result<Self, Self::Error> {
        let mut workload = Workload::load(&args.workload_file).with_context(|| {
            format!(
                "failed to load workload {}",
                args.workload_file.display()
            )
        })?;
        if let Some(system) = args.system {
            workload.system = system;
        }

        let mut config = Self::new(workload, args.num_workers)?;
        config.listen_addr = args.listen_addr;
        config.results_file = args.results_file;
        config.phase_timeout =
            (args.phase_timeout_secs != 0).then(|| Duration::from_secs(args.phase_timeout_secs));
        config.shutdown_grace = Duration::from_millis(args.shutdown_grace_ms);
        Ok(config)
    }
}

/// Runtime configuration for the `logauge-worker` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "logauge-worker",
    version,
    about = "Generates and forwards log data on behalf of a logauge controller"
)]
pub struct WorkerArgs {
    /// Controller to register with, e.g. `10.0.0.2:50051`.
    ///
    /// Environment variable: `CONTROLLER_ADDR`
    #[arg(long, env = "CONTROLLER_ADDR")]
    pub controller_addr: String,

    /// Address the worker's own endpoint listens on. Port 0 picks a free port.
    ///
    /// Environment variable: `LISTEN_ADDR`
    #[arg(long, env = "LISTEN_ADDR", default_value_t = String::from("0.0.0.0:0"))]
    pub listen_addr: String,

    /// Endpoint registered with the controller. Defaults to the bound address,
    /// which is only reachable when not listening on a wildcard address.
    ///
    /// Environment variable: `ADVERTISE_ADDR`
    #[arg(long, env = "ADVERTISE_ADDR")]
    pub advertise_addr: Option<String>,

    /// Delay between answering terminate and shutting down.
    ///
    /// Environment variable: `SHUTDOWN_GRACE_MS`
    #[arg(long, env = "SHUTDOWN_GRACE_MS", default_value_t = 500)]
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Controller URI, always with a scheme.
    pub controller_addr: String,
    pub listen_addr: String,
    pub advertise_addr: Option<String>,
    pub shutdown_grace: Duration,
}

impl TryFrom<WorkerArgs> for WorkerConfig {
    type Error = anyhow::Error;

    fn try_from(args: WorkerArgs) -> Result<Self, Self::Error> {
        if args.controller_addr.trim().is_empty() {
            bail!("CONTROLLER_ADDR must not be empty");
        }
        Ok(Self {
            controller_addr: with_scheme(&args.controller_addr),
            listen_addr: args.listen_addr,
            advertise_addr: args.advertise_addr.as_deref().map(with_scheme),
            shutdown_grace: Duration::from_millis(args.shutdown_grace_ms),
        })
    }
}

/// Prefixes `http://` unless the address already carries a scheme.
pub fn with_scheme(addr: &str) -> String {
    let addr = addr.trim();
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn workload_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn controller_args(file: &tempfile::NamedTempFile) -> ControllerArgs {
        ControllerArgs::parse_from([
            "logauge-controller",
            "--workload-file",
            file.path().to_str().unwrap(),
            "--num-workers",
            "3",
        ])
    }

    #[test]
    fn controller_defaults() {
        let file = workload_file("system: core\n");
        let config = ControllerConfig::try_from(controller_args(&file)).unwrap();
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.system, System::Core);
        assert_eq!(config.phase_timeout, None);
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
        assert_eq!(config.results_file, PathBuf::from("results.log"));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let file = workload_file("system: core\n");
        let mut args = controller_args(&file);
        args.num_workers = 0;
        assert!(ControllerConfig::try_from(args).is_err());
    }

    #[test]
    fn system_argument_overrides_workload() {
        let file = workload_file("system: core\n");
        let mut args = controller_args(&file);
        args.system = Some("elastic".to_string());
        let err = ControllerConfig::try_from(args).unwrap_err();
        assert!(err.to_string().contains("not supported"), "{err}");
    }

    #[test]
    fn missing_workload_is_fatal() {
        let args = ControllerArgs::parse_from([
            "logauge-controller",
            "--workload-file",
            "/no/such/workload.yaml",
        ]);
        let err = ControllerConfig::try_from(args).unwrap_err();
        assert!(err.to_string().contains("/no/such/workload.yaml"));
    }

    #[test]
    fn worker_addresses_get_a_scheme() {
        let args = WorkerArgs::parse_from([
            "logauge-worker",
            "--controller-addr",
            "10.0.0.2:50051",
            "--advertise-addr",
            "https://w1.internal:7000",
        ]);
        let config = WorkerConfig::try_from(args).unwrap();
        assert_eq!(config.controller_addr, "http://10.0.0.2:50051");
        assert_eq!(
            config.advertise_addr.as_deref(),
            Some("https://w1.internal:7000")
        );
        assert_eq!(config.shutdown_grace, Duration::from_millis(500));
    }
}
