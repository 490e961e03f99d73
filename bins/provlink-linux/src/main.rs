use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use provlink_core::{
    AccessPointInterface, DeviceControl, FileCredentialStore, NetConfig, StationInterface,
    StationStatus,
};
use provlink_server::ConnectivityManager;

/// How long the simulated station takes to bring the link up.
const SIM_LINK_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,provlink_server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Provlink connectivity manager starting...");

    let mut config = NetConfig::default();
    // Non-privileged defaults so the simulator runs without root. Real
    // deployments serve DNS on 53 and HTTP on 80.
    config.dns_port = env_port("PROVLINK_DNS_PORT", 5353)?;
    config.http_port = env_port("PROVLINK_HTTP_PORT", 8080)?;

    let store_path = credentials_path()?;
    tracing::info!("credential store: {}", store_path.display());
    let store = Arc::new(FileCredentialStore::new(&store_path));

    let reject = std::env::var_os("PROVLINK_SIM_REJECT").is_some();
    if reject {
        tracing::warn!("PROVLINK_SIM_REJECT set: every connect attempt will be rejected");
    }
    let station = SimulatedStation::new(reject);
    let ap = SimulatedAccessPoint::default();

    let manager = ConnectivityManager::new(
        config.clone(),
        Box::new(station),
        Box::new(ap),
        store,
        Arc::new(ExitOnRestart),
    );
    let handle = manager.handle();

    let machine = tokio::spawn(manager.run());

    tracing::info!("🛜 Provlink ready!");
    tracing::info!("   Portal:  http://localhost:{}/", config.http_port);
    tracing::info!("   DNS:     udp port {}", config.dns_port);
    tracing::info!("");
    tracing::info!("Try these commands:");
    tracing::info!(
        "   curl -d 'ssid=MyNet&password=secret' http://localhost:{}/configure",
        config.http_port
    );
    tracing::info!(
        "   dig +short example.com @127.0.0.1 -p {}",
        config.dns_port
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
            handle.disconnect();
        }
        _ = machine => {
            tracing::warn!("state machine stopped");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn env_port(name: &str, default: u16) -> anyhow::Result<u16> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| anyhow::anyhow!("{} is not a valid port: {}", name, value)),
        Err(_) => Ok(default),
    }
}

fn credentials_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os("PROVLINK_CREDENTIALS") {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME").ok_or_else(|| anyhow::anyhow!("HOME is not set"))?;
    Ok(PathBuf::from(home).join(".provlink").join("credentials.json"))
}

/// Station radio that links up a fixed delay after any connect request
/// (or rejects every attempt when constructed with `reject`).
struct SimulatedStation {
    reject: bool,
    state: Arc<Mutex<SimStation>>,
}

#[derive(Default)]
struct SimStation {
    active: bool,
    connected_at: Option<Instant>,
}

impl SimulatedStation {
    fn new(reject: bool) -> Self {
        Self {
            reject,
            state: Arc::new(Mutex::new(SimStation::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimStation> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl StationInterface for SimulatedStation {
    fn set_active(&mut self, active: bool) {
        self.lock().active = active;
    }

    fn connect(&mut self, ssid: &str, _password: &str) {
        tracing::debug!("simulated station joining '{}'", ssid);
        self.lock().connected_at = Some(Instant::now());
    }

    fn disconnect(&mut self) {
        self.lock().connected_at = None;
    }

    fn is_linked(&self) -> bool {
        if self.reject {
            return false;
        }
        self.lock()
            .connected_at
            .is_some_and(|at| at.elapsed() >= SIM_LINK_DELAY)
    }

    fn status(&self) -> StationStatus {
        if self.reject {
            StationStatus::WrongPassword
        } else {
            StationStatus::Connecting
        }
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        if self.is_linked() {
            Some(Ipv4Addr::new(192, 168, 1, 42))
        } else {
            None
        }
    }
}

/// Access point that is "up" as soon as it is enabled.
#[derive(Default)]
struct SimulatedAccessPoint {
    active: bool,
    address: Option<Ipv4Addr>,
}

impl AccessPointInterface for SimulatedAccessPoint {
    fn configure(&mut self, ssid: &str, _password: &str) {
        tracing::debug!("simulated access point configured as '{}'", ssid);
        // The captive-portal services bind 0.0.0.0; loopback is the
        // address clients reach the simulator on.
        self.address = Some(Ipv4Addr::LOCALHOST);
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        if self.active {
            self.address
        } else {
            None
        }
    }
}

/// On real hardware a provisioning restart reboots the device; the
/// simulator just exits and relies on its supervisor to relaunch it.
struct ExitOnRestart;

impl DeviceControl for ExitOnRestart {
    fn restart(&self) {
        tracing::info!("restart requested, exiting");
        std::process::exit(0);
    }
}
