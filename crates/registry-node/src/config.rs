use clap::Parser;
use registry_mempool::{MempoolConfig, CHALLENGE_WINDOW_SECS, LICENSE_WINDOW_SECS};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "registry-node")]
#[command(about = "Star registry node: wallet-validated claims on a hash-chained ledger")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: String,

    /// Data directory for sled
    #[arg(long, default_value = "./data")]
    pub data_dir: String,

    /// Seconds a validation request stays open for signing
    #[arg(long, default_value_t = CHALLENGE_WINDOW_SECS)]
    pub challenge_window_secs: u64,

    /// Seconds a verified wallet has to register its star
    #[arg(long, default_value_t = LICENSE_WINDOW_SECS)]
    pub license_window_secs: u64,
}

impl Args {
    pub fn mempool_config(&self) -> MempoolConfig {
        MempoolConfig {
            challenge_window: Duration::from_secs(self.challenge_window_secs),
            license_window: Duration::from_secs(self.license_window_secs),
        }
    }
}
