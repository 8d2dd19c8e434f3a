use super::toml_config::WatchConfig;
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "court-watch")]
#[command(about = "Watches tennis court booking grids and notifies when new slots open up")]
pub struct CliArgs {
    #[arg(short, long, default_value = "court-watch.toml", help = "Path to the TOML config file")]
    pub config: PathBuf,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Run a single cycle per facility and exit")]
    pub once: bool,

    #[arg(long, help = "Validate the config file and exit")]
    pub check_config: bool,

    #[arg(long, help = "Keep notified slots in memory only")]
    pub ephemeral: bool,
}

impl CliArgs {
    /// 載入配置；`--once` 會覆寫 max_cycles
    pub fn load_config(&self) -> Result<WatchConfig> {
        let mut config = WatchConfig::from_file(&self.config)?;
        if self.once {
            config.monitoring.max_cycles = 1;
        }
        Ok(config)
    }
}
