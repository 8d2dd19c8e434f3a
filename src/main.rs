use clap::Parser;
use court_watch::utils::error::WatchError;
use court_watch::utils::{logger, validation::Validate};
use court_watch::{app, CliArgs, WatchConfig};
use tokio::sync::watch;

fn exit_with(e: &WatchError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(1);
}

fn print_summary(config: &WatchConfig) {
    println!("✅ Configuration is valid");
    println!(
        "⏱️  Every {}s, scanning {} days{}",
        config.monitoring.interval_seconds,
        config.monitoring.scan_days,
        match config.monitoring.max_cycles {
            0 => String::new(),
            n => format!(", {} cycles max", n),
        }
    );
    let channels: Vec<String> = config.notifications.channels.iter().map(|c| c.to_string()).collect();
    println!("📨 Channels: {}", channels.join(", "));
    for facility in &config.facilities {
        println!("🎾 {} → {}", facility.name, facility.state_path());
    }
}

/// Ctrl+C 或 SIGTERM 時通知所有迴圈停止
async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting court-watch");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    if args.check_config {
        print_summary(&config);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                tracing::info!("🛑 Shutdown requested, finishing current cycle");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // sender 被丟棄後迴圈不會被取消，只能靠 max_cycles 結束
                tracing::warn!(error = %e, "Could not install signal handler");
            }
        }
    });

    match app::run_facilities(&config, args.ephemeral, shutdown_rx).await {
        Ok(cycles) => {
            tracing::info!("✅ court-watch stopped after {} cycles", cycles);
            Ok(())
        }
        Err(e) => exit_with(&e),
    }
}
