//! # Strider CLI
//!
//! 外骨骼数据采集命令行入口。
//!
//! ```bash
//! # 引导一个只有表头的空数据集（文件已存在时拒绝覆盖）
//! strider-cli init-dataset --output dataset.csv
//!
//! # 按配置运行采集回路（Ctrl-C 停止）
//! strider-cli run --config strider.toml
//!
//! # 单独发一轮停止指令（清除伺服的锁存故障）
//! strider-cli stop --config strider.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strider_collect::{CollectConfig, Collector, DatasetSink, SerialForceSensor};
use strider_driver::{MultiBusRouter, Transport};
use tracing::warn;

/// Strider CLI - 外骨骼数据采集工具
#[derive(Parser, Debug)]
#[command(name = "strider-cli")]
#[command(about = "Command-line interface for Strider exoskeleton data collection", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行采集回路
    Run {
        /// 配置文件路径
        #[arg(short, long, default_value = "strider.toml")]
        config: PathBuf,

        /// 覆盖配置中的数据集标签
        #[arg(long)]
        episode: Option<String>,

        /// 覆盖配置中的输出路径
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// 创建只有表头的空数据集
    InitDataset {
        /// 数据集输出路径
        #[arg(short, long)]
        output: PathBuf,
    },

    /// 对全部伺服发一轮停止指令（清除锁存故障）
    Stop {
        /// 配置文件路径
        #[arg(short, long, default_value = "strider.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("strider_cli=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            episode,
            output,
        } => run(config, episode, output),

        Commands::InitDataset { output } => {
            DatasetSink::bootstrap(&output)
                .with_context(|| format!("bootstrapping dataset at {}", output.display()))?;
            println!("📄 Created header-only dataset: {}", output.display());
            Ok(())
        },

        Commands::Stop { config } => {
            let config = load_config(&config)?;
            let mut router = build_router(&config)?;
            router.stop_all().context("stop-all transaction failed")?;
            println!("🛑 Stop-all issued to {} servos", router.servo_count());
            Ok(())
        },
    }
}

fn load_config(path: &PathBuf) -> Result<CollectConfig> {
    CollectConfig::load(path).with_context(|| format!("loading config from {}", path.display()))
}

fn run(config_path: PathBuf, episode: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(&config_path)?;
    if let Some(episode) = episode {
        config.episode = episode;
    }
    if let Some(output) = output {
        config.output = output;
    }

    let sink = DatasetSink::open(&config.output)
        .with_context(|| format!("opening dataset at {}", config.output.display()))?;
    let router = build_router(&config)?;

    // 力传感器是次要数据：打不开就降级运行，Force 列留空
    let force = match &config.serial {
        Some(serial) => match SerialForceSensor::open(serial) {
            Ok(sensor) => Some(sensor),
            Err(e) => {
                warn!(
                    "Force sensor '{}' unavailable, Force column will stay empty: {}",
                    serial.port, e
                );
                None
            },
        },
        None => None,
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        })
        .context("installing Ctrl-C handler")?;
    }

    let mut collector = Collector::new(
        router,
        force,
        sink,
        config.episode.clone(),
        config.period(),
        &config.servos,
    );

    let stats = collector.run(&shutdown)?;

    println!();
    println!("📊 Run summary:");
    println!("  episode:        {}", config.episode);
    println!("  dataset:        {}", config.output.display());
    println!("  cycles:         {}", stats.cycles);
    println!("  missed replies: {}", stats.missed_replies);
    println!("  overruns:       {}", stats.overruns);
    Ok(())
}

/// 按配置的拓扑打开各总线并启动路由器
#[cfg(target_os = "linux")]
fn build_router(config: &CollectConfig) -> Result<MultiBusRouter> {
    use strider_bus::SocketCanFdAdapter;
    use strider_driver::{RouterBuilder, RouterConfig};

    let mut builder = RouterBuilder::new().config(RouterConfig {
        transact_timeout_ms: config.transact_timeout_ms,
        ..RouterConfig::default()
    });

    for (channel, bus) in config.channels().into_iter().zip(&config.buses) {
        let adapter = SocketCanFdAdapter::new(&bus.interface)
            .with_context(|| format!("opening CAN interface '{}'", bus.interface))?;
        builder = builder.bus(channel, adapter);
    }

    Ok(builder.build()?)
}

#[cfg(not(target_os = "linux"))]
fn build_router(_config: &CollectConfig) -> Result<MultiBusRouter> {
    anyhow::bail!("The SocketCAN transport is only available on Linux")
}
