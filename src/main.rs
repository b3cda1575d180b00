use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use job_scheduler::{
    seed_jobs, wait_for_shutdown_signal, LogHandler, SchedulerContext, SchedulerLifecycle,
    ShutdownManager, LOG_HANDLER,
};
use scheduler_core::{AppConfig, Clock, SystemClock};
use scheduler_infrastructure::InMemoryJobStore;
use scheduler_worker::DefaultHandlerRegistry;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("job-scheduler")
        .version("1.0.0")
        .about("秒级精度的周期任务触发调度引擎")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时查找 config/scheduler.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");

    // 加载配置
    let config = AppConfig::load(config_path.map(String::as_str)).with_context(|| {
        format!(
            "加载配置失败: {}",
            config_path.map(String::as_str).unwrap_or("<默认路径>")
        )
    })?;

    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.logging.level.clone());
    let log_format = matches
        .get_one::<String>("log-format")
        .cloned()
        .unwrap_or_else(|| config.logging.format.clone());

    // 初始化日志系统
    init_logging(&log_level, &log_format)?;

    info!("启动任务调度引擎");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    // 任务存储与处理器
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = InMemoryJobStore::new();
    seed_jobs(
        &store,
        config.jobs.clone(),
        clock.now_millis(),
        config.scheduler.pre_read_window_ms,
    )
    .await;
    if config.jobs.is_empty() {
        warn!("配置中没有任务，调度引擎将空转");
    }

    let registry = DefaultHandlerRegistry::new();
    registry.register(LOG_HANDLER, Arc::new(LogHandler)).await;

    let context = SchedulerContext::new(config.scheduler.clone(), Arc::new(store), Arc::new(registry))
        .with_clock(clock);
    let lifecycle = Arc::new(SchedulerLifecycle::new(context)?);

    // 创建优雅关闭管理器
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let shutdown_rx = shutdown_manager.subscribe();
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move {
            if let Err(e) = lifecycle.run(shutdown_rx).await {
                error!("调度引擎运行失败: {e}");
            }
        })
    };

    // 等待关闭信号
    wait_for_shutdown_signal().await;

    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown();

    // 等待引擎关闭，上限为时间环排空时间加宽限期
    let stop_budget = Duration::from_millis(
        config.scheduler.ring_drain_timeout_ms + config.scheduler.shutdown_grace_ms + 5_000,
    );
    match tokio::time::timeout(stop_budget, app_handle).await {
        Ok(Ok(())) => info!("调度引擎已优雅关闭"),
        Ok(Err(e)) => error!("调度引擎关闭时发生错误: {e}"),
        Err(_) => warn!("调度引擎关闭超时，强制退出"),
    }

    info!("任务调度引擎已退出");
    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}
