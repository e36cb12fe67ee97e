use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use pitrix::{connect_job_client, init_metrics, wait_for_signal, AppMode, Application, ShutdownManager};
use pitrix_core::config::AppConfig;
use pitrix_core::logging::init_logging;
use pitrix_core::{Job, JobAction};
use tracing::{error, info, warn};

fn cli() -> Command {
    Command::new("pitrix")
        .version(env!("CARGO_PKG_VERSION"))
        .about("集群应用生命周期平台 - 作业/任务编排核心")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，未指定时依次尝试默认路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(
            Command::new("run").about("运行控制器").arg(
                Arg::new("mode")
                    .short('m')
                    .long("mode")
                    .value_name("MODE")
                    .help("运行模式")
                    .value_parser(["job", "task", "all"])
                    .default_value("all"),
            ),
        )
        .subcommand(
            Command::new("submit")
                .about("提交作业")
                .arg(Arg::new("cluster").long("cluster").required(true).help("集群ID"))
                .arg(Arg::new("action").long("action").required(true).help("作业动作，例如 CreateCluster"))
                .arg(Arg::new("provider").long("provider").required(true).help("provider名称"))
                .arg(Arg::new("directive").long("directive").default_value("{}").help("作业指令(JSON)"))
                .arg(Arg::new("app").long("app").help("应用ID"))
                .arg(Arg::new("app-version").long("app-version").help("应用版本ID"))
                .arg(Arg::new("owner").long("owner").help("作业所有者"))
                .arg(
                    Arg::new("wait")
                        .long("wait")
                        .action(ArgAction::SetTrue)
                        .help("提交后等待作业结束"),
                ),
        )
        .subcommand(
            Command::new("wait-job")
                .about("等待作业结束")
                .arg(Arg::new("job-id").required(true).help("作业ID")),
        )
        .subcommand(Command::new("config").about("打印生效的配置"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path).context("加载配置失败")?;
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.clone();
    }

    match matches.subcommand() {
        Some(("config", _)) => {
            println!("{}", config.to_toml()?);
            Ok(())
        }
        Some(("run", sub)) => {
            init_logging(&config.logging)?;
            run(config, sub).await
        }
        Some(("submit", sub)) => {
            init_logging(&config.logging)?;
            submit(&config, sub).await
        }
        Some(("wait-job", sub)) => {
            init_logging(&config.logging)?;
            let job_id = sub
                .get_one::<String>("job-id")
                .context("缺少作业ID")?;
            let client = connect_job_client(&config).await?;
            client
                .wait_job(job_id)
                .await
                .with_context(|| format!("作业 {job_id} 未成功结束"))?;
            info!("作业 {job_id} 已成功结束");
            Ok(())
        }
        _ => Err(anyhow::anyhow!("未知的子命令")),
    }
}

fn parse_app_mode(mode: &str) -> Result<AppMode> {
    match mode {
        "job" => Ok(AppMode::Job),
        "task" => Ok(AppMode::Task),
        "all" => Ok(AppMode::All),
        other => Err(anyhow::anyhow!("不支持的运行模式: {other}")),
    }
}

async fn run(config: AppConfig, matches: &ArgMatches) -> Result<()> {
    let mode = parse_app_mode(
        matches
            .get_one::<String>("mode")
            .map(String::as_str)
            .unwrap_or("all"),
    )?;
    info!("启动编排服务，运行模式: {:?}", mode);

    init_metrics(&config.metrics)?;

    let grace = config
        .job_controller
        .shutdown_grace()
        .max(config.task_controller.shutdown_grace());
    let app = Arc::new(Application::new(config, mode).await?);

    let shutdown_manager = ShutdownManager::new();
    let app_handle = {
        let app = Arc::clone(&app);
        let shutdown_rx = shutdown_manager.subscribe().await;
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e}");
            }
        })
    };

    wait_for_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(grace + Duration::from_secs(5), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }
    Ok(())
}

async fn submit(config: &AppConfig, matches: &ArgMatches) -> Result<()> {
    let arg = |name: &str| matches.get_one::<String>(name).cloned();
    let cluster_id = arg("cluster").context("缺少集群ID")?;
    let action = arg("action").context("缺少作业动作")?;
    let provider = arg("provider").context("缺少provider")?;
    let directive = arg("directive").unwrap_or_else(|| "{}".to_string());
    serde_json::from_str::<serde_json::Value>(&directive).context("作业指令不是合法的JSON")?;

    let action = JobAction::from(action);
    if !action.is_known() {
        warn!("未知的作业动作 {action}，集群状态不会被更新");
    }

    let mut job = Job::new(cluster_id, action, provider, directive);
    if let Some(app_id) = arg("app") {
        job = job.with_app(app_id, arg("app-version").unwrap_or_default());
    }
    if let Some(owner) = arg("owner") {
        job = job.with_owner(owner);
    }

    let client = connect_job_client(config).await?;
    let job_id = client.submit(job).await.context("提交作业失败")?;
    println!("{job_id}");

    if matches.get_flag("wait") {
        client
            .wait_job(&job_id)
            .await
            .with_context(|| format!("作业 {job_id} 未成功结束"))?;
        info!("作业 {job_id} 已成功结束");
    }
    Ok(())
}
