use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pitrix_core::config::{AppConfig, DatabaseBackend, MetricsConfig, QueueBackend};
use pitrix_core::traits::{ClusterManager, PilotClient};
use pitrix_core::{Controller, ControllerSettings, ProviderRegistry, UnitHandler};
use pitrix_dispatcher::{JobClient, JobController, JobControllerDeps};
use pitrix_infrastructure::{
    register_providers, HttpClusterManager, HttpPilotClient, Repositories, WorkQueueFactory,
    WorkQueues,
};
use pitrix_worker::{TaskController, TaskControllerDeps};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行作业控制器
    Job,
    /// 仅运行任务控制器
    Task,
    /// 两个控制器都运行
    All,
}

impl AppMode {
    pub fn runs_jobs(self) -> bool {
        matches!(self, AppMode::Job | AppMode::All)
    }

    pub fn runs_tasks(self) -> bool {
        matches!(self, AppMode::Task | AppMode::All)
    }
}

/// 控制器依赖的全部外部组件
#[derive(Clone)]
pub struct Backends {
    pub queues: WorkQueues,
    pub repositories: Repositories,
    pub cluster_manager: Arc<dyn ClusterManager>,
    /// 只有任务控制器需要
    pub pilot: Option<Arc<dyn PilotClient>>,
    pub providers: ProviderRegistry,
}

impl Backends {
    /// 按配置创建队列、仓储和远程服务客户端
    pub async fn from_config(config: &AppConfig, mode: AppMode) -> Result<Self> {
        let queues = WorkQueueFactory::create(&config.queue)
            .await
            .context("创建工作队列失败")?;
        let repositories = Repositories::create(&config.database)
            .await
            .context("创建作业/任务仓储失败")?;

        let cluster_manager: Arc<dyn ClusterManager> = Arc::new(
            HttpClusterManager::new(&config.cluster_manager).context("创建集群管理客户端失败")?,
        );

        let pilot: Option<Arc<dyn PilotClient>> = if mode.runs_tasks() {
            Some(Arc::new(
                HttpPilotClient::new(&config.pilot).context("创建pilot客户端失败")?,
            ))
        } else {
            None
        };

        let providers = ProviderRegistry::new();
        register_providers(&providers, &config.providers, Arc::clone(&cluster_manager))
            .await
            .context("注册provider失败")?;
        info!("已注册provider: {:?}", providers.list().await);

        Ok(Self {
            queues,
            repositories,
            cluster_manager,
            pilot,
            providers,
        })
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    backends: Backends,
    job_controller: Option<Arc<Controller<JobController>>>,
    task_controller: Option<Arc<Controller<TaskController>>>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);
        let backends = Backends::from_config(&config, mode).await?;
        Self::with_backends(config, mode, backends)
    }

    /// 使用已创建好的外部组件组装控制器
    pub fn with_backends(config: AppConfig, mode: AppMode, backends: Backends) -> Result<Self> {
        let job_controller = if mode.runs_jobs() {
            let hostname = config.job_controller.resolve_hostname();
            let handler = JobController::new(
                JobControllerDeps {
                    jobs: Arc::clone(&backends.repositories.jobs),
                    tasks: Arc::clone(&backends.repositories.tasks),
                    task_queue: Arc::clone(&backends.queues.task),
                    providers: backends.providers.clone(),
                    cluster_manager: Arc::clone(&backends.cluster_manager),
                },
                config.wait.task_policy(),
                hostname,
            );
            Some(Arc::new(Controller::new(
                Arc::new(handler),
                Arc::clone(&backends.queues.job),
                ControllerSettings::from(&config.job_controller),
            )))
        } else {
            None
        };

        let task_controller = if mode.runs_tasks() {
            let pilot = backends
                .pilot
                .clone()
                .context("任务控制器需要pilot客户端")?;
            let hostname = config.task_controller.resolve_hostname();
            let handler = TaskController::new(
                TaskControllerDeps {
                    tasks: Arc::clone(&backends.repositories.tasks),
                    pilot,
                    providers: backends.providers.clone(),
                    cluster_manager: Arc::clone(&backends.cluster_manager),
                },
                config.wait.subtask_policy(),
                hostname,
            );
            Some(Arc::new(Controller::new(
                Arc::new(handler),
                Arc::clone(&backends.queues.task),
                ControllerSettings::from(&config.task_controller),
            )))
        } else {
            None
        };

        Ok(Self {
            config,
            mode,
            backends,
            job_controller,
            task_controller,
        })
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    /// 提交作业和等待结果用的客户端
    pub fn job_client(&self) -> JobClient {
        JobClient::new(
            Arc::clone(&self.backends.repositories.jobs),
            Arc::clone(&self.backends.repositories.tasks),
            Arc::clone(&self.backends.queues.job),
            self.config.wait.job_policy(),
            self.config.wait.task_policy(),
        )
    }

    /// 运行控制器直到收到关闭信号，然后在宽限期内等待在途单元结束
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        let mut handles = Vec::new();
        if let Some(controller) = &self.job_controller {
            handles.push(spawn_controller(controller, shutdown_rx.resubscribe()));
        }
        if let Some(controller) = &self.task_controller {
            handles.push(spawn_controller(controller, shutdown_rx.resubscribe()));
        }

        let _ = shutdown_rx.recv().await;
        info!("应用收到关闭信号，停止提取新的工作单元");

        for handle in handles {
            if let Err(e) = handle.await {
                error!("控制器循环异常退出: {e}");
            }
        }

        if let Some(controller) = &self.job_controller {
            drain(controller, self.config.job_controller.shutdown_grace()).await;
        }
        if let Some(controller) = &self.task_controller {
            drain(controller, self.config.task_controller.shutdown_grace()).await;
        }

        info!("应用程序已停止");
        Ok(())
    }
}

/// 只连接队列和仓储，供提交作业、等待作业的命令使用
///
/// 内存队列和内存仓储只存在于控制器进程内，独立的命令进程无法共享，
/// 因此这里只接受外部后端。
pub async fn connect_job_client(config: &AppConfig) -> Result<JobClient> {
    if config.queue.backend == QueueBackend::Memory {
        return Err(anyhow::anyhow!(
            "工作队列后端为memory，提交或等待作业的独立进程无法与控制器共享内存队列，请改用redis"
        ));
    }
    if config.database.backend == DatabaseBackend::Memory {
        return Err(anyhow::anyhow!(
            "仓储后端为memory，提交或等待作业的独立进程无法与控制器共享内存仓储，请改用postgres"
        ));
    }
    let queues = WorkQueueFactory::create(&config.queue)
        .await
        .context("创建工作队列失败")?;
    let repositories = Repositories::create(&config.database)
        .await
        .context("创建作业/任务仓储失败")?;
    Ok(JobClient::new(
        repositories.jobs,
        repositories.tasks,
        queues.job,
        config.wait.job_policy(),
        config.wait.task_policy(),
    ))
}

fn spawn_controller<H: UnitHandler>(
    controller: &Arc<Controller<H>>,
    shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let controller = Arc::clone(controller);
    tokio::spawn(async move { controller.serve(shutdown_rx).await })
}

async fn drain<H: UnitHandler>(controller: &Controller<H>, grace: Duration) {
    let kind = controller.handler().kind();
    if controller.drain(grace).await {
        info!("{kind} 控制器的在途单元已全部结束");
    } else {
        warn!(
            "{kind} 控制器在 {:?} 内未能结束全部在途单元，剩余 {} 个",
            grace,
            controller.in_flight()
        );
    }
}

/// 启动Prometheus指标导出
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }
    let address: SocketAddr = config
        .listen_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {}", config.listen_address))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus指标导出器失败: {e}"))?;

    info!("Prometheus metrics exporter listening on {address}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_client_rejects_in_process_queue() {
        let config = AppConfig::default();
        let Err(err) = connect_job_client(&config).await else {
            panic!("memory backends must be rejected");
        };
        assert!(err.to_string().contains("memory"));
    }

    #[tokio::test]
    async fn test_job_client_rejects_in_process_repository() {
        let mut config = AppConfig::default();
        config.queue.backend = QueueBackend::Redis;
        config.queue.redis_url = "redis://127.0.0.1:1".to_string();
        let Err(err) = connect_job_client(&config).await else {
            panic!("memory repository must be rejected");
        };
        assert!(err.to_string().contains("仓储后端为memory"));
    }
}
