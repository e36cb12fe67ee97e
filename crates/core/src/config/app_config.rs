use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::models::*;
use crate::constants::{DEFAULT_CONFIG_PATHS, ENV_PREFIX, ENV_SEPARATOR};

/// 系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub queue: QueueConfig,
    pub database: DatabaseConfig,
    pub job_controller: ControllerConfig,
    pub task_controller: ControllerConfig,
    pub wait: WaitConfig,
    pub pilot: EndpointConfig,
    pub cluster_manager: EndpointConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            database: DatabaseConfig::default(),
            job_controller: ControllerConfig::with_max_workers(20),
            task_controller: ControllerConfig::with_max_workers(50),
            wait: WaitConfig::default(),
            pilot: EndpointConfig::default(),
            cluster_manager: EndpointConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            providers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// 加载配置
    ///
    /// 加载顺序：
    /// 1. 内置默认值
    /// 2. 配置文件（TOML），未指定路径时依次尝试默认路径
    /// 3. 环境变量覆盖，例如 `PITRIX__TASK_CONTROLLER__MAX_WORKERS=80`
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.queue.validate().context("队列配置验证失败")?;
        self.database.validate().context("数据库配置验证失败")?;
        self.job_controller
            .validate()
            .context("作业控制器配置验证失败")?;
        self.task_controller
            .validate()
            .context("任务控制器配置验证失败")?;
        self.wait.validate().context("等待配置验证失败")?;
        self.pilot.validate().context("pilot配置验证失败")?;
        self.cluster_manager
            .validate()
            .context("集群管理服务配置验证失败")?;
        self.logging.validate().context("日志配置验证失败")?;
        self.metrics.validate().context("指标配置验证失败")?;

        let mut names = HashSet::new();
        for provider in &self.providers {
            provider
                .validate()
                .with_context(|| format!("provider配置验证失败: {}", provider.name))?;
            if !names.insert(provider.name.as_str()) {
                return Err(anyhow::anyhow!("provider名称重复: {}", provider.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.job_controller.max_workers, 20);
        assert_eq!(config.task_controller.max_workers, 50);
        assert_eq!(config.job_controller.busy_backoff_seconds, 10);
        assert_eq!(config.job_controller.dequeue_backoff_seconds, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [task_controller]
            max_workers = 8

            [[providers]]
            name = "vmbased"
            endpoint = "http://cloud.local:9100"
            "#,
        )
        .unwrap();

        assert_eq!(config.task_controller.max_workers, 8);
        assert_eq!(config.task_controller.busy_backoff_seconds, 10);
        assert_eq!(config.job_controller.max_workers, 20);
        assert_eq!(config.providers[0].kind, "vmbased");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(AppConfig::from_toml("[job_controller]\nmax_workers = 0\n").is_err());
        assert!(AppConfig::from_toml("[wait]\nsubtask_interval_seconds = 0\n").is_err());
        assert!(AppConfig::from_toml(
            "[queue]\njob_queue = \"same\"\ntask_queue = \"same\"\n"
        )
        .is_err());
        assert!(AppConfig::from_toml(
            "[[providers]]\nname = \"pilot\"\nendpoint = \"http://x\"\n"
        )
        .is_err());
    }

    #[test]
    fn test_load_file_then_environment_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[queue]\nbackend = \"memory\"\n\n[job_controller]\nmax_workers = 4\nhostname = \"ctl-1\"\n"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.job_controller.max_workers, 4);
        assert_eq!(config.job_controller.resolve_hostname(), "ctl-1");

        std::env::set_var("PITRIX__JOB_CONTROLLER__MAX_WORKERS", "6");
        let overridden = AppConfig::load(Some(&path));
        std::env::remove_var("PITRIX__JOB_CONTROLLER__MAX_WORKERS");
        assert_eq!(overridden.unwrap().job_controller.max_workers, 6);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load(Some("/nonexistent/pitrix.toml")).is_err());
    }

    #[test]
    fn test_to_toml_renders_sections() {
        let rendered = AppConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[job_controller]"));
        assert!(rendered.contains("max_workers = 50"));
    }
}
