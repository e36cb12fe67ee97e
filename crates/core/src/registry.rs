use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::constants::TARGET_PILOT;
use crate::errors::{PitrixError, PitrixResult};
use crate::traits::ProviderPlugin;

/// 按名称查找provider插件
///
/// 作业按 `job.provider` 查找拆分者，任务按 `task.target` 查找执行者。
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<HashMap<String, Arc<dyn ProviderPlugin>>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 注册provider，同名覆盖。`pilot` 是保留名称。
    pub async fn register(&self, provider: Arc<dyn ProviderPlugin>) -> PitrixResult<()> {
        let name = provider.name().to_string();
        if name.is_empty() || name == TARGET_PILOT {
            return Err(PitrixError::config_error(format!(
                "provider名称不可用: '{name}'"
            )));
        }
        let mut registry = self.providers.write().await;
        if registry.insert(name.clone(), provider).is_some() {
            info!(provider = %name, "provider replaced");
        } else {
            info!(provider = %name, "provider registered");
        }
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn ProviderPlugin>> {
        let registry = self.providers.read().await;
        registry.get(name).cloned()
    }

    /// 查找provider，未注册时返回 [`PitrixError::UnknownTarget`]
    pub async fn resolve(&self, name: &str) -> PitrixResult<Arc<dyn ProviderPlugin>> {
        self.get(name)
            .await
            .ok_or_else(|| PitrixError::UnknownTarget(name.to_string()))
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let mut registry = self.providers.write().await;
        registry.remove(name).is_some()
    }

    pub async fn contains(&self, name: &str) -> bool {
        let registry = self.providers.read().await;
        registry.contains_key(name)
    }

    pub async fn list(&self) -> Vec<String> {
        let registry = self.providers.read().await;
        let mut names: Vec<String> = registry.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn count(&self) -> usize {
        let registry = self.providers.read().await;
        registry.len()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
