pub mod vmbased;

use std::sync::Arc;

use pitrix_core::config::ProviderConfig;
use pitrix_core::traits::ClusterManager;
use pitrix_core::{PitrixResult, ProviderRegistry};

pub use vmbased::{CloudApi, CloudResponse, HttpCloudApi, VmBasedProvider};

/// 按配置构造并注册全部provider
pub async fn register_providers(
    registry: &ProviderRegistry,
    configs: &[ProviderConfig],
    cluster_manager: Arc<dyn ClusterManager>,
) -> PitrixResult<()> {
    for config in configs {
        let cloud = Arc::new(HttpCloudApi::new(&config.endpoint, config.request_timeout())?);
        let provider = VmBasedProvider::new(&config.name, cloud, Arc::clone(&cluster_manager));
        registry.register(Arc::new(provider)).await?;
    }
    Ok(())
}
