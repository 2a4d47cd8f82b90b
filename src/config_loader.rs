use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration '{}'", config_path.display()))?;

    config.validate()?;

    let pool_count: usize = config.clouds.values().map(|c| c.pools.len()).sum();
    info!(
        "Loaded {} clouds with {} configured pools",
        config.clouds.len(),
        pool_count
    );
    check_sharing_declarations(&config);

    Ok(config)
}

/// Warn about `shared_with` entries that can never produce a group edge
pub fn check_sharing_declarations(config: &Config) {
    for (cloud_id, cloud) in &config.clouds {
        for pool in &cloud.pools {
            for peer in &pool.shared_with {
                if peer == cloud_id {
                    warn!(
                        "Pool {}/{} declares sharing with its own cloud; ignoring",
                        cloud_id, pool.name
                    );
                } else if !config.clouds.contains_key(peer) {
                    warn!(
                        "Pool {}/{} is shared with unknown cloud '{}'; ignoring",
                        cloud_id, pool.name, peer
                    );
                }
            }
        }
    }
}
