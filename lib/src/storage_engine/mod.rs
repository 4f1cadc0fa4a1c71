// lib/src/storage_engine/mod.rs

use std::sync::Arc;
use log::{debug, info};
use models::errors::{HospitalError, HospitalResult};

pub mod inmemory_storage;
pub mod storage_engine;
#[cfg(feature = "mysql-datastore")]
pub mod mysql_schema;
#[cfg(feature = "mysql-datastore")]
pub mod mysql_storage;

pub use crate::config::{StorageConfig, StorageEngineType};
pub use inmemory_storage::InMemoryStorage;
pub use storage_engine::{HospitalStorage, StorageTransaction};
#[cfg(feature = "mysql-datastore")]
pub use mysql_storage::MySQLStorage;

/// Creates the configured storage engine and brings its schema up to date.
pub async fn create_storage(config: &StorageConfig) -> HospitalResult<Arc<dyn HospitalStorage>> {
    debug!("Creating storage with config: {:?}", config.storage_engine_type);

    let storage: Arc<dyn HospitalStorage> = match config.storage_engine_type {
        StorageEngineType::InMemory => Arc::new(InMemoryStorage::new()),
        StorageEngineType::MySQL => {
            #[cfg(feature = "mysql-datastore")]
            {
                Arc::new(MySQLStorage::new(config)?)
            }
            #[cfg(not(feature = "mysql-datastore"))]
            {
                return Err(HospitalError::ConfigurationError(
                    "MySQL support is not enabled. Please enable the 'mysql-datastore' feature.".to_string(),
                ));
            }
        }
    };

    storage.init_schema().await?;
    info!("Storage engine {} ready", storage.engine_type());
    Ok(storage)
}
