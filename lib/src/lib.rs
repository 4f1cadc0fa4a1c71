// lib/src/lib.rs

pub mod config;
pub mod services;
pub mod storage_engine;

pub use config::{HospitalConfig, StorageEngineType};
pub use services::HospitalServices;
pub use storage_engine::{create_storage, HospitalStorage, StorageTransaction};
