// lib/src/services/catalog_service.rs

use std::sync::Arc;
use log::debug;
use models::errors::{HospitalError, HospitalResult};
use models::medical::{LabTestCatalogEntry, Medicine, DEFAULT_LAB_TEST_PRICE};
use crate::storage_engine::{HospitalStorage, StorageTransaction};

/// Looks up a medicine by exact name, creating a bare entry on first use.
pub async fn medicine_named(tx: &mut dyn StorageTransaction, name: &str) -> HospitalResult<Medicine> {
    if name.trim().is_empty() {
        return Err(HospitalError::BadInput("Medicine name is required".to_string()));
    }
    let medicine = tx.find_or_create_medicine(name).await?;
    debug!("Resolved medicine '{}' to id {}", name, medicine.id);
    Ok(medicine)
}

/// Looks up a lab test by exact name; entries created here get the default price.
pub async fn lab_test_named(tx: &mut dyn StorageTransaction, test_name: &str) -> HospitalResult<LabTestCatalogEntry> {
    if test_name.trim().is_empty() {
        return Err(HospitalError::BadInput("Test name is required".to_string()));
    }
    let entry = tx.find_or_create_lab_test_catalog(test_name, DEFAULT_LAB_TEST_PRICE).await?;
    debug!("Resolved lab test '{}' to id {}", test_name, entry.id);
    Ok(entry)
}

pub struct CatalogService {
    storage: Arc<dyn HospitalStorage>,
}

impl CatalogService {
    pub fn new(storage: Arc<dyn HospitalStorage>) -> Self {
        CatalogService { storage }
    }

    pub async fn medicines(&self) -> HospitalResult<Vec<Medicine>> {
        let mut tx = self.storage.begin().await?;
        tx.list_medicines().await
    }

    pub async fn lab_tests(&self) -> HospitalResult<Vec<LabTestCatalogEntry>> {
        let mut tx = self.storage.begin().await?;
        tx.list_lab_test_catalog().await
    }

    pub async fn find_or_create_medicine(&self, name: &str) -> HospitalResult<Medicine> {
        let mut tx = self.storage.begin().await?;
        let medicine = medicine_named(tx.as_mut(), name).await?;
        tx.commit().await?;
        Ok(medicine)
    }

    pub async fn find_or_create_lab_test(&self, test_name: &str) -> HospitalResult<LabTestCatalogEntry> {
        let mut tx = self.storage.begin().await?;
        let entry = lab_test_named(tx.as_mut(), test_name).await?;
        tx.commit().await?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use crate::storage_engine::InMemoryStorage;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(InMemoryStorage::new()))
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent_by_name() {
        let svc = service();
        let first = svc.find_or_create_medicine("Paracetamol").await.unwrap();
        let second = svc.find_or_create_medicine("Paracetamol").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.generic_name, None);
        assert_eq!(svc.medicines().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_lab_tests_get_the_default_price() {
        let svc = service();
        let entry = svc.find_or_create_lab_test("CBC").await.unwrap();
        assert_eq!(entry.price, dec!(20.00));
        assert_eq!(svc.lab_tests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn names_match_exactly() {
        let svc = service();
        let plain = svc.find_or_create_medicine("Paracetamol").await.unwrap();
        let padded = svc.find_or_create_medicine(" Paracetamol").await.unwrap();
        assert_ne!(plain.id, padded.id);
        assert_eq!(padded.name, " Paracetamol");
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let svc = service();
        assert!(matches!(svc.find_or_create_medicine("  ").await, Err(HospitalError::BadInput(_))));
        assert!(matches!(svc.find_or_create_lab_test("").await, Err(HospitalError::BadInput(_))));
        assert!(svc.medicines().await.unwrap().is_empty());
    }
}
