// lib/src/services/billing_service.rs

use std::sync::Arc;
use chrono::Utc;
use log::{info, warn};
use rust_decimal::Decimal;
use models::errors::{HospitalError, HospitalResult};
use models::medical::{Appointment, Bill, ChargePlan, NewBill, Patient, DEFAULT_PAYMENT_METHOD};
use models::views::{AppointmentSlot, BillView};
use crate::storage_engine::{HospitalStorage, StorageTransaction};

/// Applies one chargeable event to the appointment's bill: open it, raise it,
/// or, when it is already paid, leave it untouched.
pub async fn apply_charge(
    tx: &mut dyn StorageTransaction,
    appointment: &Appointment,
    charge: Decimal,
) -> HospitalResult<ChargePlan> {
    let existing = tx.find_bill_by_appointment(appointment.id).await?;
    let plan = ChargePlan::for_charge(existing.as_ref(), charge);
    match &plan {
        ChargePlan::Open { amount } => {
            let bill = tx
                .insert_bill(NewBill {
                    patient_id: appointment.patient_id,
                    appointment_id: appointment.id,
                    amount: *amount,
                })
                .await?;
            info!("Opened bill {} for appointment {} at {}", bill.id, appointment.id, bill.amount);
        }
        ChargePlan::Increment { bill_id, amount } => {
            tx.set_bill_amount(*bill_id, *amount).await?;
            info!("Bill {} for appointment {} raised to {}", bill_id, appointment.id, amount);
        }
        ChargePlan::DropPaid { bill_id } => {
            warn!(
                "Bill {} for appointment {} is already paid; charge of {} not applied",
                bill_id, appointment.id, charge
            );
        }
    }
    Ok(plan)
}

pub struct BillingService {
    storage: Arc<dyn HospitalStorage>,
}

impl BillingService {
    pub fn new(storage: Arc<dyn HospitalStorage>) -> Self {
        BillingService { storage }
    }

    /// Marks the patient's bill paid. Paying is terminal; there is no refund path.
    pub async fn pay(&self, patient: &Patient, bill_id: i64, payment_method: Option<String>) -> HospitalResult<Bill> {
        let mut tx = self.storage.begin().await?;
        let bill = tx
            .get_bill(bill_id)
            .await?
            .filter(|bill| bill.patient_id == patient.id)
            .ok_or_else(|| HospitalError::NotFound("Bill not found".to_string()))?;
        if bill.is_paid() {
            return Err(HospitalError::InvalidState("Bill is already paid".to_string()));
        }
        let method = payment_method
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());
        let paid = tx.mark_bill_paid(bill.id, &method, Utc::now()).await?;
        tx.commit().await?;
        info!("Bill {} paid by patient {} via {}", paid.id, patient.id, method);
        Ok(paid)
    }

    pub async fn bills_for_patient(&self, patient: &Patient) -> HospitalResult<Vec<BillView>> {
        let mut tx = self.storage.begin().await?;
        let mut views = Vec::new();
        for bill in tx.list_bills_for_patient(patient.id).await? {
            let appointment = tx.get_appointment(bill.appointment_id).await?.map(|a| AppointmentSlot {
                appointment_date: a.appointment_date,
                appointment_time: a.appointment_time,
            });
            views.push(BillView { bill, appointment });
        }
        Ok(views)
    }
}
