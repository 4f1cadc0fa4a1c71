// models/src/medical/prescription.rs
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// First "Diagnosis: <text>." fragment; the text runs up to the first period.
static DIAGNOSIS_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Diagnosis:\s*([^.]+)\.").expect("diagnosis pattern is valid"));
static DIAGNOSIS_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Diagnosis:\s*[^.]+\.\s*").expect("diagnosis strip pattern is valid"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: i64,
    pub appointment_id: i64,
    pub diagnosis: Option<String>,
    pub instructions: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub appointment_id: i64,
    pub diagnosis: Option<String>,
    pub instructions: Option<String>,
    pub date: NaiveDate,
}

/// Junction row between a prescription and a catalog medicine.
/// `frequency` and `instructions` exist in the schema but no workflow sets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionMedicine {
    pub id: i64,
    pub prescription_id: i64,
    pub medicine_id: i64,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPrescriptionMedicine {
    pub prescription_id: i64,
    pub medicine_id: i64,
    pub dosage: Option<String>,
    pub duration: Option<String>,
}

/// One medicine line as written by the doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineLine {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Diagnosis and remaining instructions split out of the doctor's free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicalNote {
    pub diagnosis: Option<String>,
    pub instructions: Option<String>,
}

impl ClinicalNote {
    /// Pulls the first `Diagnosis: <text>.` fragment out of `raw`. Text that does
    /// not follow that template is kept verbatim as instructions with no diagnosis.
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = raw.unwrap_or("");
        let mut diagnosis = None;
        let mut instructions = raw.to_string();

        if let Some(captures) = DIAGNOSIS_FRAGMENT.captures(raw) {
            let text = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            if !text.is_empty() {
                diagnosis = Some(text.to_string());
            }
            instructions = DIAGNOSIS_STRIP.replacen(raw, 1, "").trim().to_string();
        }

        ClinicalNote {
            diagnosis,
            instructions: if instructions.is_empty() { None } else { Some(instructions) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_diagnosis_and_strips_it() {
        let note = ClinicalNote::parse(Some("Diagnosis: Viral Fever. Rest and fluids."));
        assert_eq!(note.diagnosis.as_deref(), Some("Viral Fever"));
        assert_eq!(note.instructions.as_deref(), Some("Rest and fluids."));
    }

    #[test]
    fn diagnosis_only_leaves_no_instructions() {
        let note = ClinicalNote::parse(Some("Diagnosis: Viral Fever."));
        assert_eq!(note.diagnosis.as_deref(), Some("Viral Fever"));
        assert_eq!(note.instructions, None);
    }

    #[test]
    fn text_without_template_is_kept_verbatim() {
        let note = ClinicalNote::parse(Some("diagnosed with flu, rest"));
        assert_eq!(note.diagnosis, None);
        assert_eq!(note.instructions.as_deref(), Some("diagnosed with flu, rest"));
    }

    #[test]
    fn fragment_in_the_middle_is_removed() {
        let note = ClinicalNote::parse(Some("Take with food. Diagnosis: Gastritis. Avoid spice."));
        assert_eq!(note.diagnosis.as_deref(), Some("Gastritis"));
        assert_eq!(note.instructions.as_deref(), Some("Take with food. Avoid spice."));
    }

    #[test]
    fn missing_text_yields_empty_note() {
        assert_eq!(ClinicalNote::parse(None), ClinicalNote { diagnosis: None, instructions: None });
    }
}
