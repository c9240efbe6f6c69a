use serde::{Deserialize, Serialize};

/// Provenance class of a candidate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Extracted from free-text clinical documents (LLM output).
    Document,
    /// Derived from structured warehouse tables.
    StructuredData,
    /// Derived from the patient event timeline.
    Timeline,
    /// Inferred from treatment patterns rather than stated anywhere.
    Inference,
}

/// Curated research variables this engine knows how to adjudicate.
///
/// Closed set: anything the upstream form catalog sends that is not listed
/// here routes to `Unsupported`, which gets an explicit no-op query strategy
/// rather than an attribute-lookup default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    ExtentOfResection,
    TumorLocation,
    Histopathology,
    WhoGrade,
    SurgeryType,
    MolecularTesting,
    SpecimenRouting,
    Unsupported,
}

impl Variable {
    /// Map an upstream form-field name to a variable. Unknown names are
    /// valid input (not an error) and become `Unsupported`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "extent_of_resection" | "extent_of_tumor_resection" => Self::ExtentOfResection,
            "tumor_location" | "tumor_site" => Self::TumorLocation,
            "histopathology" | "histology" | "cns_integrated_diagnosis" => Self::Histopathology,
            "who_grade" => Self::WhoGrade,
            "surgery_type" | "specimen_collection_origin" => Self::SurgeryType,
            "molecular_testing" | "molecular_tests_performed" => Self::MolecularTesting,
            "specimen_routing" | "specimen_to_pathology" => Self::SpecimenRouting,
            _ => Self::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtentOfResection => "extent_of_resection",
            Self::TumorLocation => "tumor_location",
            Self::Histopathology => "histopathology",
            Self::WhoGrade => "who_grade",
            Self::SurgeryType => "surgery_type",
            Self::MolecularTesting => "molecular_testing",
            Self::SpecimenRouting => "specimen_routing",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Imaging modality, ranked for post-operative authority (MRI > CT > other).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagingModality {
    Mri,
    Ct,
    Other,
}
