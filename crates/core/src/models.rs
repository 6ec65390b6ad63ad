//! Domain records exchanged between the identity provider, the document store and callers.

use femcare_types::EmailAddress;
use serde::{Deserialize, Serialize};

/// Role carried by a user record (`userType` on the wire).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }

    /// Interpret a stored `userType`. Anything other than `"doctor"` reads as a patient.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("doctor") => Role::Doctor,
            _ => Role::Patient,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account record issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    pub email: EmailAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Normalised user record merged with the identity it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub role: Role,
    pub full_name: String,
    pub phone_number: String,
}

/// An appointment embedded in a patient record, identified only by its position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub date: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Display-ready patient record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub uid: String,
    pub email: String,
    pub full_name: String,
    pub date_of_birth: String,
    pub phone_number: String,
    pub medical_history: String,
    pub appointments: Vec<Appointment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Values used when a patient record is created or its gaps are filled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatientSeed {
    pub full_name: String,
    pub phone_number: String,
    pub date_of_birth: String,
}

impl PatientSeed {
    pub fn from_user(user: &UserView) -> Self {
        Self {
            full_name: user.full_name.clone(),
            phone_number: user.phone_number.clone(),
            date_of_birth: String::new(),
        }
    }
}
