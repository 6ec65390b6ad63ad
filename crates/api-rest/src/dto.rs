//! Request and response bodies of the REST API.
//!
//! Field names are camelCase on the wire, matching the stored documents.

use femcare_core::{
    Appointment, LoginOutcome, PatientRecord, RegistrationForm, RepairReport,
    SessionState, UserView,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessRes {
    pub success: bool,
}

/// Error body returned with every non-2xx status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub success: bool,
    pub reason: String,
    /// Where the caller should go to re-authenticate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReq {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub date_of_birth: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl From<RegisterReq> for RegistrationForm {
    fn from(req: RegisterReq) -> Self {
        RegistrationForm {
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            date_of_birth: req.date_of_birth,
            phone_number: req.phone_number,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetReq {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRes {
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// `patient` or `doctor`.
    pub role: String,
    pub full_name: String,
    pub phone_number: String,
}

impl From<UserView> for UserRes {
    fn from(user: UserView) -> Self {
        UserRes {
            uid: user.uid,
            email: user.email,
            display_name: user.display_name,
            role: user.role.as_str().to_owned(),
            full_name: user.full_name,
            phone_number: user.phone_number,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRes {
    pub user: UserRes,
    /// Route of the dashboard the caller should open.
    pub destination: String,
}

impl From<LoginOutcome> for LoginRes {
    fn from(outcome: LoginOutcome) -> Self {
        LoginRes {
            destination: outcome.destination.path().to_owned(),
            user: outcome.user.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionRes {
    pub user: Option<UserRes>,
    pub loading: bool,
    pub error: Option<String>,
}

impl From<SessionState> for SessionRes {
    fn from(state: SessionState) -> Self {
        SessionRes {
            user: state.user.map(UserRes::from),
            loading: state.loading,
            error: state.error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AppointmentRes {
    pub date: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<Appointment> for AppointmentRes {
    fn from(appointment: Appointment) -> Self {
        AppointmentRes {
            date: appointment.date,
            status: appointment.status,
            notes: appointment.notes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardRes {
    pub uid: String,
    pub email: String,
    pub full_name: String,
    pub date_of_birth: String,
    pub phone_number: String,
    pub medical_history: String,
    pub appointments: Vec<AppointmentRes>,
}

impl From<PatientRecord> for DashboardRes {
    fn from(record: PatientRecord) -> Self {
        DashboardRes {
            uid: record.uid,
            email: record.email,
            full_name: record.full_name,
            date_of_birth: record.date_of_birth,
            phone_number: record.phone_number,
            medical_history: record.medical_history,
            appointments: record
                .appointments
                .into_iter()
                .map(AppointmentRes::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepairRes {
    pub scanned: usize,
    pub repaired: Vec<String>,
    pub skipped_doctors: usize,
}

impl From<RepairReport> for RepairRes {
    fn from(report: RepairReport) -> Self {
        RepairRes {
            scanned: report.scanned,
            repaired: report.repaired,
            skipped_doctors: report.skipped_doctors,
        }
    }
}
