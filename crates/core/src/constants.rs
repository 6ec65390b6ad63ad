//! Constants used throughout the FemCare core crate.
//!
//! Collection names and document field names live here so the reconciler, the dashboard
//! loader, the repair pass and the CLI all agree on one schema.

/// Collection holding one profile document per identity.
pub const USERS_COLLECTION: &str = "users";

/// Collection holding one clinical/administrative document per patient-role identity.
pub const PATIENTS_COLLECTION: &str = "patients";

/// Default directory for the file-backed document store when none is configured.
pub const DEFAULT_DATA_DIR: &str = "femcare_data";

/// Default bcrypt cost used by the in-memory identity provider.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Range of bcrypt costs the hashing library accepts.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

/// Consecutive failed sign-ins after which an account is throttled.
pub const DEFAULT_MAX_FAILED_SIGN_INS: u32 = 5;

/// Minimum password length accepted by the identity provider.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Document field names as stored in the `users` and `patients` collections.
pub mod fields {
    pub const UID: &str = "uid";
    pub const EMAIL: &str = "email";
    pub const USER_TYPE: &str = "userType";
    pub const FULL_NAME: &str = "fullName";
    pub const PHONE_NUMBER: &str = "phoneNumber";
    pub const DATE_OF_BIRTH: &str = "dateOfBirth";
    pub const MEDICAL_HISTORY: &str = "medicalHistory";
    pub const APPOINTMENTS: &str = "appointments";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}
