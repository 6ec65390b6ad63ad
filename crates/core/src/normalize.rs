//! Canonical schema for `users` and `patients` documents.
//!
//! Every code path that reads, creates or heals a profile document goes through this module,
//! so there is exactly one set of defaults. Normalisation is non-destructive: it only fills
//! fields that are absent, null or empty, and reports those as a *delta* that can be
//! merge-written back. The update timestamp is not part of the comparison; it is attached to
//! the write only when the delta is non-empty, which keeps reconciling a complete record
//! write-free.

use crate::constants::fields;
use crate::models::{Appointment, Identity, PatientRecord, PatientSeed, Role, UserView};
use crate::store::{Document, FieldValue, Fields};
use serde_json::Value;

/// A normalised view plus the fields that differ from what is stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized<T> {
    pub view: T,
    pub delta: Fields,
}

impl<T> Normalized<T> {
    pub fn needs_write(&self) -> bool {
        !self.delta.is_empty()
    }

    /// The merge-write that heals the stored document, if anything is missing.
    pub fn merge_write(&self) -> Option<Fields> {
        if !self.needs_write() {
            return None;
        }
        let mut write = self.delta.clone();
        write.insert(fields::UPDATED_AT.into(), FieldValue::ServerTimestamp);
        Some(write)
    }
}

/// A non-empty string field, or `None` when absent, null, empty or not a string.
fn present_text<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Display text for a stored value. Strings are taken as is, anything else is rendered as JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a stored value counts as missing: null or `""`.
fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// The stored value of a field as display text, or `None` when it is missing.
fn stored_text(doc: &Document, key: &str) -> Option<String> {
    doc.get(key)
        .filter(|value| !is_missing(value))
        .map(render)
}

/// Return the stored value as text, or the first non-empty fallback (else `""`), recording a
/// delta entry when the result differs from what is stored. Present values of any type are
/// kept and never rewritten.
fn fill_text(doc: &Document, key: &str, fallbacks: &[Option<&str>], delta: &mut Fields) -> String {
    if let Some(stored) = stored_text(doc, key) {
        return stored;
    }

    let value = fallbacks
        .iter()
        .flatten()
        .find(|s| !s.is_empty())
        .copied()
        .unwrap_or_default()
        .to_owned();

    if doc.get(key) != Some(&Value::String(value.clone())) {
        delta.insert(key.to_owned(), FieldValue::from(value.clone()));
    }

    value
}

/// Normalise a stored user document against the identity that owns it.
///
/// Full name falls back to the identity's display name, phone number to `""`. Role, id and
/// email are read but never rewritten.
pub fn normalize_user(stored: &Document, identity: &Identity) -> Normalized<UserView> {
    let mut delta = Fields::new();

    let display_name = identity.display_name.as_deref();
    let full_name = fill_text(stored, fields::FULL_NAME, &[display_name], &mut delta);
    let phone_number = fill_text(stored, fields::PHONE_NUMBER, &[], &mut delta);

    let view = UserView {
        uid: identity.uid.clone(),
        email: present_text(stored, fields::EMAIL)
            .unwrap_or(identity.email.as_str())
            .to_owned(),
        display_name: identity.display_name.clone(),
        role: Role::from_stored(stored.get(fields::USER_TYPE).and_then(Value::as_str)),
        full_name,
        phone_number,
    };

    Normalized { view, delta }
}

/// Canonical medical history: a string. Lists written by older clients are joined by newlines.
fn fill_medical_history(doc: &Document, delta: &mut Fields) -> String {
    match doc.get(fields::MEDICAL_HISTORY) {
        Some(Value::Array(items)) => {
            let joined = items
                .iter()
                .filter(|item| !is_missing(item))
                .map(render)
                .collect::<Vec<_>>()
                .join("\n");
            delta.insert(
                fields::MEDICAL_HISTORY.into(),
                FieldValue::from(joined.clone()),
            );
            joined
        }
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => {
            delta.insert(fields::MEDICAL_HISTORY.into(), FieldValue::from(""));
            String::new()
        }
        Some(other) => render(other),
    }
}

fn parse_appointment(value: &Value) -> Option<Appointment> {
    let entry = value.as_object()?;
    let text = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };

    Some(Appointment {
        date: text("date"),
        status: text("status"),
        notes: entry
            .get("notes")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
    })
}

/// Missing appointments become `[]`. A present value that is not a list is shown as empty but
/// left in place.
fn fill_appointments(doc: &Document, delta: &mut Fields) -> Vec<Appointment> {
    match doc.get(fields::APPOINTMENTS) {
        Some(Value::Array(items)) => items.iter().filter_map(parse_appointment).collect(),
        Some(Value::Null) | None => {
            delta.insert(
                fields::APPOINTMENTS.into(),
                FieldValue::Value(Value::Array(Vec::new())),
            );
            Vec::new()
        }
        Some(_) => Vec::new(),
    }
}

/// Normalise a stored patient document, filling gaps from `seed`.
///
/// The caller is responsible for checking ownership (`uid`) before exposing the result.
pub fn normalize_patient(stored: &Document, seed: &PatientSeed) -> Normalized<PatientRecord> {
    let mut delta = Fields::new();

    let full_name = fill_text(
        stored,
        fields::FULL_NAME,
        &[Some(seed.full_name.as_str())],
        &mut delta,
    );
    let date_of_birth = fill_text(
        stored,
        fields::DATE_OF_BIRTH,
        &[Some(seed.date_of_birth.as_str())],
        &mut delta,
    );
    let phone_number = fill_text(
        stored,
        fields::PHONE_NUMBER,
        &[Some(seed.phone_number.as_str())],
        &mut delta,
    );
    let medical_history = fill_medical_history(stored, &mut delta);
    let appointments = fill_appointments(stored, &mut delta);

    let owned_text = |key: &str| present_text(stored, key).map(str::to_owned);

    let view = PatientRecord {
        uid: owned_text(fields::UID).unwrap_or_default(),
        email: owned_text(fields::EMAIL).unwrap_or_default(),
        full_name,
        date_of_birth,
        phone_number,
        medical_history,
        appointments,
        created_at: owned_text(fields::CREATED_AT),
        updated_at: owned_text(fields::UPDATED_AT),
    };

    Normalized { view, delta }
}

/// The owner id recorded inside a stored document, if any.
pub fn stored_owner(stored: &Document) -> Option<&str> {
    present_text(stored, fields::UID)
}

/// Patient seed derived from a stored user document (used when the owning identity is not
/// at hand, e.g. by the repair pass).
pub fn seed_from_user_document(stored: &Document) -> PatientSeed {
    PatientSeed {
        full_name: stored_text(stored, fields::FULL_NAME).unwrap_or_default(),
        phone_number: stored_text(stored, fields::PHONE_NUMBER).unwrap_or_default(),
        date_of_birth: String::new(),
    }
}

/// Role recorded in a stored user document.
pub fn stored_role(stored: &Document) -> Role {
    Role::from_stored(stored.get(fields::USER_TYPE).and_then(Value::as_str))
}

/// Creation document for a user record. Role is always patient at creation.
pub fn new_user_record(identity: &Identity, full_name: &str, phone_number: &str) -> Fields {
    let mut doc = Fields::new();
    doc.insert(fields::UID.into(), identity.uid.as_str().into());
    doc.insert(fields::EMAIL.into(), identity.email.as_str().into());
    doc.insert(fields::USER_TYPE.into(), Role::Patient.as_str().into());
    doc.insert(fields::FULL_NAME.into(), full_name.into());
    doc.insert(fields::PHONE_NUMBER.into(), phone_number.into());
    doc.insert(fields::CREATED_AT.into(), FieldValue::ServerTimestamp);
    doc.insert(fields::UPDATED_AT.into(), FieldValue::ServerTimestamp);
    doc
}

/// Creation document for a patient record: empty medical history and no appointments.
pub fn new_patient_record(uid: &str, email: &str, seed: &PatientSeed) -> Fields {
    let mut doc = Fields::new();
    doc.insert(fields::UID.into(), uid.into());
    doc.insert(fields::EMAIL.into(), email.into());
    doc.insert(fields::FULL_NAME.into(), seed.full_name.as_str().into());
    doc.insert(fields::DATE_OF_BIRTH.into(), seed.date_of_birth.as_str().into());
    doc.insert(fields::PHONE_NUMBER.into(), seed.phone_number.as_str().into());
    doc.insert(fields::MEDICAL_HISTORY.into(), "".into());
    doc.insert(
        fields::APPOINTMENTS.into(),
        FieldValue::Value(Value::Array(Vec::new())),
    );
    doc.insert(fields::CREATED_AT.into(), FieldValue::ServerTimestamp);
    doc.insert(fields::UPDATED_AT.into(), FieldValue::ServerTimestamp);
    doc
}
