//! Data models for the patient directory.

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

/// Shown in place of an empty `full_name`.
const UNNAMED: &str = "(unnamed)";

/// A patient as returned by the patients endpoint.
///
/// Unknown wire fields are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Stable identifier assigned by the remote system. Sole identity key for rows and caching.
    pub id: String,
    /// Display name.
    pub full_name: String,
    /// Birth date as sent by the server, `YYYY-MM-DD`.
    pub birth_date: String,
    /// Record kind discriminator, "Patient" for every record in this directory.
    #[serde(rename = "resourceType")]
    pub resource_type: String,
}

impl PatientRecord {
    /// The name to show in the table and overlay title.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            UNNAMED
        } else {
            &self.full_name
        }
    }

    /// Parses `birth_date`, returning `None` when it isn't a valid `YYYY-MM-DD` date.
    pub fn birth_date(&self) -> Option<Date> {
        Date::parse(&self.birth_date, format_description!("[year]-[month]-[day]")).ok()
    }

    /// Age in whole years on `today`, if the birth date parses and isn't in the future.
    pub fn age_on(&self, today: Date) -> Option<u16> {
        let born = self.birth_date()?;
        if born > today {
            return None;
        }
        let mut years = today.year() - born.year();
        if (today.month() as u8, today.day()) < (born.month() as u8, born.day()) {
            years -= 1;
        }
        u16::try_from(years).ok()
    }
}

/// The list shape handed to consumers. The wire response is a bare array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientListResponse {
    pub patients: Vec<PatientRecord>,
}

impl PatientListResponse {
    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}

impl From<Vec<PatientRecord>> for PatientListResponse {
    fn from(patients: Vec<PatientRecord>) -> Self {
        Self { patients }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::patient;
    use super::*;
    use time::macros::date;

    #[test]
    fn decodes_wire_shape_and_ignores_unknown_fields() {
        let json = r#"{
            "id": "abc-1",
            "full_name": "Bukayo Saka",
            "birth_date": "2001-09-05",
            "resourceType": "Patient",
            "gender": "male"
        }"#;

        let record: PatientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "abc-1");
        assert_eq!(record.full_name, "Bukayo Saka");
        assert_eq!(record.birth_date, "2001-09-05");
        assert_eq!(record.resource_type, "Patient");
    }

    #[test]
    fn missing_required_field_fails_to_decode() {
        let json = r#"{"id": "1", "full_name": "No Date", "resourceType": "Patient"}"#;
        assert!(serde_json::from_str::<PatientRecord>(json).is_err());
    }

    #[test]
    fn tolerates_other_record_kinds() {
        let json = r#"{"id": "9", "full_name": "X", "birth_date": "2000-01-01", "resourceType": "Practitioner"}"#;
        let record: PatientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.resource_type, "Practitioner");
    }

    #[test]
    fn display_name_falls_back_when_blank() {
        assert_eq!(patient("1", "  ", "2000-01-01").display_name(), "(unnamed)");
        assert_eq!(patient("1", "Declan Rice", "2000-01-01").display_name(), "Declan Rice");
    }

    #[test]
    fn age_counts_whole_years() {
        let saka = patient("1", "Bukayo Saka", "2001-09-05");
        assert_eq!(saka.age_on(date!(2026 - 09 - 04)), Some(24));
        assert_eq!(saka.age_on(date!(2026 - 09 - 05)), Some(25));
        assert_eq!(saka.age_on(date!(2000 - 01 - 01)), None);
    }

    #[test]
    fn unparseable_birth_date_has_no_age() {
        let record = patient("1", "Someone", "05/09/2001");
        assert!(record.birth_date().is_none());
        assert!(record.age_on(date!(2026 - 01 - 01)).is_none());
    }
}
