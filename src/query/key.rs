//! Cache keys for patient queries.

use std::fmt;

/// Scope shared by every patient key.
pub const PATIENTS_SCOPE: &str = "patients";

/// Identifies one cacheable patient resource.
///
/// Mirrors the ordered tuples `("patients", "list", {name})` and
/// `("patients", "detail", id)`. An empty search term and no search term map to
/// the same list key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    PatientList { name: Option<String> },
    PatientDetail { id: String },
}

impl QueryKey {
    /// Key for a list search with the settled (debounced) term.
    pub fn patient_list(term: &str) -> Self {
        Self::PatientList {
            name: (!term.is_empty()).then(|| term.to_string()),
        }
    }

    pub fn patient_detail(id: impl Into<String>) -> Self {
        Self::PatientDetail { id: id.into() }
    }

    /// Short label for log fields. Never contains the search term itself.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PatientList { name: None } => "list",
            Self::PatientList { name: Some(_) } => "search",
            Self::PatientDetail { .. } => "detail",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PatientList { name: None } => write!(f, "[{PATIENTS_SCOPE}, list, {{}}]"),
            Self::PatientList { name: Some(name) } => {
                write!(f, "[{PATIENTS_SCOPE}, list, {{name: {name:?}}}]")
            }
            Self::PatientDetail { id } => write!(f, "[{PATIENTS_SCOPE}, detail, {id:?}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_absent_terms_share_a_key() {
        assert_eq!(
            QueryKey::patient_list(""),
            QueryKey::PatientList { name: None }
        );
    }

    #[test]
    fn equal_terms_derive_equal_keys() {
        assert_eq!(QueryKey::patient_list("saka"), QueryKey::patient_list("saka"));
        assert_ne!(QueryKey::patient_list("saka"), QueryKey::patient_list("Saka"));
        assert_ne!(QueryKey::patient_list("saka"), QueryKey::patient_list("saka "));
    }

    #[test]
    fn list_and_detail_keys_never_collide() {
        assert_ne!(QueryKey::patient_list("1"), QueryKey::patient_detail("1"));
    }

    #[test]
    fn display_matches_tuple_form() {
        assert_eq!(QueryKey::patient_list("").to_string(), "[patients, list, {}]");
        assert_eq!(
            QueryKey::patient_list("saka").to_string(),
            "[patients, list, {name: \"saka\"}]"
        );
        assert_eq!(
            QueryKey::patient_detail("7").to_string(),
            "[patients, detail, \"7\"]"
        );
    }
}
