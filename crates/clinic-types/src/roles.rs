//! Actor roles, subject eligibility and clinical artifact enumerations.

use std::{fmt, str::FromStr};

/// The role an authenticated actor holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Physician,
    Admin,
}

impl Role {
    /// Returns true for the elevated clinician/staff roles.
    ///
    /// Staff may register subjects, file reports and author advice that is
    /// self-certifying (created already approved).
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Physician | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Patient => "patient",
            Role::Physician => "physician",
            Role::Admin => "admin",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "physician" => Ok(Role::Physician),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: '{}'", other)),
        }
    }
}

/// Whether a subject may currently be the target of new clinical artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eligibility {
    Active,
    Inactive,
    Suspended,
}

impl Eligibility {
    pub fn is_active(self) -> bool {
        matches!(self, Eligibility::Active)
    }
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Eligibility::Active => "active",
            Eligibility::Inactive => "inactive",
            Eligibility::Suspended => "suspended",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Eligibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Eligibility::Active),
            "inactive" => Ok(Eligibility::Inactive),
            "suspended" => Ok(Eligibility::Suspended),
            other => Err(format!("unknown eligibility state: '{}'", other)),
        }
    }
}

/// Advice record status. Monotonic: pending advances to approved, never back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceStatus {
    Pending,
    Approved,
}

impl fmt::Display for AdviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdviceStatus::Pending => "pending",
            AdviceStatus::Approved => "approved",
        };
        write!(f, "{}", name)
    }
}

/// Urgency attached to advice records and patient-raised requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            // "medium" survives from the older request form
            "normal" | "medium" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            other => Err(format!("unknown urgency: '{}'", other)),
        }
    }
}

/// What a patient-raised request is asking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Advice,
    Appointment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_roles() {
        assert!(Role::Physician.is_staff());
        assert!(Role::Admin.is_staff());
        assert!(!Role::Patient.is_staff());
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("Physician".parse::<Role>().unwrap(), Role::Physician);
        assert_eq!(" admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!("clerk".parse::<Role>().is_err());
    }

    #[test]
    fn test_only_active_is_eligible() {
        assert!(Eligibility::Active.is_active());
        assert!(!Eligibility::Inactive.is_active());
        assert!(!Eligibility::Suspended.is_active());
    }

    #[test]
    fn test_urgency_default_and_legacy_spelling() {
        assert_eq!(Urgency::default(), Urgency::Normal);
        assert_eq!("medium".parse::<Urgency>().unwrap(), Urgency::Normal);
        assert_eq!("high".parse::<Urgency>().unwrap(), Urgency::High);
    }
}
