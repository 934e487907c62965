use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{CandidateId, EmployerId};
use crate::store::RepositoryError;

/// Account profile, discriminated by role at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Profile {
    Candidate(CandidateProfile),
    Employer(EmployerProfile),
}

impl Profile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        match self {
            Profile::Candidate(candidate) => candidate.validate(),
            Profile::Employer(employer) => {
                if employer.company_name.trim().is_empty() {
                    return Err(ProfileError::MissingField("company_name"));
                }
                Ok(())
            }
        }
    }

    pub fn as_candidate(&self) -> Option<&CandidateProfile> {
        match self {
            Profile::Candidate(candidate) => Some(candidate),
            Profile::Employer(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("profile is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("salary expectation minimum {min} exceeds maximum {max}")]
    InvertedSalaryRange { min: u32, max: u32 },
    #[error("profile {0} belongs to an employer, not a candidate")]
    NotACandidate(String),
}

/// Everything a candidate has told the platform. Never serialized to employers directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub candidate_id: CandidateId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    pub email: String,
    pub phone: String,
    pub address: PostalAddress,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub industry_interests: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub salary_expectation: Option<SalaryExpectation>,
    #[serde(default)]
    pub career_goals: Option<String>,
    #[serde(default)]
    pub work_samples: Vec<WorkSample>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub video_profile: Option<VideoProfile>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl CandidateProfile {
    fn validate(&self) -> Result<(), ProfileError> {
        if self.first_name.trim().is_empty() {
            return Err(ProfileError::MissingField("first_name"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ProfileError::MissingField("last_name"));
        }
        if let Some(salary) = self.salary_expectation {
            if salary.min > salary.max {
                return Err(ProfileError::InvertedSalaryRange {
                    min: salary.min,
                    max: salary.max,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployerProfile {
    pub employer_id: EmployerId,
    pub company_name: String,
    #[serde(default)]
    pub industry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postcode: String,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub qualification: String,
    #[serde(default)]
    pub year: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryExpectation {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSample {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoProfile {
    pub url: String,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub referee_name: String,
    pub relationship: String,
    pub text: String,
}

/// Lookup of full profiles; editing them is another service's job.
pub trait ProfileRepository: Send + Sync {
    fn fetch(&self, candidate_id: &CandidateId) -> Result<Option<Profile>, RepositoryError>;
    fn upsert(&self, profile: Profile) -> Result<(), RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_tag_selects_the_variant() {
        let employer: Profile = serde_json::from_value(json!({
            "role": "employer",
            "employer_id": "emp-1",
            "company_name": "Acme Logistics"
        }))
        .expect("employer profile parses");
        assert!(employer.as_candidate().is_none());
        assert!(employer.validate().is_ok());

        let unknown = serde_json::from_value::<Profile>(json!({ "role": "admin" }));
        assert!(unknown.is_err());
    }

    #[test]
    fn inverted_salary_range_is_rejected() {
        let candidate: Profile = serde_json::from_value(json!({
            "role": "candidate",
            "candidate_id": "cand-1",
            "first_name": "Priya",
            "last_name": "Shah",
            "email": "priya@example.com",
            "phone": "07123456789",
            "address": {
                "line1": "1 High Street",
                "city": "Leeds",
                "region": "West Yorkshire",
                "postcode": "LS1 1AA"
            },
            "salary_expectation": { "min": 40000, "max": 30000 }
        }))
        .expect("candidate profile parses");
        assert_eq!(
            candidate.validate(),
            Err(ProfileError::InvertedSalaryRange {
                min: 40000,
                max: 30000
            })
        );
    }
}
