use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::{AccessLevel, GrantKey, Restrictions};
use super::profile::{CandidateProfile, Education, PostalAddress, SalaryExpectation, WorkSample};
use crate::detection::{PatternDetector, REDACTED};

/// Obfuscation dials for the staged views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureConfig {
    pub bio_char_limit: usize,
    pub salary_bucket: u32,
    pub video_cap_seconds: u32,
    pub age_band_years: u32,
}

impl Default for DisclosureConfig {
    fn default() -> Self {
        Self {
            bio_char_limit: 200,
            salary_bucket: 2000,
            video_cap_seconds: 120,
            age_band_years: 5,
        }
    }
}

/// Level 1: enough to decide whether to invest in a closer look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicView {
    pub first_name: String,
    pub last_initial: String,
    pub approximate_age: Option<String>,
    pub city: String,
    pub region: String,
    pub bio: String,
    pub bio_truncated: bool,
    pub industry_interests: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryBand {
    pub min: u32,
    pub max: u32,
}

/// Level 2 additions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalView {
    pub skills: Vec<String>,
    pub education: Vec<Education>,
    pub certifications: Vec<String>,
    pub salary_band: Option<SalaryBand>,
    pub career_goals: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkedVideo {
    pub url: String,
    pub watermark_id: Uuid,
    pub max_duration_seconds: u32,
}

/// Level 3 additions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedView {
    pub work_samples: Vec<WorkSample>,
    pub achievements: Vec<String>,
    pub video: Option<WatermarkedVideo>,
    pub references: Vec<String>,
}

/// Level 4 additions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactView {
    pub email: String,
    pub phone: String,
    pub address: PostalAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedView {
    pub basic: BasicView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professional: Option<ProfessionalView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<VerifiedView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactView>,
}

/// Build the view for `level`. Contact details are also withheld while the pair's
/// restrictions block contact.
pub(crate) fn stage_view(
    key: &GrantKey,
    profile: &CandidateProfile,
    level: AccessLevel,
    restrictions: Restrictions,
    config: &DisclosureConfig,
    detector: &PatternDetector,
    today: NaiveDate,
) -> StagedView {
    let screen = |text: &str| screen_free_text(text, profile, detector);
    let basic = basic_view(profile, config, &screen, today);

    let professional = (level >= AccessLevel::Professional).then(|| ProfessionalView {
        skills: profile.skills.clone(),
        education: profile.education.clone(),
        certifications: profile.certifications.clone(),
        salary_band: profile
            .salary_expectation
            .map(|salary| salary_band(salary, config.salary_bucket)),
        career_goals: profile.career_goals.as_deref().map(&screen),
    });

    let verified = (level >= AccessLevel::Verified).then(|| VerifiedView {
        work_samples: profile.work_samples.clone(),
        achievements: profile
            .achievements
            .iter()
            .map(|achievement| screen(achievement.as_str()))
            .collect(),
        video: profile.video_profile.as_ref().map(|video| WatermarkedVideo {
            url: watermark_url(&video.url, key, config.video_cap_seconds),
            watermark_id: watermark_id(key),
            max_duration_seconds: video.duration_seconds.min(config.video_cap_seconds),
        }),
        references: profile
            .references
            .iter()
            .map(|reference| {
                screen(anonymize_reference(&reference.text, &reference.referee_name).as_str())
            })
            .collect(),
    });

    let contact = (level >= AccessLevel::Contact && !restrictions.contact_blocked).then(|| {
        ContactView {
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            address: profile.address.clone(),
        }
    });

    StagedView {
        basic,
        professional,
        verified,
        contact,
    }
}

fn basic_view(
    profile: &CandidateProfile,
    config: &DisclosureConfig,
    screen: &dyn Fn(&str) -> String,
    today: NaiveDate,
) -> BasicView {
    let (bio, bio_truncated) = truncate_chars(&screen(&profile.bio), config.bio_char_limit);
    BasicView {
        first_name: profile.first_name.trim().to_string(),
        last_initial: last_initial(&profile.last_name),
        approximate_age: profile
            .date_of_birth
            .and_then(|dob| age_band(dob, today, config.age_band_years)),
        city: profile.address.city.clone(),
        region: profile.address.region.clone(),
        bio,
        bio_truncated,
        industry_interests: profile.industry_interests.clone(),
    }
}

/// Redact everything the detector matches, then the candidate's own email, phone and
/// postcode wherever they appear regardless of case or spacing.
pub(crate) fn screen_free_text(
    text: &str,
    profile: &CandidateProfile,
    detector: &PatternDetector,
) -> String {
    let mut screened = detector.redact(text);
    for literal in [&profile.email, &profile.phone, &profile.address.postcode] {
        let Some(pattern) = literal_pattern(literal) else {
            continue;
        };
        screened = pattern.replace_all(&screened, REDACTED).into_owned();
    }
    screened
}

fn literal_pattern(literal: &str) -> Option<Regex> {
    let parts: Vec<String> = literal
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    if parts.is_empty() {
        return None;
    }
    Regex::new(&format!("(?i){}", parts.join(r"\s*"))).ok()
}

pub(crate) fn last_initial(last_name: &str) -> String {
    last_name
        .trim()
        .chars()
        .next()
        .map(|initial| format!("{}.", initial.to_uppercase()))
        .unwrap_or_default()
}

pub(crate) fn truncate_chars(value: &str, limit: usize) -> (String, bool) {
    let mut chars = value.char_indices();
    match chars.nth(limit) {
        Some((byte_index, _)) => (value[..byte_index].to_string(), true),
        None => (value.to_string(), false),
    }
}

pub(crate) fn age_band(date_of_birth: NaiveDate, today: NaiveDate, width: u32) -> Option<String> {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    let age = u32::try_from(age).ok()?;
    let width = width.max(1);
    let lower = age / width * width;
    Some(format!("{}-{}", lower, lower + width - 1))
}

/// Floor the minimum and ceil the maximum to whole buckets; a collapsed band widens by one.
pub(crate) fn salary_band(salary: SalaryExpectation, bucket: u32) -> SalaryBand {
    let bucket = bucket.max(1);
    let min = salary.min / bucket * bucket;
    let max = salary.max.div_ceil(bucket).saturating_mul(bucket);
    let max = if max <= min {
        min.saturating_add(bucket)
    } else {
        max
    };
    SalaryBand { min, max }
}

pub(crate) fn watermark_id(key: &GrantKey) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.to_string().as_bytes())
}

fn watermark_url(url: &str, key: &GrantKey, cap_seconds: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{url}{separator}wm={}&max_seconds={cap_seconds}",
        watermark_id(key).simple()
    )
}

pub(crate) fn anonymize_reference(text: &str, referee_name: &str) -> String {
    let mut anonymized = text.to_string();
    let full_name = referee_name.trim();
    if !full_name.is_empty() {
        anonymized = anonymized.replace(full_name, "[referee]");
    }
    for part in full_name.split_whitespace().filter(|part| part.len() > 1) {
        anonymized = anonymized.replace(part, "[referee]");
    }
    anonymized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let (text, truncated) = truncate_chars("héllo wörld", 4);
        assert_eq!(text, "héll");
        assert!(truncated);
        let (text, truncated) = truncate_chars("short", 200);
        assert_eq!(text, "short");
        assert!(!truncated);
    }

    #[test]
    fn age_band_accounts_for_birthday_not_yet_reached() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let dob = NaiveDate::from_ymd_opt(1995, 6, 15).unwrap();
        assert_eq!(age_band(dob, today, 5), Some("25-29".to_string()));
        let dob = NaiveDate::from_ymd_opt(1990, 2, 1).unwrap();
        assert_eq!(age_band(dob, today, 5), Some("35-39".to_string()));
    }

    #[test]
    fn salary_band_rounds_outward_to_buckets() {
        let band = salary_band(SalaryExpectation { min: 31_500, max: 38_200 }, 2000);
        assert_eq!(band, SalaryBand { min: 30_000, max: 40_000 });
        let band = salary_band(SalaryExpectation { min: 36_000, max: 36_000 }, 2000);
        assert_eq!(band, SalaryBand { min: 36_000, max: 38_000 });
    }

    #[test]
    fn free_text_loses_the_candidates_own_contact_details() {
        let profile = CandidateProfile {
            candidate_id: crate::access::CandidateId("cand-1".to_string()),
            first_name: "Leo".to_string(),
            last_name: "Marsh".to_string(),
            date_of_birth: None,
            email: "leo.marsh@example.com".to_string(),
            phone: "07700 900789".to_string(),
            address: PostalAddress {
                line1: "3 Mill Lane".to_string(),
                line2: None,
                city: "Bristol".to_string(),
                region: "Avon".to_string(),
                postcode: "BS1 4DJ".to_string(),
                coordinates: None,
            },
            bio: String::new(),
            industry_interests: Vec::new(),
            skills: Vec::new(),
            education: Vec::new(),
            certifications: Vec::new(),
            salary_expectation: None,
            career_goals: None,
            work_samples: Vec::new(),
            achievements: Vec::new(),
            video_profile: None,
            references: Vec::new(),
        };
        let detector = PatternDetector::default();

        let screened = screen_free_text(
            "Reach me at leo.marsh@example.com or 07700 900789, bs14dj",
            &profile,
            &detector,
        );
        assert_eq!(
            screened,
            format!("Reach me at {REDACTED} or {REDACTED}, {REDACTED}")
        );
        assert_eq!(
            screen_free_text("Based near BS1  4DJ.", &profile, &detector),
            format!("Based near {REDACTED}.")
        );
        assert_eq!(
            screen_free_text("Ten years in logistics.", &profile, &detector),
            "Ten years in logistics."
        );
    }

    #[test]
    fn references_lose_the_referee_name() {
        let text = anonymize_reference("Sam Patel says Priya is dependable. Patel would rehire.", "Sam Patel");
        assert_eq!(text, "[referee] says Priya is dependable. [referee] would rehire.");
    }

    #[test]
    fn watermark_is_stable_per_pair() {
        let key = GrantKey::new("emp-1", "cand-1");
        assert_eq!(watermark_id(&key), watermark_id(&key));
        assert_ne!(watermark_id(&key), watermark_id(&GrantKey::new("emp-2", "cand-1")));
        let url = watermark_url("https://cdn.example/v.mp4?x=1", &key, 120);
        assert!(url.starts_with("https://cdn.example/v.mp4?x=1&wm="));
        assert!(url.ends_with("&max_seconds=120"));
    }
}
