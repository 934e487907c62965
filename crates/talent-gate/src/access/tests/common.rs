use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::access::{
    CandidateProfile, Education, GrantKey, PostalAddress, Profile, ProfileRepository, Reference,
    SalaryExpectation, VideoProfile, WorkSample,
};
use crate::clock::ManualClock;
use crate::config::EngineConfig;
use crate::context::{EngineContext, EngineStores};
use crate::store::memory::{
    InMemoryAccountDirectory, InMemoryActivityLog, InMemoryAlertRepository,
    InMemoryEnforcementRepository, InMemoryFlagRepository, InMemoryGrantRepository,
    InMemoryNotificationSink, InMemoryProfileRepository,
};

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap()
}

pub(super) fn key() -> GrantKey {
    GrantKey::new("emp-acme", "cand-priya")
}

pub(super) struct Harness {
    pub(super) clock: Arc<ManualClock>,
    pub(super) context: Arc<EngineContext>,
    pub(super) activity: InMemoryActivityLog,
    pub(super) accounts: InMemoryAccountDirectory,
}

pub(super) fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(start()));
    let profiles = InMemoryProfileRepository::default();
    let activity = InMemoryActivityLog::default();
    let accounts = InMemoryAccountDirectory::default();
    let stores = EngineStores {
        grants: Arc::new(InMemoryGrantRepository::default()),
        profiles: Arc::new(profiles.clone()),
        activity: Arc::new(activity.clone()),
        accounts: Arc::new(accounts.clone()),
        flags: Arc::new(InMemoryFlagRepository::default()),
        enforcement: Arc::new(InMemoryEnforcementRepository::default()),
        alerts: Arc::new(InMemoryAlertRepository::default()),
        notifications: Arc::new(InMemoryNotificationSink::default()),
    };
    let context = Arc::new(EngineContext::new(
        stores,
        clock.clone(),
        EngineConfig::default(),
    ));
    profiles
        .upsert(Profile::Candidate(candidate()))
        .expect("profile stored");
    Harness {
        clock,
        context,
        activity,
        accounts,
    }
}

pub(super) fn candidate() -> CandidateProfile {
    CandidateProfile {
        candidate_id: key().candidate_id,
        first_name: "Priya".to_string(),
        last_name: "shah".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1994, 7, 12),
        email: "priya.shah@example.com".to_string(),
        phone: "07700 900123".to_string(),
        address: PostalAddress {
            line1: "14 Wharf Street".to_string(),
            line2: None,
            city: "Leeds".to_string(),
            region: "West Yorkshire".to_string(),
            postcode: "LS2 7EQ".to_string(),
            coordinates: None,
        },
        bio: "Warehouse operations lead with eight years running night shifts. ".repeat(5),
        industry_interests: vec!["Logistics".to_string()],
        skills: vec!["Forklift".to_string(), "WMS".to_string()],
        education: vec![Education {
            institution: "Leeds College".to_string(),
            qualification: "BTEC Business".to_string(),
            year: Some(2012),
        }],
        certifications: vec!["IOSH".to_string()],
        salary_expectation: Some(SalaryExpectation {
            min: 31_500,
            max: 38_200,
        }),
        career_goals: Some("Site manager".to_string()),
        work_samples: vec![WorkSample {
            title: "Peak season rota".to_string(),
            url: "https://files.example/rota.pdf".to_string(),
        }],
        achievements: vec!["Cut picking errors by a third".to_string()],
        video_profile: Some(VideoProfile {
            url: "https://cdn.example/priya.mp4".to_string(),
            duration_seconds: 300,
        }),
        references: vec![Reference {
            referee_name: "Tom Reid".to_string(),
            relationship: "Manager".to_string(),
            text: "Tom Reid: Priya never missed a shift.".to_string(),
        }],
    }
}
