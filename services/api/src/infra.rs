use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use talent_gate::access::{
    CandidateId, CandidateProfile, Education, PostalAddress, Reference, SalaryExpectation,
    VideoProfile, WorkSample,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const SAMPLE_CANDIDATE: &str = "cand-sample";

/// Fully populated candidate used by `serve --seed-sample` and the demo.
pub(crate) fn sample_candidate() -> CandidateProfile {
    CandidateProfile {
        candidate_id: CandidateId(SAMPLE_CANDIDATE.to_string()),
        first_name: "Amara".to_string(),
        last_name: "Okafor".to_string(),
        date_of_birth: chrono::NaiveDate::from_ymd_opt(1991, 11, 3),
        email: "amara.okafor@example.com".to_string(),
        phone: "07700 900456".to_string(),
        address: PostalAddress {
            line1: "22 Canal Side".to_string(),
            line2: None,
            city: "Manchester".to_string(),
            region: "Greater Manchester".to_string(),
            postcode: "M1 2AB".to_string(),
            coordinates: None,
        },
        bio: "Customer success manager who has rebuilt two onboarding teams and likes \
              measurable service targets. Looking for a hybrid role with room to mentor \
              new starters and shape support tooling."
            .to_string(),
        industry_interests: vec!["SaaS".to_string(), "Fintech".to_string()],
        skills: vec![
            "Zendesk".to_string(),
            "SQL".to_string(),
            "Team leadership".to_string(),
        ],
        education: vec![Education {
            institution: "University of Salford".to_string(),
            qualification: "BSc Business Management".to_string(),
            year: Some(2013),
        }],
        certifications: vec!["ITIL Foundation".to_string()],
        salary_expectation: Some(SalaryExpectation {
            min: 42_000,
            max: 48_500,
        }),
        career_goals: Some("Head of customer experience".to_string()),
        work_samples: vec![WorkSample {
            title: "Onboarding playbook".to_string(),
            url: "https://files.example/playbook.pdf".to_string(),
        }],
        achievements: vec!["Raised CSAT from 78% to 93%".to_string()],
        video_profile: Some(VideoProfile {
            url: "https://cdn.example/amara.mp4".to_string(),
            duration_seconds: 240,
        }),
        references: vec![Reference {
            referee_name: "Dana Price".to_string(),
            relationship: "Former director".to_string(),
            text: "Dana Price: Amara turned our churn around in two quarters.".to_string(),
        }],
    }
}
