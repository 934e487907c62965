//! End-to-end scenarios through the public engine facade: staged disclosure, message
//! gating, hire billing and the scheduled collection ladder.

mod common {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use talent_gate::access::{
        CandidateId, CandidateProfile, CommitmentType, GrantKey, PaymentStatus, PostalAddress,
        Profile, ProfileRepository, SalaryExpectation,
    };
    use talent_gate::clock::ManualClock;
    use talent_gate::config::EngineConfig;
    use talent_gate::{EngineContext, EngineStores};

    pub(super) fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 7, 9, 0, 0).unwrap()
    }

    pub(super) fn key() -> GrantKey {
        GrantKey::new("emp-northwind", "cand-leo")
    }

    fn candidate() -> CandidateProfile {
        CandidateProfile {
            candidate_id: CandidateId("cand-leo".to_string()),
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
            bio: "Backend developer.".to_string(),
            industry_interests: Vec::new(),
            skills: vec!["Rust".to_string()],
            education: Vec::new(),
            certifications: Vec::new(),
            salary_expectation: Some(SalaryExpectation {
                min: 55_000,
                max: 62_000,
            }),
            career_goals: None,
            work_samples: Vec::new(),
            achievements: Vec::new(),
            video_profile: None,
            references: Vec::new(),
        }
    }

    pub(super) fn engine() -> (Arc<ManualClock>, EngineContext) {
        let clock = Arc::new(ManualClock::new(start()));
        let stores = EngineStores::in_memory();
        stores
            .profiles
            .upsert(Profile::Candidate(candidate()))
            .expect("profile stored");
        let context = EngineContext::new(stores, clock.clone(), EngineConfig::default());
        (clock, context)
    }

    /// Walk the pair to level 4 and exchange a clean message to open the exclusive period.
    pub(super) fn reach_first_contact(context: &EngineContext) {
        let disclosure = &context.disclosure;
        disclosure.sign_agreement(&key()).expect("agreement");
        disclosure
            .record_payment(&key(), PaymentStatus::Subscription)
            .expect("payment");
        disclosure
            .request_upgrade(&key(), 4, Some(CommitmentType::SuccessFee))
            .expect("contact level");
        let decision = context
            .monitor
            .gate_message(&key(), "Great chatting, shall we set up a second interview?");
        assert!(decision.is_delivered());
    }
}

mod hiring {
    use super::common::*;
    use chrono::Duration;
    use talent_gate::clock::Clock;
    use talent_gate::enforcement::{ObligationKind, ObligationStatus};

    #[test]
    fn on_platform_hire_inside_the_exclusive_period_owes_a_success_fee() {
        let (clock, context) = engine();
        reach_first_contact(&context);
        clock.advance(Duration::days(30));

        let outcome = context
            .enforcement
            .record_hire(&key(), 4_000_000, clock.now(), true)
            .expect("hire recorded");
        assert!(outcome.billable);
        assert_eq!(outcome.records.len(), 1);
        let fee = &outcome.records[0];
        assert_eq!(fee.kind, ObligationKind::SuccessFee);
        assert_eq!(fee.rate_percent, Some(15));
        assert_eq!(fee.amount_pence, 600_000);
        assert_eq!(fee.status, ObligationStatus::Pending);
        assert_eq!(fee.due_date, clock.now() + Duration::days(30));

        let again = context
            .enforcement
            .record_hire(&key(), 4_000_000, clock.now(), true)
            .expect("hire recorded again");
        assert_eq!(again.records[0].id, fee.id);
        assert_eq!(context.enforcement.records().unwrap().len(), 1);
    }

    #[test]
    fn off_platform_hire_adds_the_confirmed_hire_penalty() {
        let (clock, context) = engine();
        reach_first_contact(&context);
        clock.advance(Duration::days(90));

        let outcome = context
            .enforcement
            .record_hire(&key(), 3_000_000, clock.now(), false)
            .expect("hire recorded");
        assert!(outcome.billable);
        let penalty = outcome
            .records
            .iter()
            .find(|record| record.kind == ObligationKind::BypassPenalty)
            .expect("penalty raised");
        assert!(penalty.confirmed_hire);
        assert_eq!(penalty.amount_pence, 1_000_000);
    }

    #[test]
    fn hires_without_contact_or_after_the_period_are_not_billable() {
        let (clock, context) = engine();
        let cold = context
            .enforcement
            .record_hire(&key(), 3_000_000, clock.now(), true)
            .expect("hire recorded");
        assert!(!cold.billable);
        assert!(cold.records.is_empty());

        reach_first_contact(&context);
        clock.advance(Duration::days(366));
        let late = context
            .enforcement
            .record_hire(&key(), 3_000_000, clock.now(), false)
            .expect("hire recorded");
        assert!(!late.billable);
        assert!(context.enforcement.records().unwrap().is_empty());
    }

    #[test]
    fn disputed_fees_can_still_be_settled() {
        let (clock, context) = engine();
        reach_first_contact(&context);
        let outcome = context
            .enforcement
            .record_hire(&key(), 2_000_000, clock.now(), true)
            .expect("hire recorded");
        let id = outcome.records[0].id;

        let disputed = context
            .enforcement
            .transition(&id, ObligationStatus::Disputed)
            .expect("disputed");
        assert_eq!(disputed.status, ObligationStatus::Disputed);
        let paid = context
            .enforcement
            .transition(&id, ObligationStatus::Paid)
            .expect("paid");
        assert_eq!(paid.status, ObligationStatus::Paid);

        assert!(context
            .enforcement
            .transition(&id, ObligationStatus::Pending)
            .is_err());
    }
}

mod circumvention {
    use super::common::*;
    use chrono::Duration;
    use talent_gate::clock::Clock;
    use talent_gate::alerts::AlertStatus;
    use talent_gate::enforcement::{NoticeStage, ObligationStatus};
    use talent_gate::monitoring::MessageDisposition;

    #[test]
    fn a_bypass_attempt_locks_the_pair_down_and_is_collected_on_schedule() {
        let (clock, context) = engine();
        reach_first_contact(&context);

        clock.advance(Duration::minutes(15));
        let decision = context
            .monitor
            .gate_message(&key(), "Drop me an email at leo.marsh@example.com instead");
        assert_eq!(decision.disposition, MessageDisposition::Blocked);

        let staged = context.disclosure.staged_profile(&key()).expect("staged");
        assert!(staged.restrictions.all_blocked());
        assert!(staged.view.contact.is_none());

        let penalty = context
            .enforcement
            .for_pair(&key())
            .unwrap()
            .pop()
            .expect("penalty raised");

        clock.set(penalty.due_date + Duration::days(8));
        let tick = context.scheduler.tick();
        assert_eq!(tick.sweeps.len(), 3);

        let stored = context.enforcement.get(&penalty.id).unwrap();
        assert_eq!(stored.status, ObligationStatus::Overdue);
        assert_eq!(stored.last_notice(), Some(NoticeStage::Reminder));

        let overdue = context.enforcement.get_overdue_fees(clock.now()).unwrap();
        assert_eq!(overdue.len(), 1);

        let active = context.alerts.list_active_alerts().unwrap();
        assert!(active
            .iter()
            .any(|alert| alert.rule_id == "overdue-obligations"
                && alert.status == AlertStatus::Pending));
    }

    #[test]
    fn paying_a_penalty_stops_the_notice_ladder() {
        let (clock, context) = engine();
        reach_first_contact(&context);
        context
            .monitor
            .gate_message(&key(), "Text me on 07700 900789 and we can skip the fees");
        let penalty = context
            .enforcement
            .for_pair(&key())
            .unwrap()
            .pop()
            .expect("penalty raised");
        context
            .enforcement
            .transition(&penalty.id, ObligationStatus::Paid)
            .expect("paid");

        clock.set(penalty.due_date + Duration::days(40));
        context.scheduler.tick();
        let stored = context.enforcement.get(&penalty.id).unwrap();
        assert_eq!(stored.status, ObligationStatus::Paid);
        assert!(stored.notices.is_empty());
        assert!(context
            .enforcement
            .get_overdue_fees(clock.now())
            .unwrap()
            .is_empty());
    }
}
