use crate::infra::{sample_candidate, SAMPLE_CANDIDATE};
use chrono::{Duration, TimeZone, Utc};
use clap::Args;
use std::sync::Arc;
use talent_gate::access::{
    CommitmentType, GrantKey, PaymentStatus, Profile, ProfileRepository, StagedProfile,
};
use talent_gate::clock::{Clock, ManualClock};
use talent_gate::config::EngineConfig;
use talent_gate::detection::PatternDetector;
use talent_gate::error::AppError;
use talent_gate::monitoring::MessageDecision;
use talent_gate::{EngineContext, EngineStores};

#[derive(Args, Debug)]
pub(crate) struct ClassifyArgs {
    /// Message text to classify
    pub(crate) text: String,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Employer id used for the scripted pair
    #[arg(long, default_value = "emp-demo")]
    pub(crate) employer: String,
    /// Annual salary of the eventual hire, in pence
    #[arg(long, default_value_t = 4_500_000)]
    pub(crate) salary_pence: u64,
    /// Message the employer tries to slip past the gate
    #[arg(long, default_value = "Easier if you just text me on 07700 900456")]
    pub(crate) bypass_message: String,
}

pub(crate) fn run_classify(args: ClassifyArgs) -> Result<(), AppError> {
    let classification = PatternDetector::default().classify(&args.text);
    let rendered = serde_json::to_string_pretty(&classification).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let start = Utc
        .with_ymd_and_hms(2025, 6, 2, 9, 30, 0)
        .single()
        .ok_or_else(|| std::io::Error::other("demo start time is ambiguous"))?;
    let clock = Arc::new(ManualClock::new(start));
    let stores = EngineStores::in_memory();
    stores
        .profiles
        .upsert(Profile::Candidate(sample_candidate()))
        .map_err(std::io::Error::other)?;
    let context = EngineContext::new(stores, clock.clone(), EngineConfig::default());
    let key = GrantKey::new(args.employer.clone(), SAMPLE_CANDIDATE);

    println!("Talent Gate demo: {key}");
    println!("Started at {start}");

    let staged = context.disclosure.staged_profile(&key)?;
    print_stage(&staged);

    context.disclosure.sign_agreement(&key)?;
    context.disclosure.request_upgrade(&key, 2, None)?;
    print_stage(&context.disclosure.staged_profile(&key)?);

    context
        .disclosure
        .record_payment(&key, PaymentStatus::PerProfile)?;
    context.disclosure.request_upgrade(&key, 3, None)?;
    print_stage(&context.disclosure.staged_profile(&key)?);

    context
        .disclosure
        .request_upgrade(&key, 4, Some(CommitmentType::SuccessFee))?;
    print_stage(&context.disclosure.staged_profile(&key)?);

    println!();
    println!("Messages");
    clock.advance(Duration::minutes(20));
    let greeting = context
        .monitor
        .gate_message(&key, "Thanks Amara, could we book a call through the platform?");
    print_decision("greeting", &greeting);

    clock.advance(Duration::minutes(5));
    let bypass = context.monitor.gate_message(&key, &args.bypass_message);
    print_decision("bypass attempt", &bypass);

    if let Some(grant) = context.ledger.get(&key).map_err(std::io::Error::other)? {
        let monitoring = grant.monitoring();
        println!(
            "  grant now suspicious={} attempts={} contact_blocked={}",
            monitoring.suspicious_activity,
            monitoring.external_contact_attempts,
            grant.restrictions().contact_blocked
        );
    }

    println!();
    println!("Active alerts");
    for alert in context.alerts.list_active_alerts()? {
        println!(
            "  [{:?}] {} ({:?}) {}",
            alert.severity, alert.rule_id, alert.status, alert.title
        );
    }

    println!();
    println!("Scheduled sweeps");
    clock.advance(Duration::hours(2));
    let tick = context.scheduler.tick();
    println!("  tick at {} raised {} inactivity flag(s)", tick.at, tick.inactivity_flags);
    for sweep in &tick.sweeps {
        println!(
            "  {:?}: {} rule(s), {} raised, {} escalated, {} failure(s)",
            sweep.trigger,
            sweep.rules_evaluated,
            sweep.alerts_raised.len(),
            sweep.alerts_escalated.len(),
            sweep.failures.len()
        );
    }

    println!();
    println!("Hire");
    clock.advance(Duration::days(21));
    let outcome = context
        .enforcement
        .record_hire(&key, args.salary_pence, clock.now(), true)?;
    println!("  billable: {}", outcome.billable);
    for record in &outcome.records {
        println!(
            "  {:?} {} pence due {} ({:?})",
            record.kind, record.amount_pence, record.due_date, record.status
        );
    }
    for record in context.enforcement.for_pair(&key)? {
        println!(
            "  on file: {:?} {} pence ({:?}, {} evidence item(s))",
            record.kind,
            record.amount_pence,
            record.status,
            record.evidence.len()
        );
    }

    Ok(())
}

fn print_stage(staged: &StagedProfile) {
    let view = &staged.view;
    println!();
    println!(
        "Level {} ({})",
        staged.level.number(),
        staged.level.label()
    );
    println!(
        "  {} {} | {}",
        view.basic.first_name,
        view.basic.last_initial,
        view.basic.approximate_age.as_deref().unwrap_or("age withheld")
    );
    if let Some(professional) = &view.professional {
        if let Some(band) = &professional.salary_band {
            println!("  salary band {}-{}", band.min, band.max);
        }
    }
    if let Some(verified) = &view.verified {
        if let Some(video) = &verified.video {
            println!("  video preview capped at {}s", video.max_duration_seconds);
        }
        println!("  {} reference(s), anonymized", verified.references.len());
    }
    match &view.contact {
        Some(contact) => println!("  contact: {}", contact.email),
        None => println!("  contact withheld"),
    }
}

fn print_decision(label: &str, decision: &MessageDecision) {
    println!("  {label}: {:?}", decision.disposition);
    match &decision.delivered_content {
        Some(content) => println!("    delivered: {content}"),
        None => println!(
            "    not delivered: {}",
            decision.reason.as_deref().unwrap_or("blocked by content policy")
        ),
    }
}
