use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};

use portgate_agent::handlers::HandlerSettings;
use portgate_agent::Orchestrator;
use portgate_core::audit::{AuditCategory, InMemoryAuditSink};
use portgate_core::domain::caller::{CallerContext, Role};
use portgate_core::domain::carrier::{CarrierId, CarrierStatistics};
use portgate_core::domain::entity::{EntityKey, EntityMap};
use portgate_core::domain::intent::Intent;
use portgate_core::domain::operations::{BookingRecord, BookingStatus};
use portgate_core::domain::result::DataQuality;
use portgate_core::domain::slot::SlotCandidate;
use portgate_core::errors::ApplicationError;
use portgate_core::ledger::LedgerChain;
use portgate_upstream::{Collaborator, Collaborators, InMemoryPort, UpstreamError};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .and_then(|date| date.and_hms_opt(8, 15, 0))
        .expect("valid timestamp")
}

fn slot(day: u32, hour: u32, terminal: &str, gate: &str, remaining: u32) -> SlotCandidate {
    let start = NaiveDate::from_ymd_opt(2026, 3, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .expect("valid timestamp");
    SlotCandidate::new(start, terminal, Some(gate.to_owned()), remaining, 10).expect("valid slot")
}

fn port() -> InMemoryPort {
    let mut chain = LedgerChain::new("REF456");
    for (minute, action) in [(0, "created"), (10, "confirmed")] {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 7, minute, 0).single().expect("valid timestamp");
        chain.append(action, action.as_bytes(), at);
    }

    InMemoryPort::new()
        .with_carrier_stats(
            "123",
            CarrierStatistics {
                total_bookings: 120,
                completed_bookings: 116,
                no_shows: 1,
                late_arrivals: 6,
                avg_delay_minutes: 4.0,
                anomaly_count: 1,
                ..CarrierStatistics::default()
            },
        )
        .with_carrier_history(
            "456",
            (0..40)
                .map(|index| BookingRecord {
                    booking_ref: format!("REF9{index:03}"),
                    status: if index % 10 == 0 { "no_show" } else { "completed" }.to_owned(),
                })
                .collect(),
        )
        .with_booking(BookingStatus {
            booking_ref: "REF456".to_owned(),
            status: "confirmed".to_owned(),
            terminal: Some("A".to_owned()),
            gate: Some("G1".to_owned()),
            slot_time: Some("2026-03-03T09:00:00".to_owned()),
            last_update: None,
            carrier_id: Some(CarrierId::new("123")),
        })
        .with_slot(slot(2, 9, "A", "G1", 6))
        .with_slot(slot(2, 11, "A", "G2", 2))
        .with_slot(slot(3, 9, "A", "G1", 1))
        .with_slot(slot(3, 10, "A", "G2", 0))
        .with_ledger_records("REF456", chain.into_records())
}

fn orchestrator(port: InMemoryPort) -> (Orchestrator, InMemoryAuditSink) {
    let sink = InMemoryAuditSink::default();
    let orchestrator = Orchestrator::standard(
        &Collaborators::in_memory(Arc::new(port)),
        &HandlerSettings::default(),
        Arc::new(sink.clone()),
    )
    .expect("default patterns compile")
    .with_clock(now);
    (orchestrator, sink)
}

fn carrier(id: &str) -> CallerContext {
    CallerContext::new(Role::Carrier, format!("trace-carrier-{id}"))
        .with_caller_id(format!("carrier-user-{id}"))
        .with_carrier_scope(CarrierId::new(id))
}

fn operator() -> CallerContext {
    CallerContext::new(Role::Operator, "trace-operator").with_caller_id("op-7")
}

#[tokio::test]
async fn carrier_scores_itself_without_naming_an_id() {
    let (orchestrator, sink) = orchestrator(port());

    let response = orchestrator.handle_chat("What is my reliability score as a carrier?", &[], &carrier("123")).await;

    assert_eq!(response.intent, Intent::CarrierScore);
    assert_eq!(response.data["carrier_id"], "123");
    assert_eq!(response.data["tier"], "A");
    assert_eq!(response.provenance.data_quality, DataQuality::Primary);

    let categories: Vec<AuditCategory> = sink.events().iter().map(|event| event.category).collect();
    assert_eq!(
        categories,
        vec![AuditCategory::Classification, AuditCategory::Authorization, AuditCategory::Handler]
    );
    assert!(sink.events().iter().all(|event| event.correlation_id == "trace-carrier-123"));
}

#[tokio::test]
async fn carrier_cannot_score_another_carrier() {
    let (orchestrator, _) = orchestrator(port());

    let response =
        orchestrator.handle_chat("Show the reliability score of carrier 456", &[], &carrier("123")).await;

    assert_eq!(response.message, "Cannot access other carriers' scores");
    assert_eq!(response.data["reason_code"], "carrier_scope_mismatch");
    assert_eq!(response.data["user_role"], "CARRIER");
}

#[tokio::test]
async fn operator_gets_fallback_score_when_carrier_service_is_missing() {
    let (orchestrator, _) = orchestrator(
        port().with_failure(Collaborator::Carrier, UpstreamError::EndpointMissing { status: 501 }),
    );

    let response =
        orchestrator.handle_chat("What is the reliability score of carrier 456?", &[], &operator()).await;

    assert_eq!(response.provenance.data_quality, DataQuality::Fallback);
    assert_eq!(response.data["source"], "booking_service_fallback");
    assert!(response.data["score"].as_f64().is_some_and(|score| score <= 75.0));
}

#[tokio::test]
async fn french_availability_request_resolves_tomorrow() {
    let (orchestrator, _) = orchestrator(port());

    let response =
        orchestrator.handle_chat("Quels créneaux sont disponibles demain au terminal A ?", &[], &operator()).await;

    assert_eq!(response.intent, Intent::SlotAvailability);
    assert_eq!(response.entities.text(EntityKey::Terminal), Some("A"));
    assert_eq!(response.entities.date(), NaiveDate::from_ymd_opt(2026, 3, 3));
    // One spot left across tomorrow's slots, so alternatives are ranked as well.
    assert_eq!(response.data["recommendation"]["strategy"], "standard");
    assert_eq!(response.data["recommendation"]["ranked"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn availability_never_reveals_another_carriers_score() {
    let (orchestrator, _) = orchestrator(port());
    let entities: EntityMap =
        serde_json::from_str(r#"{"terminal":"A","date":"2026-03-03","carrier_id":"123"}"#)
            .expect("valid entities");

    let staff = orchestrator.handle_direct(Intent::SlotAvailability, &entities, &operator()).await;
    let score_123 = staff.data["carrier_score"].as_f64().expect("operator sees the named carrier");
    assert!(score_123 > 85.0);

    let anonymous = CallerContext::new(Role::Anon, "trace-anon");
    let anonymous = orchestrator.handle_direct(Intent::SlotAvailability, &entities, &anonymous).await;
    assert!(anonymous.data["carrier_score"].is_null());
    assert!(!anonymous.provenance.sources.contains(&"carrier_service".to_owned()));
    // Low availability still ranks alternatives, just without a reliability bias.
    assert_eq!(anonymous.data["recommendation"]["strategy"], "standard");

    let other = orchestrator.handle_direct(Intent::SlotAvailability, &entities, &carrier("456")).await;
    assert_ne!(other.data["carrier_score"].as_f64(), Some(score_123));
}

#[tokio::test]
async fn staff_read_terminal_stress_and_alerts() {
    let (orchestrator, _) = orchestrator(port());

    let stress = orchestrator
        .handle_chat("What is the stress level at terminal A tomorrow?", &[], &operator())
        .await;
    assert_eq!(stress.intent, Intent::AnalyticsStressIndex);
    assert_eq!(stress.entities.date(), NaiveDate::from_ymd_opt(2026, 3, 3));
    // One spot left of twenty tomorrow, and no traffic model output to read.
    assert_eq!(stress.data["report"]["utilization"], 0.95);
    assert_eq!(stress.data["report"]["stress_index"], 53.0);
    assert_eq!(stress.data["report"]["data_mode"], "hybrid");
    assert_eq!(stress.provenance.data_quality, DataQuality::Fallback);

    let alerts = orchestrator.handle_chat("Show alerts for terminal A tomorrow", &[], &operator()).await;
    assert_eq!(alerts.intent, Intent::AnalyticsAlerts);
    assert_eq!(alerts.data["alerts_count"], 1);
    assert_eq!(alerts.data["alerts"][0]["id"], "ALERT-CAPACITY-A-20260303");
    assert_eq!(alerts.data["alerts"][0]["severity"], "critical");
    assert!(alerts.failure.is_none());

    let denied = orchestrator.handle_chat("Show alerts for terminal A", &[], &carrier("123")).await;
    assert_eq!(denied.data["reason_code"], "role_not_permitted");
    assert!(matches!(denied.failure, Some(ApplicationError::AuthorizationDenied { .. })));
}

#[tokio::test]
async fn follow_up_reuses_previous_intent() {
    let (orchestrator, _) = orchestrator(port());

    let response = orchestrator
        .handle_chat("and tomorrow at terminal A?", &[Intent::Help, Intent::SlotAvailability], &operator())
        .await;

    assert_eq!(response.intent, Intent::SlotAvailability);
    assert_eq!(response.entities.date(), NaiveDate::from_ymd_opt(2026, 3, 3));
}

#[tokio::test]
async fn booking_and_audit_flow_for_one_reference() {
    let (orchestrator, _) = orchestrator(port());

    let status = orchestrator.handle_chat("Where is booking REF456?", &[], &carrier("123")).await;
    assert_eq!(status.intent, Intent::BookingStatus);
    assert_eq!(status.data["bookings"][0]["status"], "confirmed");

    let hidden = orchestrator.handle_chat("Where is booking REF456?", &[], &carrier("999")).await;
    assert_eq!(hidden.data["bookings"][0]["found"], false);

    let audit = orchestrator.handle_chat("Verify booking REF456 on blockchain", &[], &operator()).await;
    assert_eq!(audit.intent, Intent::BlockchainAudit);
    assert_eq!(audit.data["verification"]["valid"], true);
    assert_eq!(audit.data["verification"]["verified_entries"], 2);
}

#[tokio::test]
async fn unknown_and_planned_intents_are_answered() {
    let (orchestrator, _) = orchestrator(port());

    let unknown = orchestrator.handle_chat("purple elephants dancing on the quay", &[], &operator()).await;
    assert_eq!(unknown.intent, Intent::Unknown);
    assert_eq!(unknown.data["status"], "clarification_needed");

    let planned = orchestrator
        .handle_direct(Intent::DriverNoshowRisk, &EntityMap::new(), &operator())
        .await;
    assert_eq!(planned.data["status"], "not_implemented");
    assert!(planned.provenance.decision_path.contains(&"handler:planned_feature".to_owned()));
}

#[tokio::test]
async fn identical_requests_produce_identical_decisions() {
    let (orchestrator, _) = orchestrator(port());
    let message = "Recommend a slot at terminal A gate 2 tomorrow at 9am";

    let first = orchestrator.handle_chat(message, &[], &operator()).await;
    let second = orchestrator.handle_chat(message, &[], &operator()).await;

    assert_eq!(first.intent, Intent::SlotRecommendation);
    assert_eq!(first.entities, second.entities);
    assert_eq!(first.data, second.data);
    assert_eq!(first.provenance.decision_path, second.provenance.decision_path);
}
