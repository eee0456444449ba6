pub mod analytics;
pub mod audit;
pub mod capabilities;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod ranking;
pub mod scoring;

pub use analytics::{Alert, AlertSeverity, StressCalculator, StressReport, StressSignals};
pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use capabilities::{allowed_intents, is_carrier_scoped, is_permitted, Capability};
pub use domain::caller::{CallerContext, Role};
pub use domain::carrier::{CarrierId, CarrierStatistics, ScoreResult, Tier};
pub use domain::entity::{EntityKey, EntityMap, EntityValue};
pub use domain::intent::Intent;
pub use domain::result::{AgentResult, DataQuality, Provenance};
pub use domain::slot::{RankedSlot, RecommendationResult, SlotCandidate, Strategy};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use ledger::{verify_chain, ChainVerification, LedgerChain, LedgerRecord};
pub use ranking::SlotRanker;
pub use scoring::CarrierScorer;
