//! Conversational decision core for port operations.
//!
//! A message flows through a fixed pipeline:
//! 1. **Classification** (`classifier`) - deterministic pattern groups pick an intent
//! 2. **Resolution** (`resolver`) - the intent's entities are extracted and normalized
//! 3. **Authorization** (`policy`) - role and carrier-scope rules allow or deny
//! 4. **Routing** (`router`) - the intent selects a domain handler
//! 5. **Execution** (`handlers`) - handlers consult collaborators and score or rank
//! 6. **Formatting** (`formatter`) - every outcome becomes an `AgentResult` with provenance
//!
//! `Orchestrator` drives the pipeline. No stage calls a language model; the
//! same message, history and clock always produce the same decision.

pub mod classifier;
pub mod error;
pub mod formatter;
pub mod handlers;
pub mod orchestrator;
pub mod policy;
pub mod resolver;
pub mod router;

pub use classifier::{Classification, IntentClassifier};
pub use error::{AgentError, HandlerError};
pub use handlers::{Handler, HandlerRequest, HandlerSettings};
pub use orchestrator::{ChatResponse, Orchestrator};
pub use policy::{PolicyDecision, PolicyEnforcer};
pub use resolver::EntityResolver;
pub use router::AgentRouter;
