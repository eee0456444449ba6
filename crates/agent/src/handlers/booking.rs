use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::{json, Value};
use tracing::debug;

use portgate_core::domain::caller::CallerContext;
use portgate_core::domain::entity::EntityKey;
use portgate_core::domain::operations::BookingStatus;
use portgate_core::domain::result::{AgentResult, DataQuality, Provenance};
use portgate_upstream::{BookingService, UpstreamError};

use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerRequest};

const SOURCE: &str = "booking_service";

pub struct BookingStatusHandler {
    bookings: Arc<dyn BookingService>,
}

enum Lookup {
    Found(BookingStatus),
    NotFound(String),
}

impl BookingStatusHandler {
    pub fn new(bookings: Arc<dyn BookingService>) -> Self {
        Self { bookings }
    }

    async fn lookup(&self, reference: String, caller: &CallerContext) -> Result<Lookup, HandlerError> {
        match self.bookings.booking_status(&reference, caller).await {
            Ok(status) if visible_to(&status, caller) => Ok(Lookup::Found(status)),
            Ok(_) | Err(UpstreamError::NotFound { .. }) => Ok(Lookup::NotFound(reference)),
            Err(error) => Err(HandlerError::upstream(SOURCE)(error)),
        }
    }
}

/// Carrier-bound callers only see their own carrier's bookings; anything else
/// reads as unknown.
fn visible_to(status: &BookingStatus, caller: &CallerContext) -> bool {
    if !caller.role.is_carrier_bound() {
        return true;
    }
    match (&status.carrier_id, &caller.carrier_scope) {
        (Some(owner), Some(scope)) => owner == scope,
        (None, _) => true,
        (Some(_), None) => false,
    }
}

#[async_trait]
impl Handler for BookingStatusHandler {
    fn name(&self) -> &'static str {
        "booking_status"
    }

    async fn execute(&self, request: &HandlerRequest<'_>) -> Result<AgentResult, HandlerError> {
        let caller = request.caller;
        let references = request.entities.booking_refs();
        if references.is_empty() {
            return Err(HandlerError::missing(EntityKey::BookingRef));
        }

        let lookups = join_all(references.into_iter().map(|reference| self.lookup(reference, caller)))
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let found = lookups.iter().filter(|lookup| matches!(lookup, Lookup::Found(_))).count();
        debug!(
            event_name = "agent.booking_status.looked_up",
            correlation_id = %caller.trace_id,
            requested = lookups.len(),
            found,
            "booking lookups complete"
        );

        let message = lookups.iter().map(lookup_line).collect::<Vec<_>>().join("\n");
        let data = json!({ "bookings": lookups.iter().map(lookup_data).collect::<Vec<_>>() });
        let provenance =
            Provenance::new(caller.trace_id.clone(), DataQuality::Primary).with_source(SOURCE);

        Ok(AgentResult::new(message, data, provenance))
    }
}

fn lookup_line(lookup: &Lookup) -> String {
    match lookup {
        Lookup::NotFound(reference) => format!("Booking {reference} was not found."),
        Lookup::Found(status) => {
            let mut line = format!("Booking {} is {}", status.booking_ref, status.status);
            if let Some(terminal) = &status.terminal {
                line.push_str(&format!(" at terminal {terminal}"));
            }
            if let Some(gate) = &status.gate {
                line.push_str(&format!(", gate {gate}"));
            }
            if let Some(slot_time) = &status.slot_time {
                line.push_str(&format!(" (slot {slot_time})"));
            }
            line.push('.');
            line
        }
    }
}

fn lookup_data(lookup: &Lookup) -> Value {
    match lookup {
        Lookup::NotFound(reference) => json!({ "booking_ref": reference, "found": false }),
        Lookup::Found(status) => json!({
            "booking_ref": status.booking_ref,
            "found": true,
            "status": status.status,
            "terminal": status.terminal,
            "gate": status.gate,
            "slot_time": status.slot_time,
            "last_update": status.last_update,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use portgate_core::domain::caller::{CallerContext, Role};
    use portgate_core::domain::carrier::CarrierId;
    use portgate_core::domain::entity::{EntityKey, EntityMap, EntityValue};
    use portgate_core::domain::intent::Intent;
    use portgate_core::domain::operations::BookingStatus;
    use portgate_upstream::{Collaborator, InMemoryPort, UpstreamError};

    use super::BookingStatusHandler;
    use crate::error::HandlerError;
    use crate::handlers::fixtures::{operator, request};
    use crate::handlers::Handler;

    fn booking(reference: &str, carrier: &str) -> BookingStatus {
        BookingStatus {
            booking_ref: reference.to_owned(),
            status: "confirmed".to_owned(),
            terminal: Some("A".to_owned()),
            gate: Some("G2".to_owned()),
            slot_time: Some("2026-03-02T09:00:00".to_owned()),
            last_update: None,
            carrier_id: Some(CarrierId::new(carrier)),
        }
    }

    fn handler() -> BookingStatusHandler {
        BookingStatusHandler::new(Arc::new(
            InMemoryPort::new().with_booking(booking("REF123", "12")).with_booking(booking("REF456", "34")),
        ))
    }

    fn refs(references: &[&str]) -> EntityMap {
        let mut entities = EntityMap::new();
        entities.insert(
            EntityKey::BookingRef,
            EntityValue::List(references.iter().map(|reference| (*reference).to_owned()).collect()),
        );
        entities
    }

    #[tokio::test]
    async fn reports_each_reference_in_order() {
        let entities = refs(&["REF123", "REF999"]);
        let caller = operator();

        let result = handler()
            .execute(&request(Intent::BookingStatus, &entities, &caller))
            .await
            .expect("lookups");

        assert_eq!(result.data["bookings"][0]["found"], true);
        assert_eq!(result.data["bookings"][0]["gate"], "G2");
        assert_eq!(result.data["bookings"][1]["booking_ref"], "REF999");
        assert_eq!(result.data["bookings"][1]["found"], false);
        assert_eq!(
            result.message,
            "Booking REF123 is confirmed at terminal A, gate G2 (slot 2026-03-02T09:00:00).\nBooking REF999 was not found."
        );
    }

    #[tokio::test]
    async fn carriers_cannot_see_other_carriers_bookings() {
        let entities = refs(&["REF123", "REF456"]);
        let caller = CallerContext::new(Role::Carrier, "trace-c").with_carrier_scope(CarrierId::new("12"));

        let result = handler()
            .execute(&request(Intent::BookingStatus, &entities, &caller))
            .await
            .expect("lookups");

        assert_eq!(result.data["bookings"][0]["found"], true);
        assert_eq!(result.data["bookings"][1]["found"], false);
        assert!(result.data["bookings"][1].get("status").is_none());
    }

    #[tokio::test]
    async fn requires_a_reference_and_surfaces_outages() {
        let caller = operator();
        let error = handler()
            .execute(&request(Intent::BookingStatus, &EntityMap::new(), &caller))
            .await
            .expect_err("reference required");
        assert_eq!(error, HandlerError::missing(EntityKey::BookingRef));

        let failing = BookingStatusHandler::new(Arc::new(
            InMemoryPort::new().with_failure(Collaborator::BookingStatus, UpstreamError::Timeout),
        ));
        let entities = EntityMap::new().with_text(EntityKey::BookingRef, "REF123");
        let error = failing
            .execute(&request(Intent::BookingStatus, &entities, &caller))
            .await
            .expect_err("outage");
        assert!(matches!(error, HandlerError::Upstream { collaborator: "booking_service", .. }));
    }
}
