use std::collections::HashMap;
use std::sync::Arc;

use portgate_core::domain::intent::Intent;
use portgate_upstream::Collaborators;

use crate::handlers::{
    AnalyticsHandler, AnomalyHandler, AuditTrailHandler, BookingStatusHandler, CarrierScoreHandler,
    ClarificationHandler, Handler, HandlerSettings, HelpHandler, PlannedFeatureHandler,
    SlotHandler, SmalltalkHandler, TrafficHandler,
};

/// Maps every intent to a handler. Intents without a registration land on
/// the fallback, so routing never fails.
pub struct AgentRouter {
    handlers: HashMap<Intent, Arc<dyn Handler>>,
    fallback: Arc<dyn Handler>,
}

impl AgentRouter {
    pub fn new(fallback: Arc<dyn Handler>) -> Self {
        Self { handlers: HashMap::new(), fallback }
    }

    pub fn register(&mut self, intent: Intent, handler: Arc<dyn Handler>) {
        self.handlers.insert(intent, handler);
    }

    pub fn route(&self, intent: Intent) -> &Arc<dyn Handler> {
        self.handlers.get(&intent).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// The production wiring over the given collaborators.
    pub fn standard(collaborators: &Collaborators, settings: &HandlerSettings) -> Self {
        let mut router = Self::new(Arc::new(ClarificationHandler));

        let slots: Arc<dyn Handler> = Arc::new(SlotHandler::new(
            collaborators.slots.clone(),
            collaborators.carriers.clone(),
            settings.clone(),
        ));
        let planned: Arc<dyn Handler> = Arc::new(PlannedFeatureHandler);

        router.register(
            Intent::BookingStatus,
            Arc::new(BookingStatusHandler::new(collaborators.bookings.clone())),
        );
        router.register(
            Intent::CarrierScore,
            Arc::new(CarrierScoreHandler::new(
                collaborators.carriers.clone(),
                collaborators.bookings.clone(),
                settings.carrier_window_days,
            )),
        );
        router.register(Intent::SlotAvailability, slots.clone());
        router.register(Intent::SlotRecommendation, slots);
        router.register(Intent::DriverNoshowRisk, planned.clone());
        router.register(Intent::PassageHistory, planned);
        router.register(
            Intent::TrafficForecast,
            Arc::new(TrafficHandler::new(collaborators.traffic.clone(), settings.traffic_horizon_hours)),
        );
        router.register(
            Intent::AnomalyDetection,
            Arc::new(AnomalyHandler::new(
                collaborators.anomalies.clone(),
                settings.anomaly_lookback_days,
                settings.anomaly_limit,
            )),
        );
        router.register(
            Intent::BlockchainAudit,
            Arc::new(AuditTrailHandler::new(collaborators.ledger.clone())),
        );
        let analytics: Arc<dyn Handler> = Arc::new(AnalyticsHandler::new(
            collaborators.slots.clone(),
            collaborators.traffic.clone(),
            collaborators.anomalies.clone(),
            collaborators.bookings.clone(),
            settings.anomaly_limit,
        ));
        router.register(Intent::AnalyticsStressIndex, analytics.clone());
        router.register(Intent::AnalyticsAlerts, analytics);
        router.register(Intent::Help, Arc::new(HelpHandler));
        router.register(Intent::Smalltalk, Arc::new(SmalltalkHandler));
        router
    }
}
