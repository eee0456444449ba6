//! Pattern-based intent classification over English and French phrasing.
//!
//! Every intent owns a [`PatternGroup`] with an explicit numeric priority.
//! All groups are evaluated and the highest-priority group with a matching
//! trigger wins, so declaration order never changes the outcome. The winning
//! group's capture patterns run once and hand their fragments to the entity
//! resolver.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use portgate_core::domain::entity::EntityKey;
use portgate_core::domain::intent::Intent;

use crate::error::AgentError;

pub const EMPTY_MESSAGE_RULE: &str = "empty_message";
pub const NO_MATCH_RULE: &str = "no_pattern_matched";
pub const FOLLOW_UP_RULE: &str = "follow_up";

/// Messages this short are treated as follow-ups even without a keyword.
const FOLLOW_UP_MAX_WORDS: usize = 4;

const FOLLOW_UP_KEYWORDS: &str = r"\b(and|what about|then|also|too|same|yesterday|tomorrow|today|next|previous|et|puis|aussi|même|hier|demain|aujourd['’]hui)\b";

const CAPTURE_BOOKING_REF: &str = r"\b(?P<booking_ref>(?:REF|BK|BOOK)[-\s]?\d{3,})\b";
const CAPTURE_CARRIER_ID: &str = r"\b(?:carrier|transporteur|chauffeur|driver|company|société|entreprise)\s+(?:id\s+)?(?P<carrier_id>\d{1,10})\b";
const CAPTURE_TERMINAL: &str = r"\bterminale?\s+(?P<terminal>[a-z])\b";
const CAPTURE_GATE: &str = r"\b(?:gate|porte)\s+(?P<gate>[a-z]?\d+)\b";

#[derive(Clone, Copy, Debug)]
pub struct PatternRule {
    pub name: &'static str,
    pub pattern: &'static str,
}

const fn rule(name: &'static str, pattern: &'static str) -> PatternRule {
    PatternRule { name, pattern }
}

#[derive(Clone, Copy, Debug)]
pub struct PatternGroup {
    pub intent: Intent,
    /// Higher wins when several groups match.
    pub priority: u16,
    pub triggers: &'static [PatternRule],
    pub captures: &'static [&'static str],
}

pub const PATTERN_GROUPS: [PatternGroup; 13] = [
    PatternGroup {
        intent: Intent::Help,
        priority: 100,
        triggers: &[
            rule("help_keyword", r"\b(help|assist|what can|how to|guide|aide|aidez)\b"),
            rule("greeting", r"^(hi|hello|hey|bonjour|salam|salut)([\s!,.]|$)"),
            rule(
                "capability_query",
                r"\b(what (can|do) you|qu['’]est-ce que tu|que peux-tu|comment (faire|utiliser))\b",
            ),
        ],
        captures: &[],
    },
    PatternGroup {
        intent: Intent::BlockchainAudit,
        priority: 90,
        triggers: &[
            rule(
                "audit_keyword",
                r"\b(blockchain|ledger|audit|tamper\w*|prove|proof|preuve|prouv\w*|integrity|intégrité)\b",
            ),
            rule(
                "verify_chain",
                r"\b(verify|vérifi\w*|trace|tracer)\b.*\b(chain|chaîne|hash|integrity|intégrité)\b",
            ),
        ],
        captures: &[CAPTURE_BOOKING_REF],
    },
    PatternGroup {
        intent: Intent::AnalyticsStressIndex,
        priority: 88,
        triggers: &[
            rule("stress_keyword", r"\b(stress|saturation|strain)\b"),
            rule(
                "congestion_level",
                r"\b(congestion|engorgement|encombrement)\b.*\b(index|level|score|indice|niveau)\b",
            ),
            rule(
                "level_of_congestion",
                r"\b(index|level|indice|niveau)\b.*\b(congestion|engorgement|encombrement)\b",
            ),
            rule("how_busy", r"\b(how busy|how congested|quel niveau de charge)\b"),
        ],
        captures: &[CAPTURE_TERMINAL, CAPTURE_GATE],
    },
    PatternGroup {
        intent: Intent::AnalyticsAlerts,
        priority: 87,
        triggers: &[
            rule("alert_keyword", r"\b(alerts?|alertes?|warnings?|avertissements?)\b"),
            rule(
                "upcoming_issue",
                r"\b(upcoming|potential|à venir|potentiels?)\b.*\b(problems?|issues?|problèmes?)\b",
            ),
        ],
        captures: &[CAPTURE_TERMINAL],
    },
    PatternGroup {
        intent: Intent::AnomalyDetection,
        priority: 85,
        triggers: &[
            rule(
                "anomaly_keyword",
                r"\b(anomaly|anomalies|unusual|suspicious|suspect|anormale?s?|inhabituel\w*)\b",
            ),
            rule(
                "recurrent_issue",
                r"\b(no-show|no show|delays?|retards?|absences?)\b.*\b(recurr\w*|frequent\w*|récurrent\w*|fréquent\w*)\b",
            ),
            rule(
                "detect_anomaly",
                r"\b(detect|find|show|détecter|trouver|afficher)\b.*\b(anomal\w*|issues?|problèmes?)\b",
            ),
        ],
        captures: &[CAPTURE_TERMINAL, CAPTURE_CARRIER_ID],
    },
    PatternGroup {
        intent: Intent::CarrierScore,
        priority: 80,
        triggers: &[
            rule(
                "carrier_score_explicit",
                r"\b(carriers?|drivers?|company|transporteurs?|chauffeurs?|société)\b.*\b(score|rating|reliability|note|fiabilité|performance)\b",
            ),
            rule(
                "score_carrier_reversed",
                r"\b(score|rating|note|fiabilité)\b.*\b(carriers?|drivers?|transporteurs?|chauffeurs?)\b",
            ),
            rule(
                "reliability_query",
                r"\b(how reliable|quelle fiabilité|performance of|performance de)\b",
            ),
            rule("rate_carrier", r"\b(rate|noter|évaluer)\b.*\b(carriers?|transporteurs?)\b"),
        ],
        captures: &[CAPTURE_CARRIER_ID],
    },
    PatternGroup {
        intent: Intent::DriverNoshowRisk,
        priority: 75,
        triggers: &[
            rule(
                "noshow_risk_explicit",
                r"\b(no-show|no show|noshow)\b.*\b(risk|prediction|probabilité|risque)\b",
            ),
            rule(
                "risk_noshow_reversed",
                r"\b(risk|risque)\b.*\b(no-show|no show|noshow|absence)\b",
            ),
            rule(
                "predict_noshow",
                r"\b(predict|prédire|prévoir)\b.*\b(no-show|no show|noshow|absence)\b",
            ),
        ],
        captures: &[CAPTURE_CARRIER_ID, CAPTURE_BOOKING_REF],
    },
    PatternGroup {
        intent: Intent::TrafficForecast,
        priority: 70,
        triggers: &[
            rule(
                "traffic_forecast_explicit",
                r"\b(traffic|congestion|trafic)\b.*\b(forecast|predict\w*|tomorrow|future|prévisions?|demain|futur)\b",
            ),
            rule(
                "future_traffic",
                r"\b(tomorrow|next|demain|prochaine?)\b.*\b(traffic|congestion|busy|trafic|affluence)\b",
            ),
            rule(
                "predict_traffic",
                r"\b(predict|forecast|prévoir|prédire|prévisions?)\b.*\b(traffic|load|trafic|charge)\b",
            ),
        ],
        captures: &[CAPTURE_TERMINAL],
    },
    PatternGroup {
        intent: Intent::PassageHistory,
        priority: 65,
        triggers: &[
            rule(
                "passage_history_explicit",
                r"\b(passages?|entry|entries|trucks?|vehicles?|camions?|véhicules?)\b.*\b(history|yesterday|past|previous|historique|hier|passé|précédents?)\b",
            ),
            rule(
                "history_passage_reversed",
                r"\b(history|historique)\b.*\b(passages?|entries|trucks?|camions?)\b",
            ),
            rule(
                "show_passage",
                r"\b(show|list|get|afficher|lister)\b.*\b(passages?|entry|entries|trucks?|camions?)\b",
            ),
            rule(
                "yesterday_passage",
                r"\b(yesterday|hier)\b.*\b(passages?|trucks?|entry|entries|entrées?|camions?)\b",
            ),
        ],
        captures: &[CAPTURE_TERMINAL, CAPTURE_GATE],
    },
    PatternGroup {
        intent: Intent::SlotRecommendation,
        priority: 60,
        triggers: &[
            rule(
                "recommend_slot_explicit",
                r"\b(recommend\w*|sugg[eèé]re\w*|suggest\w*|best|optimal|conseill\w*|meilleure?)\b.*\b(slots?|times?|créneaux|créneau|heures?)\b",
            ),
            rule(
                "which_best_slot",
                r"\b(which|what|quel\w*)\b.*\b(slots?|times?|créneaux|créneau)\b.*\b(best|better|recommend\w*|meilleure?|conseillée?)\b",
            ),
            rule(
                "alternative_slot",
                r"\b(alternatives?|other|autres?)\b.*\b(slots?|times?|créneaux|créneau)\b",
            ),
        ],
        captures: &[CAPTURE_TERMINAL, CAPTURE_GATE, CAPTURE_CARRIER_ID],
    },
    PatternGroup {
        intent: Intent::SlotAvailability,
        priority: 55,
        triggers: &[
            rule(
                "slot_availability_explicit",
                r"\b(available|availability|free|open|disponibles?|disponibilités?|libres?|ouverts?)\b.*\b(slots?|times?|appointments?|créneaux|créneau|heures?|rendez-vous)\b",
            ),
            rule(
                "slot_available_reversed",
                r"\b(slots?|times?|appointments?|créneaux|créneau|heures?)\b.*\b(available|free|open|disponibles?|libres?)\b",
            ),
            rule(
                "book_slot",
                r"\b(book|reserve|schedule|réserver|planifier)\b.*\b(slots?|times?|créneaux|créneau|heures?)\b",
            ),
            rule(
                "check_availability",
                r"\b(check|voir|vérifier)\b.*\b(availability|disponibilités?)\b",
            ),
            rule(
                "terminal_availability",
                r"\b(availability|disponibilités?|capacity|capacité)\b.*\bterminale?\b",
            ),
        ],
        captures: &[CAPTURE_TERMINAL, CAPTURE_GATE],
    },
    PatternGroup {
        intent: Intent::BookingStatus,
        priority: 50,
        triggers: &[
            rule(
                "status_booking_explicit",
                r"\b(status|track|where|check|verify|find|locate|statut|suivre|où|vérifier|trouver|localiser)\b.*\b(bookings?|reservations?|ref|reference|réservations?|référence)\b",
            ),
            rule(
                "booking_status_reversed",
                r"\b(bookings?|reservations?|ref|reference|réservations?)\b.*\b(status|track|where|check|statut|suivre|où)\b",
            ),
            rule("booking_ref_pattern", r"\b(REF|BK|BOOK)[-\s]?\d{3,}\b"),
            rule(
                "where_booking",
                r"\b(where is|où est|quand|when)\b.*\b(booking|reservation|my|ma|mon)\b",
            ),
        ],
        captures: &[CAPTURE_BOOKING_REF],
    },
    PatternGroup {
        intent: Intent::Smalltalk,
        priority: 10,
        triggers: &[
            rule(
                "acknowledgment",
                r"^(ok|okay|d['’]accord|merci|thanks|thank you|oui|yes|non|no)([\s!.,]|$)",
            ),
            rule("positive_short", r"^(good|great|bien|bon|super|parfait)([\s!.,]|$)"),
            rule("how_are_you", r"\b(how are you|comment ça va|ça va)\b"),
        ],
        captures: &[],
    },
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    /// Trigger rules of the winning group that matched, in declaration order.
    pub matched_rules: Vec<&'static str>,
    /// Raw fragments captured for the winning intent, in message order.
    pub captures: BTreeMap<EntityKey, Vec<String>>,
}

impl Classification {
    fn without_captures(intent: Intent, rule: &'static str) -> Self {
        Self { intent, matched_rules: vec![rule], captures: BTreeMap::new() }
    }

    pub fn is_unknown(&self) -> bool {
        self.intent == Intent::Unknown
    }

    pub fn first_capture(&self, key: EntityKey) -> Option<&str> {
        self.captures.get(&key).and_then(|values| values.first()).map(String::as_str)
    }
}

struct CompiledGroup {
    intent: Intent,
    priority: u16,
    triggers: Vec<(&'static str, Regex)>,
    captures: Vec<Regex>,
}

pub struct IntentClassifier {
    groups: Vec<CompiledGroup>,
    follow_up: Regex,
}

impl IntentClassifier {
    pub fn new() -> Result<Self, AgentError> {
        Self::with_groups(&PATTERN_GROUPS)
    }

    pub fn with_groups(groups: &[PatternGroup]) -> Result<Self, AgentError> {
        let mut compiled = groups
            .iter()
            .map(|group| {
                let triggers = group
                    .triggers
                    .iter()
                    .map(|rule| compile(rule.pattern).map(|regex| (rule.name, regex)))
                    .collect::<Result<Vec<_>, _>>()?;
                let captures =
                    group.captures.iter().map(|pattern| compile(pattern)).collect::<Result<_, _>>()?;
                Ok(CompiledGroup {
                    intent: group.intent,
                    priority: group.priority,
                    triggers,
                    captures,
                })
            })
            .collect::<Result<Vec<_>, AgentError>>()?;
        // Stable sort keeps declaration order only as a tie-break between
        // groups sharing a priority.
        compiled.sort_by(|left, right| right.priority.cmp(&left.priority));

        Ok(Self { groups: compiled, follow_up: compile(FOLLOW_UP_KEYWORDS)? })
    }

    pub fn classify(&self, message: &str) -> Classification {
        self.classify_with_history(message, &[])
    }

    /// Classifies `message`, reusing the latest non-generic intent from
    /// `history` (oldest first) when the message reads as a follow-up.
    pub fn classify_with_history(&self, message: &str, history: &[Intent]) -> Classification {
        let text = message.trim();
        if text.is_empty() {
            return Classification::without_captures(Intent::Unknown, EMPTY_MESSAGE_RULE);
        }

        for group in &self.groups {
            let matched_rules: Vec<&'static str> = group
                .triggers
                .iter()
                .filter(|(_, regex)| regex.is_match(text))
                .map(|(name, _)| *name)
                .collect();
            if matched_rules.is_empty() {
                continue;
            }
            return Classification {
                intent: group.intent,
                matched_rules,
                captures: harvest(&group.captures, text),
            };
        }

        if let Some(previous) = self.follow_up_intent(text, history) {
            return Classification::without_captures(previous, FOLLOW_UP_RULE);
        }

        Classification::without_captures(Intent::Unknown, NO_MATCH_RULE)
    }

    fn follow_up_intent(&self, text: &str, history: &[Intent]) -> Option<Intent> {
        let short = text.split_whitespace().count() <= FOLLOW_UP_MAX_WORDS;
        if !short && !self.follow_up.is_match(text) {
            return None;
        }
        history.iter().rev().copied().find(|intent| !intent.is_generic())
    }
}

fn harvest(captures: &[Regex], text: &str) -> BTreeMap<EntityKey, Vec<String>> {
    let mut harvested: BTreeMap<EntityKey, Vec<String>> = BTreeMap::new();
    for regex in captures {
        for found in regex.captures_iter(text) {
            for name in regex.capture_names().flatten() {
                let (Some(key), Some(value)) = (entity_key(name), found.name(name)) else {
                    continue;
                };
                let values = harvested.entry(key).or_default();
                let value = value.as_str().to_owned();
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
    }
    harvested
}

fn entity_key(name: &str) -> Option<EntityKey> {
    match name {
        "booking_ref" => Some(EntityKey::BookingRef),
        "carrier_id" => Some(EntityKey::CarrierId),
        "terminal" => Some(EntityKey::Terminal),
        "gate" => Some(EntityKey::Gate),
        _ => None,
    }
}

pub(crate) fn compile(pattern: &'static str) -> Result<Regex, AgentError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| AgentError::Pattern { pattern, source })
}

#[cfg(test)]
mod tests {
    use portgate_core::domain::entity::EntityKey;
    use portgate_core::domain::intent::Intent;

    use super::{IntentClassifier, PatternGroup, PatternRule, PATTERN_GROUPS};

    struct Case {
        message: &'static str,
        expected: Intent,
    }

    fn classifier() -> IntentClassifier {
        IntentClassifier::new().expect("built-in patterns compile")
    }

    fn assert_cases(cases: &[Case]) {
        let classifier = classifier();
        for case in cases {
            let classification = classifier.classify(case.message);
            assert_eq!(
                classification.intent, case.expected,
                "message `{}` matched {:?}",
                case.message, classification.matched_rules
            );
        }
    }

    #[test]
    fn english_phrases_reach_their_intent() {
        assert_cases(&[
            Case { message: "What's the status of REF123?", expected: Intent::BookingStatus },
            Case {
                message: "Show me available slots for terminal A tomorrow",
                expected: Intent::SlotAvailability,
            },
            Case { message: "Recommend a slot for terminal B", expected: Intent::SlotRecommendation },
            Case {
                message: "What's the carrier score for company 456?",
                expected: Intent::CarrierScore,
            },
            Case {
                message: "Predict no-show risk for carrier 123",
                expected: Intent::DriverNoshowRisk,
            },
            Case { message: "Show yesterday's truck passages", expected: Intent::PassageHistory },
            Case { message: "What's tomorrow's traffic forecast?", expected: Intent::TrafficForecast },
            Case { message: "Detect anomalies in terminal A", expected: Intent::AnomalyDetection },
            Case {
                message: "Verify booking REF456 on blockchain",
                expected: Intent::BlockchainAudit,
            },
            Case { message: "Where is my booking BK20001?", expected: Intent::BookingStatus },
            Case {
                message: "What is the stress level at terminal A today?",
                expected: Intent::AnalyticsStressIndex,
            },
            Case { message: "How busy is terminal B tomorrow?", expected: Intent::AnalyticsStressIndex },
            Case { message: "Show alerts for terminal A", expected: Intent::AnalyticsAlerts },
            Case {
                message: "Any upcoming issues at terminal C?",
                expected: Intent::AnalyticsAlerts,
            },
            Case { message: "Help me", expected: Intent::Help },
            Case { message: "Hello", expected: Intent::Help },
            Case { message: "thanks!", expected: Intent::Smalltalk },
        ]);
    }

    #[test]
    fn french_phrases_reach_their_intent() {
        assert_cases(&[
            Case { message: "Quel est le statut de REF789?", expected: Intent::BookingStatus },
            Case { message: "Disponibilité au terminal A demain", expected: Intent::SlotAvailability },
            Case {
                message: "Suggère-moi un créneau pour terminal B",
                expected: Intent::SlotRecommendation,
            },
            Case {
                message: "Quelle est la fiabilité du transporteur 456?",
                expected: Intent::CarrierScore,
            },
            Case { message: "Historique des passages hier", expected: Intent::PassageHistory },
            Case { message: "Prévision trafic demain", expected: Intent::TrafficForecast },
            Case { message: "Détecter les anomalies", expected: Intent::AnomalyDetection },
            Case {
                message: "Niveau de congestion au terminal A",
                expected: Intent::AnalyticsStressIndex,
            },
            Case { message: "Alertes pour le terminal B", expected: Intent::AnalyticsAlerts },
            Case { message: "Créneaux libres au terminal C", expected: Intent::SlotAvailability },
            Case { message: "Bonjour", expected: Intent::Help },
            Case { message: "Merci", expected: Intent::Smalltalk },
        ]);
    }

    #[test]
    fn unmatched_and_empty_messages_are_unknown() {
        let classifier = classifier();
        for message in ["", "   ", "asdfghjkl", "the quick brown fox jumps over the lazy dog"] {
            let classification = classifier.classify(message);
            assert!(classification.is_unknown(), "message `{message}`");
            assert!(classification.captures.is_empty());
        }
    }

    #[test]
    fn priority_beats_declaration_order() {
        // "rating" (carrier score) and "anomalies" both match; anomaly detection ranks higher.
        let classification = classifier().classify("show anomalies in the carrier rating data");
        assert_eq!(classification.intent, Intent::AnomalyDetection);

        let reordered: Vec<PatternGroup> = PATTERN_GROUPS.iter().rev().copied().collect();
        let reversed = IntentClassifier::with_groups(&reordered).expect("patterns compile");
        assert_eq!(
            reversed.classify("show anomalies in the carrier rating data").intent,
            Intent::AnomalyDetection
        );
    }

    #[test]
    fn custom_groups_compete_by_priority() {
        const LOW: &[PatternRule] = &[PatternRule { name: "slot_word", pattern: r"\bslot\b" }];
        const HIGH: &[PatternRule] = &[PatternRule { name: "gate_word", pattern: r"\bgate\b" }];
        let classifier = IntentClassifier::with_groups(&[
            PatternGroup { intent: Intent::SlotAvailability, priority: 1, triggers: LOW, captures: &[] },
            PatternGroup { intent: Intent::PassageHistory, priority: 2, triggers: HIGH, captures: &[] },
        ])
        .expect("patterns compile");

        let classification = classifier.classify("slot at gate 3");
        assert_eq!(classification.intent, Intent::PassageHistory);
        assert_eq!(classification.matched_rules, vec!["gate_word"]);
    }

    #[test]
    fn captures_are_collected_for_the_winning_group() {
        let classifier = classifier();

        let score = classifier.classify("reliability score for carrier 123");
        assert_eq!(score.intent, Intent::CarrierScore);
        assert_eq!(score.first_capture(EntityKey::CarrierId), Some("123"));

        let status = classifier.classify("status of REF123 and BK-20001 and REF123");
        assert_eq!(status.intent, Intent::BookingStatus);
        assert_eq!(
            status.captures.get(&EntityKey::BookingRef),
            Some(&vec!["REF123".to_owned(), "BK-20001".to_owned()])
        );

        let stress = classifier.classify("stress index for terminal c gate 2");
        assert_eq!(stress.intent, Intent::AnalyticsStressIndex);
        assert_eq!(stress.first_capture(EntityKey::Terminal), Some("c"));
        assert_eq!(stress.first_capture(EntityKey::Gate), Some("2"));

        let slots = classifier.classify("free slots at terminal b gate 4");
        assert_eq!(slots.first_capture(EntityKey::Terminal), Some("b"));
        assert_eq!(slots.first_capture(EntityKey::Gate), Some("4"));
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = classifier();
        let message = "Recommend the best slot at terminal A gate 2 for carrier 77";
        let first = classifier.classify(message);
        for _ in 0..5 {
            assert_eq!(classifier.classify(message), first);
        }
    }

    #[test]
    fn follow_ups_reuse_the_latest_specific_intent() {
        let classifier = classifier();
        let history = [Intent::SlotAvailability, Intent::CarrierScore, Intent::Smalltalk];

        let short = classifier.classify_with_history("and terminal B?", &history);
        assert_eq!(short.intent, Intent::CarrierScore);
        assert_eq!(short.matched_rules, vec!["follow_up"]);

        let keyword = classifier
            .classify_with_history("could you do the same thing again for me please", &history);
        assert_eq!(keyword.intent, Intent::CarrierScore);

        let long = classifier.classify_with_history(
            "could you look into the matter we discussed at length earlier",
            &history,
        );
        assert_eq!(long.intent, Intent::Unknown);

        let generic_only = classifier.classify_with_history("and B?", &[Intent::Help]);
        assert_eq!(generic_only.intent, Intent::Unknown);
    }
}
