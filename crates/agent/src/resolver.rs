//! Typed entity extraction for a classified message.
//!
//! Each intent declares the entities it expects and accepts. Fragments the
//! classifier already captured are normalized first; anything else is pulled
//! from the message by the supplementary extractors below.

use chrono::{Duration, NaiveDate, NaiveTime};
use regex::{Captures, Regex};

use portgate_core::domain::entity::{EntityKey, EntityMap, EntityValue};
use portgate_core::domain::intent::Intent;
use portgate_core::errors::DomainError;

use crate::classifier::{compile, Classification};
use crate::error::AgentError;

const BOOKING_REF_PREFIXES: [&str; 3] = ["REF", "BK", "BOOK"];
const MAX_CARRIER_ID_DIGITS: usize = 10;
const MAX_PLATE_CHARS: usize = 12;
/// Characters that mark a number as part of a date or clock time.
const NUMBER_CONTINUATIONS: [char; 3] = ['-', '/', ':'];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntitySet {
    pub expected: &'static [EntityKey],
    pub optional: &'static [EntityKey],
}

impl EntitySet {
    const NONE: EntitySet = EntitySet { expected: &[], optional: &[] };

    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.expected.iter().chain(self.optional).copied()
    }
}

pub fn entity_set(intent: Intent) -> EntitySet {
    use EntityKey::{BookingRef, CarrierId, Date, Gate, Plate, Terminal, Time};

    match intent {
        Intent::BookingStatus => EntitySet { expected: &[BookingRef], optional: &[Date] },
        Intent::CarrierScore => EntitySet { expected: &[CarrierId], optional: &[] },
        Intent::SlotAvailability => EntitySet { expected: &[Terminal, Date], optional: &[Gate] },
        Intent::SlotRecommendation => EntitySet {
            expected: &[Terminal, Date],
            optional: &[Gate, CarrierId, Time],
        },
        Intent::DriverNoshowRisk => EntitySet { expected: &[], optional: &[CarrierId, BookingRef] },
        Intent::PassageHistory => {
            EntitySet { expected: &[Date], optional: &[Terminal, Gate, Plate] }
        }
        Intent::TrafficForecast => EntitySet { expected: &[Date], optional: &[Terminal] },
        Intent::AnomalyDetection => {
            EntitySet { expected: &[], optional: &[Date, Terminal, CarrierId] }
        }
        Intent::BlockchainAudit => EntitySet { expected: &[BookingRef], optional: &[] },
        Intent::AnalyticsStressIndex => {
            EntitySet { expected: &[Terminal], optional: &[Date, Gate] }
        }
        Intent::AnalyticsAlerts => EntitySet { expected: &[Terminal], optional: &[Date] },
        Intent::Help | Intent::Smalltalk | Intent::Unknown => EntitySet::NONE,
    }
}

/// Intents that read "today" when no date was stated.
pub fn defaults_to_today(intent: Intent) -> bool {
    matches!(
        intent,
        Intent::SlotAvailability
            | Intent::SlotRecommendation
            | Intent::TrafficForecast
            | Intent::PassageHistory
            | Intent::AnalyticsStressIndex
            | Intent::AnalyticsAlerts
    )
}

pub struct EntityResolver {
    booking_refs: Vec<Regex>,
    carrier_ids: Vec<Regex>,
    terminal: Regex,
    gates: Vec<Regex>,
    today: Regex,
    tomorrow: Regex,
    yesterday: Regex,
    iso_date: Regex,
    day_first_date: Regex,
    clock_time: Regex,
    meridiem_time: Regex,
    hour_time: Regex,
    plate: Regex,
}

impl EntityResolver {
    pub fn new() -> Result<Self, AgentError> {
        Ok(Self {
            booking_refs: vec![
                compile(r"\b(REF)[-\s]?(\d{3,})\b")?,
                compile(r"\b(BK|BOOK|booking|réservation)[-\s]?(\d{4,})\b")?,
                compile(r"\b(booking|reference|réservation|référence)\s+(\d{5,})\b")?,
            ],
            carrier_ids: vec![
                compile(
                    r"\b(?:carrier|transporteur|chauffeur|driver|company|société|entreprise)\s+(?:id\s+)?(\d+)",
                )?,
                compile(r"\bID\s+(\d+)")?,
                compile(r"\b(?:for|rate|score|pour|noter)\s+(\d{2,})")?,
            ],
            terminal: compile(r"\b(?:au\s+)?terminale?\s+([a-z])\b")?,
            gates: vec![
                compile(r"\bgate\s+([a-z]?\d+)\b")?,
                compile(r"\bporte\s+(\d+)\b")?,
                compile_exact(r"\bG(\d+)\b")?,
            ],
            today: compile(r"\b(today|now|current|aujourd['’]hui|maintenant)\b")?,
            tomorrow: compile(r"\b(tomorrow|next day|demain|lendemain)\b")?,
            yesterday: compile(r"\b(yesterday|last day|hier)\b")?,
            iso_date: compile(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b")?,
            day_first_date: compile(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b")?,
            clock_time: compile(r"\b(\d{1,2}):(\d{2})(?::\d{2})?\b")?,
            meridiem_time: compile(r"\b(\d{1,2})\s*(am|pm)\b")?,
            hour_time: compile(r"\b(\d{1,2})h(\d{2})?\b")?,
            plate: compile_exact(r"\b([A-Z]{1,3}[-\s]?\d{3,4}[-\s]?[A-Z]{0,3})\b")?,
        })
    }

    /// Resolves the entity set of the classified intent. `today` anchors
    /// relative dates so identical inputs always resolve identically.
    pub fn resolve(
        &self,
        message: &str,
        classification: &Classification,
        today: NaiveDate,
    ) -> EntityMap {
        let intent = classification.intent;
        let mut entities = EntityMap::new();

        for key in entity_set(intent).keys() {
            if let Some(value) = self.resolve_key(key, message, classification, today) {
                entities.insert(key, value);
            }
        }

        if defaults_to_today(intent) && !entities.contains(EntityKey::Date) {
            entities.insert(EntityKey::Date, EntityValue::Date(today));
        }
        entities
    }

    fn resolve_key(
        &self,
        key: EntityKey,
        message: &str,
        classification: &Classification,
        today: NaiveDate,
    ) -> Option<EntityValue> {
        let captured = classification.captures.get(&key).filter(|values| !values.is_empty());
        match key {
            EntityKey::BookingRef => {
                let references = match captured {
                    Some(values) => dedup(values.iter().filter_map(|raw| normalize_booking_ref(raw))),
                    None => self.booking_refs(message),
                };
                match references.len() {
                    0 => None,
                    1 => references.into_iter().next().map(EntityValue::Text),
                    _ => Some(EntityValue::List(references)),
                }
            }
            EntityKey::CarrierId => captured
                .and_then(|values| values.iter().find(|raw| is_carrier_id(raw)).cloned())
                .or_else(|| self.carrier_id(message))
                .map(EntityValue::Text),
            EntityKey::Terminal => captured
                .and_then(|values| values.first())
                .map(|raw| raw.to_uppercase())
                .or_else(|| self.terminal(message))
                .map(EntityValue::Text),
            EntityKey::Gate => captured
                .and_then(|values| values.first())
                .and_then(|raw| normalize_gate(raw))
                .or_else(|| self.gate(message))
                .map(EntityValue::Text),
            EntityKey::Date => self.date(message, today).map(EntityValue::Date),
            EntityKey::Time => self.time(message).map(EntityValue::Time),
            EntityKey::Plate => self.plate(message).map(EntityValue::Text),
        }
    }

    pub fn booking_refs(&self, message: &str) -> Vec<String> {
        dedup(self.booking_refs.iter().flat_map(|regex| {
            regex.captures_iter(message).filter_map(|found| {
                let prefix = found.get(1)?.as_str();
                let digits = found.get(2)?.as_str();
                Some(format!("{}{digits}", canonical_prefix(prefix)))
            })
        }))
    }

    pub fn carrier_id(&self, message: &str) -> Option<String> {
        self.carrier_ids.iter().find_map(|regex| {
            regex.captures_iter(message).find_map(|found| {
                let digits = found.get(1)?;
                let next = message[digits.end()..].chars().next();
                if next.is_some_and(|ch| NUMBER_CONTINUATIONS.contains(&ch)) {
                    return None;
                }
                Some(digits.as_str().to_owned()).filter(|id| is_carrier_id(id))
            })
        })
    }

    pub fn terminal(&self, message: &str) -> Option<String> {
        self.terminal.captures(message).and_then(|found| found.get(1)).map(|code| code.as_str().to_uppercase())
    }

    pub fn gate(&self, message: &str) -> Option<String> {
        self.gates.iter().find_map(|regex| {
            regex.captures(message).and_then(|found| found.get(1)).and_then(|raw| normalize_gate(raw.as_str()))
        })
    }

    /// Explicit dates win over relative keywords; among keywords today wins
    /// over tomorrow, which wins over yesterday.
    pub fn date(&self, message: &str, today: NaiveDate) -> Option<NaiveDate> {
        let explicit = self
            .iso_date
            .captures_iter(message)
            .find_map(|found| ymd(&found, 1, 2, 3))
            .or_else(|| self.day_first_date.captures_iter(message).find_map(|found| ymd(&found, 3, 2, 1)));
        if explicit.is_some() {
            return explicit;
        }
        if self.today.is_match(message) {
            return Some(today);
        }
        if self.tomorrow.is_match(message) {
            return today.checked_add_signed(Duration::days(1));
        }
        if self.yesterday.is_match(message) {
            return today.checked_sub_signed(Duration::days(1));
        }
        None
    }

    pub fn time(&self, message: &str) -> Option<NaiveTime> {
        let clock = self.clock_time.captures_iter(message).find_map(|found| {
            NaiveTime::from_hms_opt(number(&found, 1)?, number(&found, 2)?, 0)
        });
        let meridiem = || {
            self.meridiem_time.captures_iter(message).find_map(|found| {
                let hour = number(&found, 1)?;
                if !(1..=12).contains(&hour) {
                    return None;
                }
                let afternoon = found.get(2)?.as_str().eq_ignore_ascii_case("pm");
                let hour = match (hour, afternoon) {
                    (12, false) => 0,
                    (12, true) => 12,
                    (hour, true) => hour + 12,
                    (hour, false) => hour,
                };
                NaiveTime::from_hms_opt(hour, 0, 0)
            })
        };
        let hour_mark = || {
            self.hour_time.captures_iter(message).find_map(|found| {
                let minute = found.get(2).map_or(Some(0), |raw| raw.as_str().parse().ok())?;
                NaiveTime::from_hms_opt(number(&found, 1)?, minute, 0)
            })
        };
        clock.or_else(meridiem).or_else(hour_mark)
    }

    /// Licence plates mix letters and digits; booking references and gate
    /// codes share the shape and are skipped.
    pub fn plate(&self, message: &str) -> Option<String> {
        self.plate.captures_iter(message).find_map(|found| {
            let plate = found.get(1)?.as_str().trim();
            let compact: String = plate.chars().filter(|ch| !matches!(ch, '-' | ' ')).collect();
            let has_letter = compact.chars().any(|ch| ch.is_ascii_alphabetic());
            let has_digit = compact.chars().any(|ch| ch.is_ascii_digit());
            let booking_like = BOOKING_REF_PREFIXES.iter().any(|prefix| compact.starts_with(prefix));
            let gate_like = compact.starts_with('G') && compact[1..].chars().all(|ch| ch.is_ascii_digit());
            (has_letter && has_digit && !booking_like && !gate_like).then(|| plate.to_owned())
        })
    }
}

fn compile_exact(pattern: &'static str) -> Result<Regex, AgentError> {
    Regex::new(pattern).map_err(|source| AgentError::Pattern { pattern, source })
}

fn number(found: &Captures<'_>, index: usize) -> Option<u32> {
    found.get(index)?.as_str().parse().ok()
}

fn ymd(found: &Captures<'_>, year: usize, month: usize, day: usize) -> Option<NaiveDate> {
    let year = found.get(year)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, number(found, month)?, number(found, day)?)
}

fn canonical_prefix(prefix: &str) -> &'static str {
    let upper = prefix.to_uppercase();
    BOOKING_REF_PREFIXES.iter().copied().find(|known| *known == upper).unwrap_or("REF")
}

/// `REF-123`, `bk 20001` and `booking 12345` become `REF123`, `BK20001` and
/// `REF12345`.
pub fn normalize_booking_ref(raw: &str) -> Option<String> {
    let prefix: String = raw.chars().take_while(|ch| ch.is_alphabetic()).collect();
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("{}{digits}", canonical_prefix(&prefix)))
}

/// Gates keep their digits only: `gate 3`, `porte 3`, `A3` and `G3` all
/// become `G3`.
pub fn normalize_gate(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (!digits.is_empty()).then(|| format!("G{digits}"))
}

/// Runs caller-supplied entities through the same normalizers as extracted
/// ones. Anything a normalizer cannot read is rejected rather than passed on.
pub fn normalize_supplied(entities: &EntityMap) -> Result<EntityMap, DomainError> {
    let mut normalized = EntityMap::new();
    for key in entities.keys() {
        let Some(value) = entities.get(key) else { continue };
        let value = match (key, value) {
            (EntityKey::Date, EntityValue::Date(_)) | (EntityKey::Time, EntityValue::Time(_)) => {
                value.clone()
            }
            (EntityKey::BookingRef, EntityValue::List(references)) => EntityValue::List(dedup(
                references
                    .iter()
                    .map(|raw| supplied_booking_ref(raw))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter(),
            )),
            (key, EntityValue::Text(raw)) => EntityValue::Text(supplied_text(key, raw.trim())?),
            (key, _) => return Err(malformed(key, "has the wrong shape".to_owned())),
        };
        normalized.insert(key, value);
    }
    Ok(normalized)
}

fn supplied_text(key: EntityKey, raw: &str) -> Result<String, DomainError> {
    let accepted = match key {
        EntityKey::BookingRef => return supplied_booking_ref(raw),
        EntityKey::CarrierId => Some(raw.to_owned()).filter(|id| is_carrier_id(id)),
        EntityKey::Terminal => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(code), None) if code.is_ascii_alphabetic() => {
                    Some(code.to_ascii_uppercase().to_string())
                }
                _ => None,
            }
        }
        EntityKey::Gate => Some(raw).filter(|gate| is_plain(gate)).and_then(normalize_gate),
        EntityKey::Plate => Some(raw.to_uppercase())
            .filter(|plate| plate.chars().count() <= MAX_PLATE_CHARS && is_plain(plate)),
        EntityKey::Date | EntityKey::Time => None,
    };
    accepted.ok_or_else(|| malformed(key, format!("`{raw}` is not a valid {key}")))
}

fn supplied_booking_ref(raw: &str) -> Result<String, DomainError> {
    let raw = raw.trim();
    Some(raw)
        .filter(|reference| is_plain(reference))
        .and_then(normalize_booking_ref)
        .ok_or_else(|| malformed(EntityKey::BookingRef, format!("`{raw}` is not a booking reference")))
}

/// Letters, digits, spaces and dashes only.
fn is_plain(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | ' '))
}

fn malformed(key: EntityKey, detail: String) -> DomainError {
    DomainError::MalformedEntity { field: key.as_str(), detail }
}

fn is_carrier_id(raw: &str) -> bool {
    !raw.is_empty() && raw.len() <= MAX_CARRIER_ID_DIGITS && raw.chars().all(|ch| ch.is_ascii_digit())
}

fn dedup(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use portgate_core::domain::entity::{EntityKey, EntityMap, EntityValue};
    use portgate_core::domain::intent::Intent;
    use portgate_core::errors::DomainError;

    use super::{entity_set, normalize_booking_ref, normalize_gate, normalize_supplied, EntityResolver};
    use crate::classifier::IntentClassifier;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    fn resolver() -> EntityResolver {
        EntityResolver::new().expect("extraction patterns compile")
    }

    fn resolve(message: &str) -> (Intent, EntityMap) {
        let classification =
            IntentClassifier::new().expect("patterns compile").classify(message);
        let entities = resolver().resolve(message, &classification, today());
        (classification.intent, entities)
    }

    #[test]
    fn booking_references_are_normalized_and_deduplicated() {
        let resolver = resolver();
        struct Case {
            message: &'static str,
            expected: &'static [&'static str],
        }
        for case in [
            Case { message: "status of ref-123", expected: &["REF123"] },
            Case { message: "where is BK 20001 and REF123 and ref123", expected: &["REF123", "BK20001"] },
            Case { message: "réservation 12345 please", expected: &["REF12345"] },
            Case { message: "booking 98765", expected: &["REF98765"] },
            Case { message: "nothing here", expected: &[] },
        ] {
            assert_eq!(resolver.booking_refs(case.message), case.expected, "`{}`", case.message);
        }
    }

    #[test]
    fn multiple_references_resolve_to_a_list() {
        let (intent, entities) = resolve("status of REF123 and BK20001");
        assert_eq!(intent, Intent::BookingStatus);
        assert_eq!(
            entities.get(EntityKey::BookingRef),
            Some(&EntityValue::List(vec!["REF123".to_owned(), "BK20001".to_owned()]))
        );
    }

    #[test]
    fn carrier_ids_skip_dates_and_times() {
        let resolver = resolver();
        assert_eq!(resolver.carrier_id("score for carrier 123"), Some("123".to_owned()));
        assert_eq!(resolver.carrier_id("transporteur id 42 fiabilité"), Some("42".to_owned()));
        assert_eq!(resolver.carrier_id("show ID 77"), Some("77".to_owned()));
        assert_eq!(resolver.carrier_id("best slot for 2026-03-02"), None);
        assert_eq!(resolver.carrier_id("best slot for 14:30"), None);
        assert_eq!(resolver.carrier_id("carrier 12345678901"), None);
    }

    #[test]
    fn terminal_and_gate_are_normalized() {
        let resolver = resolver();
        assert_eq!(resolver.terminal("slots at terminal b"), Some("B".to_owned()));
        assert_eq!(resolver.terminal("au terminal C demain"), Some("C".to_owned()));
        assert_eq!(resolver.gate("check gate 3"), Some("G3".to_owned()));
        assert_eq!(resolver.gate("Porte 12 status"), Some("G12".to_owned()));
        assert_eq!(resolver.gate("At G5"), Some("G5".to_owned()));
        assert_eq!(normalize_gate("A3"), Some("G3".to_owned()));
        assert_eq!(normalize_booking_ref("bk-20001"), Some("BK20001".to_owned()));
    }

    #[test]
    fn dates_prefer_explicit_then_relative_keywords() {
        let resolver = resolver();
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        assert_eq!(resolver.date("slots on 2026-03-10 tomorrow", today()), date(2026, 3, 10));
        assert_eq!(resolver.date("slots on 2026/03/11", today()), date(2026, 3, 11));
        assert_eq!(resolver.date("créneaux le 12/03/2026", today()), date(2026, 3, 12));
        assert_eq!(resolver.date("today or tomorrow", today()), Some(today()));
        assert_eq!(resolver.date("demain", today()), date(2026, 3, 3));
        assert_eq!(resolver.date("hier", today()), date(2026, 3, 1));
        assert_eq!(resolver.date("on 2026-02-30 please", today()), None);
        assert_eq!(resolver.date("no date", today()), None);
    }

    #[test]
    fn times_accept_clock_meridiem_and_hour_marks() {
        let resolver = resolver();
        let time = |h, m| NaiveTime::from_hms_opt(h, m, 0);
        assert_eq!(resolver.time("book at 14:30"), time(14, 30));
        assert_eq!(resolver.time("slot at 9am tomorrow"), time(9, 0));
        assert_eq!(resolver.time("around 2 pm"), time(14, 0));
        assert_eq!(resolver.time("vers 14h30"), time(14, 30));
        assert_eq!(resolver.time("à 8h"), time(8, 0));
        assert_eq!(resolver.time("at 25:00"), None);
        assert_eq!(resolver.time("no time"), None);
    }

    #[test]
    fn plates_exclude_booking_refs_and_gates() {
        let resolver = resolver();
        assert_eq!(resolver.plate("truck AB-123-CD at G5"), Some("AB-123-CD".to_owned()));
        assert_eq!(resolver.plate("REF123 at G5"), None);
    }

    #[test]
    fn only_the_intent_entity_set_is_resolved() {
        let (intent, entities) = resolve("What's the reliability score for carrier 123 at terminal A?");
        assert_eq!(intent, Intent::CarrierScore);
        assert_eq!(entities.text(EntityKey::CarrierId), Some("123"));
        assert!(!entities.contains(EntityKey::Terminal));
        assert!(!entities.contains(EntityKey::Date));

        let (intent, entities) = resolve("Hello, gate 3 tomorrow");
        assert_eq!(intent, Intent::Help);
        assert!(entities.is_empty());
    }

    #[test]
    fn date_defaults_to_today_where_the_intent_needs_one() {
        let (intent, entities) = resolve("Recommend a slot for terminal B at 9am");
        assert_eq!(intent, Intent::SlotRecommendation);
        assert_eq!(entities.text(EntityKey::Terminal), Some("B"));
        assert_eq!(entities.date(), Some(today()));
        assert_eq!(entities.time(), NaiveTime::from_hms_opt(9, 0, 0));

        let (intent, entities) = resolve("What's the status of REF123?");
        assert_eq!(intent, Intent::BookingStatus);
        assert_eq!(entities.date(), None);
        assert_eq!(entity_set(intent).expected, &[EntityKey::BookingRef]);
    }

    #[test]
    fn resolution_is_idempotent() {
        let classifier = IntentClassifier::new().expect("patterns compile");
        let resolver = resolver();
        for message in [
            "Show me available slots for terminal A tomorrow gate 2",
            "status of REF123 and BK20001",
            "Quelle est la fiabilité du transporteur 456?",
            "Recommend the best slot at terminal C on 2026-03-05 at 14:30 for carrier 88",
        ] {
            let classification = classifier.classify(message);
            let first = resolver.resolve(message, &classification, today());
            let second = resolver.resolve(message, &classification, today());
            assert_eq!(first, second, "`{message}`");
        }
    }

    #[test]
    fn supplied_entities_are_normalized() {
        let supplied: EntityMap = serde_json::from_str(
            r#"{"booking_ref": ["ref-123", "REF123", "bk 20001"], "carrier_id": " 123 ",
                "terminal": "a", "gate": "gate 2", "plate": "ab-123-cd", "date": "2026-03-03"}"#,
        )
        .expect("entities parse");

        let normalized = normalize_supplied(&supplied).expect("all entities are valid");

        assert_eq!(
            normalized.get(EntityKey::BookingRef),
            Some(&EntityValue::List(vec!["REF123".to_owned(), "BK20001".to_owned()]))
        );
        assert_eq!(normalized.text(EntityKey::CarrierId), Some("123"));
        assert_eq!(normalized.text(EntityKey::Terminal), Some("A"));
        assert_eq!(normalized.text(EntityKey::Gate), Some("G2"));
        assert_eq!(normalized.text(EntityKey::Plate), Some("AB-123-CD"));
        assert_eq!(normalized.date(), NaiveDate::from_ymd_opt(2026, 3, 3));
    }

    #[test]
    fn supplied_entities_that_no_normalizer_reads_are_rejected() {
        struct Case {
            key: EntityKey,
            raw: &'static str,
        }

        let cases = [
            Case { key: EntityKey::CarrierId, raw: "../admin" },
            Case { key: EntityKey::CarrierId, raw: "123/stats" },
            Case { key: EntityKey::CarrierId, raw: "12345678901" },
            Case { key: EntityKey::BookingRef, raw: "../x" },
            Case { key: EntityKey::BookingRef, raw: "REF1/../../admin" },
            Case { key: EntityKey::BookingRef, raw: "REF?id=1" },
            Case { key: EntityKey::Terminal, raw: "A/B" },
            Case { key: EntityKey::Terminal, raw: "AB" },
            Case { key: EntityKey::Gate, raw: "G1%2F" },
            Case { key: EntityKey::Plate, raw: "AB-123-CD-EF-GH" },
        ];

        for case in cases {
            let supplied = EntityMap::new().with_text(case.key, case.raw);
            let error = normalize_supplied(&supplied).expect_err("entity should be rejected");
            assert!(
                matches!(error, DomainError::MalformedEntity { field, .. } if field == case.key.as_str()),
                "{} `{}`",
                case.key,
                case.raw
            );
        }
    }
}
