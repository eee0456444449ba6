use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One entry of a booking's audit chain as stored by the ledger service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub booking_ref: String,
    pub sequence: u32,
    pub action: String,
    pub payload_hash: String,
    pub prev_hash: Option<String>,
    pub entry_hash: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub booking_ref: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl AuditFilter {
    pub fn for_booking(booking_ref: impl Into<String>) -> Self {
        Self { booking_ref: booking_ref.into(), limit: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub booking_ref: String,
    pub valid: bool,
    pub verified_entries: usize,
    pub latest_hash: Option<String>,
    pub failure_reason: Option<String>,
}

/// Appends records to a single booking's chain. Used by the in-memory ledger
/// and by fixtures; the production chain is written by the ledger service.
#[derive(Clone, Debug)]
pub struct LedgerChain {
    booking_ref: String,
    records: Vec<LedgerRecord>,
}

impl LedgerChain {
    pub fn new(booking_ref: impl Into<String>) -> Self {
        Self { booking_ref: booking_ref.into(), records: Vec::new() }
    }

    pub fn append(
        &mut self,
        action: impl Into<String>,
        payload: &[u8],
        recorded_at: DateTime<Utc>,
    ) -> LedgerRecord {
        let action = action.into();
        let sequence = u32::try_from(self.records.len()).unwrap_or(u32::MAX).saturating_add(1);
        let prev_hash = self.records.last().map(|record| record.entry_hash.clone());
        let payload_hash = sha256_hex(payload);
        let entry_hash = hash_entry_material(
            &self.booking_ref,
            sequence,
            &action,
            &payload_hash,
            prev_hash.as_deref(),
            recorded_at,
        );

        let record = LedgerRecord {
            booking_ref: self.booking_ref.clone(),
            sequence,
            action,
            payload_hash,
            prev_hash,
            entry_hash,
            recorded_at,
        };
        self.records.push(record.clone());
        record
    }

    pub fn records(&self) -> &[LedgerRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<LedgerRecord> {
        self.records
    }
}

/// Recomputes every entry hash and checks each link against its predecessor.
/// Records are expected in sequence order.
pub fn verify_chain(booking_ref: &str, records: &[LedgerRecord]) -> ChainVerification {
    let failure = |verified: usize, latest: Option<String>, reason: String| ChainVerification {
        booking_ref: booking_ref.to_owned(),
        valid: false,
        verified_entries: verified,
        latest_hash: latest,
        failure_reason: Some(reason),
    };

    if records.is_empty() {
        return failure(0, None, "no ledger entries found for booking".to_owned());
    }

    let mut previous_hash: Option<String> = None;
    for (index, record) in records.iter().enumerate() {
        if record.booking_ref != booking_ref {
            return failure(
                index,
                previous_hash,
                format!("foreign entry at sequence {}: {}", record.sequence, record.booking_ref),
            );
        }

        let expected_sequence = u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1);
        if record.sequence != expected_sequence {
            return failure(
                index,
                previous_hash,
                format!(
                    "sequence mismatch at entry {}: expected {}, found {}",
                    index + 1,
                    expected_sequence,
                    record.sequence
                ),
            );
        }

        if record.prev_hash != previous_hash {
            return failure(
                index,
                previous_hash,
                format!("previous hash mismatch at entry {}", record.sequence),
            );
        }

        let computed = hash_entry_material(
            &record.booking_ref,
            record.sequence,
            &record.action,
            &record.payload_hash,
            record.prev_hash.as_deref(),
            record.recorded_at,
        );
        if computed != record.entry_hash {
            return failure(
                index,
                previous_hash,
                format!("entry hash mismatch at entry {}", record.sequence),
            );
        }

        previous_hash = Some(record.entry_hash.clone());
    }

    ChainVerification {
        booking_ref: booking_ref.to_owned(),
        valid: true,
        verified_entries: records.len(),
        latest_hash: previous_hash,
        failure_reason: None,
    }
}

pub fn hash_entry_material(
    booking_ref: &str,
    sequence: u32,
    action: &str,
    payload_hash: &str,
    prev_hash: Option<&str>,
    recorded_at: DateTime<Utc>,
) -> String {
    let material = format!(
        "{}|{}|{}|{}|{}|{}",
        booking_ref,
        sequence,
        action,
        payload_hash,
        prev_hash.unwrap_or(""),
        recorded_at.to_rfc3339(),
    );
    sha256_hex(material.as_bytes())
}

pub fn sha256_hex(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    encode_hex(digest.as_slice())
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
