//! Measurement attestation
//!
//! Each stored measurement is reduced to the ledger's fixed-point record,
//! digested with SHA-256 and optionally signed with HMAC-SHA256. The local
//! journal keeps receipts so the sync cadence can report them.

use std::collections::VecDeque;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use shared::Measurement;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Fixed-point ledger record. Values carrying decimals are scaled by 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRecord {
    pub location: String,
    pub timestamp: i64,
    pub temperature: Option<i64>,
    pub humidity: Option<i64>,
    pub pressure: Option<i64>,
    pub wind_speed: Option<i64>,
    pub precipitation: Option<i64>,
    pub weather_type: String,
}

impl From<&Measurement> for LedgerRecord {
    fn from(m: &Measurement) -> Self {
        let scaled = |v: Option<f64>| v.map(|v| (v * 100.0) as i64);
        let whole = |v: Option<f64>| v.map(|v| v as i64);

        Self {
            location: m.location.clone(),
            timestamp: m.timestamp.timestamp(),
            temperature: scaled(m.temperature),
            humidity: whole(m.humidity),
            pressure: whole(m.pressure),
            wind_speed: scaled(m.wind_speed),
            precipitation: scaled(m.precipitation),
            weather_type: m.weather_type.as_str().to_string(),
        }
    }
}

/// Proof that a measurement was submitted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttestationReceipt {
    pub id: Uuid,
    pub location: String,
    /// Base64 SHA-256 of the ledger record
    pub digest: String,
    /// Base64 HMAC-SHA256 of the digest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[async_trait]
pub trait AttestationSink: Send + Sync {
    async fn submit(&self, measurement: &Measurement) -> AppResult<AttestationReceipt>;

    /// Newest receipts first
    async fn recent(&self, limit: usize) -> AppResult<Vec<AttestationReceipt>>;
}

/// Digest of a ledger record
pub fn digest(record: &LedgerRecord) -> AppResult<String> {
    let bytes = serde_json::to_vec(record)
        .map_err(|e| AppError::Attestation(format!("Failed to encode record: {}", e)))?;
    Ok(BASE64.encode(Sha256::digest(&bytes)))
}

/// Sign a digest with the configured key
pub fn sign(key: &[u8], digest: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| AppError::Attestation("Failed to create HMAC".to_string()))?;
    mac.update(digest.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Bounded in-process journal of receipts
pub struct LocalAttestationJournal {
    signing_key: Option<Vec<u8>>,
    capacity: usize,
    receipts: Mutex<VecDeque<AttestationReceipt>>,
}

impl LocalAttestationJournal {
    pub fn new(signing_key: Option<String>, capacity: usize) -> Self {
        Self {
            signing_key: signing_key
                .filter(|key| !key.is_empty())
                .map(String::into_bytes),
            capacity: capacity.max(1),
            receipts: Mutex::new(VecDeque::new()),
        }
    }
}

#[async_trait]
impl AttestationSink for LocalAttestationJournal {
    async fn submit(&self, measurement: &Measurement) -> AppResult<AttestationReceipt> {
        let record = LedgerRecord::from(measurement);
        let digest = digest(&record)?;
        let signature = match &self.signing_key {
            Some(key) => Some(sign(key, &digest)?),
            None => None,
        };

        let receipt = AttestationReceipt {
            id: Uuid::new_v4(),
            location: record.location,
            digest,
            signature,
            submitted_at: Utc::now(),
        };

        let mut receipts = self.receipts.lock().await;
        receipts.push_back(receipt.clone());
        while receipts.len() > self.capacity {
            receipts.pop_front();
        }

        Ok(receipt)
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<AttestationReceipt>> {
        let receipts = self.receipts.lock().await;
        Ok(receipts.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared::Field;

    fn reading() -> Measurement {
        Measurement::new("Atlanta, US", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
            .with_value(Field::Temperature, 23.456)
            .with_value(Field::Humidity, 64.9)
            .with_value(Field::Pressure, 1013.7)
            .with_value(Field::WindSpeed, 12.5)
            .with_value(Field::Precipitation, 0.5)
    }

    #[test]
    fn test_fixed_point_encoding() {
        let record = LedgerRecord::from(&reading());
        assert_eq!(record.temperature, Some(2345));
        assert_eq!(record.humidity, Some(64));
        assert_eq!(record.pressure, Some(1013));
        assert_eq!(record.wind_speed, Some(1250));
        assert_eq!(record.precipitation, Some(50));
        assert_eq!(record.weather_type, "unknown");
    }

    #[test]
    fn test_digest_is_deterministic() {
        let record = LedgerRecord::from(&reading());
        assert_eq!(digest(&record).unwrap(), digest(&record.clone()).unwrap());

        let mut other = record.clone();
        other.temperature = Some(2346);
        assert_ne!(digest(&record).unwrap(), digest(&other).unwrap());
    }

    #[tokio::test]
    async fn test_journal_signs_and_bounds() {
        let journal = LocalAttestationJournal::new(Some("secret".to_string()), 2);
        for _ in 0..3 {
            journal.submit(&reading()).await.unwrap();
        }

        let recent = journal.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        let receipt = &recent[0];
        assert_eq!(
            receipt.signature.as_deref(),
            Some(sign(b"secret", &receipt.digest).unwrap().as_str())
        );
    }

    #[tokio::test]
    async fn test_unsigned_without_key() {
        let journal = LocalAttestationJournal::new(None, 10);
        let receipt = journal.submit(&reading()).await.unwrap();
        assert!(receipt.signature.is_none());
        assert_eq!(receipt.location, "Atlanta, US");
    }
}
