//! Fingerprint set document for upload
//!
//! The document is a top-level JSON array. Each record carries the
//! fingerprint id, its geographic position and its level histogram keyed by
//! access point and then by level (as a string).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::core::{Fingerprint, GeoPoint, GeoReference};
use crate::processing::histogram::SignalHistogram;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// One fingerprint as it appears in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub id: String,
    pub point: GeoPoint,
    pub histogram: BTreeMap<String, BTreeMap<i32, f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintDocument {
    pub records: Vec<FingerprintRecord>,
}

impl FingerprintDocument {
    pub fn from_fingerprints(fingerprints: &[Fingerprint], reference: &GeoReference) -> Self {
        let records = fingerprints
            .iter()
            .map(|fp| FingerprintRecord {
                id: fp.id.clone(),
                point: reference.to_geographic(&fp.position),
                histogram: fp.histogram.distributions().clone(),
            })
            .collect();
        Self { records }
    }

    /// Convert back to map coordinates
    pub fn to_fingerprints(&self, reference: &GeoReference) -> Vec<Fingerprint> {
        self.records
            .iter()
            .map(|record| Fingerprint {
                id: record.id.clone(),
                position: reference.to_local(&record.point),
                histogram: SignalHistogram::from_distributions(record.id.clone(), record.histogram.clone()),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json(&self) -> ExportResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> ExportResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ExportResult<()> {
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        log::info!(
            "Wrote {} fingerprints to {}",
            self.records.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ExportResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Point2D, RssiSample};
    use crate::processing::histogram::HistogramBuilder;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    fn reference() -> GeoReference {
        GeoReference::new(
            GeoPoint {
                latitude: 60.1699,
                longitude: 24.9384,
            },
            1.0,
        )
    }

    fn fingerprints() -> Vec<Fingerprint> {
        let mut builder = HistogramBuilder::new();
        builder.add_samples([
            RssiSample::new("ap", -50, 1),
            RssiSample::new("ap", -50, 2),
            RssiSample::new("ap", -60, 3),
        ]);
        vec![Fingerprint {
            id: "fp-1".to_string(),
            position: Point2D::new(12.0, -4.0),
            histogram: builder.build("fp-1", 0, 10),
        }]
    }

    #[test]
    fn test_document_shape() {
        let doc = FingerprintDocument::from_fingerprints(&fingerprints(), &reference());
        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

        let record = &value[0];
        assert_eq!(record["id"], "fp-1");
        assert!(record["point"]["latitude"].is_f64());
        assert!(record["point"]["longitude"].is_f64());
        let fraction = record["histogram"]["ap"]["-50"].as_f64().unwrap();
        assert_abs_diff_eq!(fraction, 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parse_restores_map_positions() {
        let doc = FingerprintDocument::from_fingerprints(&fingerprints(), &reference());
        let parsed = FingerprintDocument::from_json(&doc.to_json().unwrap()).unwrap();
        let restored = parsed.to_fingerprints(&reference());

        assert_eq!(restored.len(), 1);
        assert_abs_diff_eq!(restored[0].position.x, 12.0, epsilon = 1e-6);
        assert_abs_diff_eq!(restored[0].position.y, -4.0, epsilon = 1e-6);
        let levels = restored[0].histogram.distribution("ap").unwrap();
        assert_eq!(levels.len(), 2);
        assert_abs_diff_eq!(levels[&-60], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parse_literal_document() {
        let json = r#"[{"id":"a","point":{"latitude":1.0,"longitude":2.0},"histogram":{"x":{"-70":0.25,"-71":0.75}}}]"#;
        let doc = FingerprintDocument::from_json(json).unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.records[0].histogram["x"][&-71], 0.75);
    }

    #[test]
    fn test_file_round_trip_and_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fingerprints.json");
        let doc = FingerprintDocument::from_fingerprints(&fingerprints(), &reference());
        doc.save_to_file(&path).unwrap();
        let loaded = FingerprintDocument::load_from_file(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.records[0].id, "fp-1");
        assert_abs_diff_eq!(
            loaded.records[0].point.latitude,
            doc.records[0].point.latitude,
            epsilon = 1e-12
        );
        assert_eq!(loaded.records[0].histogram["ap"].len(), 2);

        assert!(matches!(
            FingerprintDocument::load_from_file(dir.path().join("missing.json")),
            Err(ExportError::Io(_))
        ));
        assert!(matches!(FingerprintDocument::from_json("{}"), Err(ExportError::Json(_))));
    }
}
