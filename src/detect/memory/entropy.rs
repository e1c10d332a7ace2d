//! Shannon-entropy analysis of memory content.
//!
//! Obfuscated payloads (encrypted blobs, packed code, dense encodings)
//! have markedly higher character-level entropy than prose.  Two signals:
//! absolute thresholds on each sufficiently long item, and a population
//! outlier check across all memory items.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::detect::{Detector, DetectorError};
use crate::finding::{Category, Finding, Severity, snippet};
use crate::session::Session;
use crate::session::content::resolve_content;

// ── EntropyConfig ──────────────────────────────────────────────────────

/// Thresholds for the entropy detector.
///
/// Defaults are tuned for English prose (~4.0–4.5 bits/char); Base64 and
/// ciphertext typically sit near 6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    /// Items shorter than this many characters are skipped by the
    /// threshold check; entropy of tiny strings is noise.
    pub min_length: usize,
    /// Entropy at or above this is a HIGH finding.
    pub high_threshold: f64,
    /// Entropy at or above this (but below `high_threshold`) is MEDIUM.
    pub medium_threshold: f64,
    /// Minimum number of memory items before the outlier check runs.
    pub min_population: usize,
    /// An item more than this many population standard deviations above
    /// the mean is an outlier.
    pub deviation_factor: f64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            min_length: 50,
            high_threshold: 5.5,
            medium_threshold: 4.5,
            min_population: 3,
            deviation_factor: 2.0,
        }
    }
}

impl EntropyConfig {
    /// Start from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum item length for the threshold check.
    #[must_use]
    pub fn min_length(mut self, chars: usize) -> Self {
        self.min_length = chars;
        self
    }

    /// Set the HIGH entropy threshold.
    #[must_use]
    pub fn high_threshold(mut self, bits: f64) -> Self {
        self.high_threshold = bits;
        self
    }

    /// Set the MEDIUM entropy threshold.
    #[must_use]
    pub fn medium_threshold(mut self, bits: f64) -> Self {
        self.medium_threshold = bits;
        self
    }

    /// Set the minimum population for the outlier check.
    #[must_use]
    pub fn min_population(mut self, items: usize) -> Self {
        self.min_population = items;
        self
    }

    /// Set the outlier deviation factor.
    #[must_use]
    pub fn deviation_factor(mut self, factor: f64) -> Self {
        self.deviation_factor = factor;
        self
    }
}

/// Shannon entropy of `text` in bits per character, over the character
/// frequency distribution.  Empty text has entropy 0.
#[must_use]
pub fn shannon_entropy(text: &str) -> f64 {
    let mut counts: std::collections::HashMap<char, usize> = std::collections::HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *counts.entry(c).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let total_f = total as f64;
    counts
        .values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / total_f;
            -p * p.log2()
        })
        .sum()
}

// ── EntropyDetector ────────────────────────────────────────────────────

/// Flags memory items with anomalously high character entropy.
pub struct EntropyDetector {
    config: EntropyConfig,
}

impl EntropyDetector {
    /// Detector identifier.
    pub const NAME: &'static str = "entropy_anomaly";

    /// Build with the given thresholds.  Infallible: no patterns compile.
    #[must_use]
    pub fn new(config: EntropyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Detector for EntropyDetector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn category(&self) -> Category {
        Category::MemoryPoisoning
    }

    async fn detect(&self, session: &Session) -> Result<Vec<Finding>, DetectorError> {
        let mut findings = Vec::new();

        let items: Vec<(String, f64)> = session
            .memory
            .iter()
            .map(|record| {
                let content = resolve_content(record);
                let entropy = shannon_entropy(&content);
                (content, entropy)
            })
            .collect();

        for (index, (content, entropy)) in items.iter().enumerate() {
            if content.chars().count() < self.config.min_length {
                continue;
            }
            let severity = if *entropy >= self.config.high_threshold {
                Some(Severity::High)
            } else if *entropy >= self.config.medium_threshold {
                Some(Severity::Medium)
            } else {
                None
            };
            if let Some(severity) = severity {
                findings.push(
                    Finding::new(Category::MemoryPoisoning, severity, "High-entropy memory entry")
                        .with_description(format!(
                            "Memory entry {index} has character entropy typical of \
                             encoded or encrypted content, not prose"
                        ))
                        .with_details(format!("entropy {entropy:.2} bits/char"))
                        .with_recommendation(
                            "Inspect the entry; memory should hold readable facts",
                        )
                        .with_evidence(json!({
                            "index": index,
                            "entropy": entropy,
                            "snippet": snippet(content),
                        })),
                );
            }
        }

        if items.len() >= self.config.min_population {
            #[allow(clippy::cast_precision_loss)]
            let n = items.len() as f64;
            let mean = items.iter().map(|(_, e)| e).sum::<f64>() / n;
            let variance =
                items.iter().map(|(_, e)| (e - mean).powi(2)).sum::<f64>() / n;
            let std_dev = variance.sqrt();
            let cutoff = mean + self.config.deviation_factor * std_dev;

            for (index, (content, entropy)) in items.iter().enumerate() {
                if *entropy > cutoff {
                    findings.push(
                        Finding::new(
                            Category::MemoryPoisoning,
                            Severity::Medium,
                            "Entropy outlier among memory entries",
                        )
                        .with_description(format!(
                            "Memory entry {index} has entropy far above the rest of \
                             the memory log"
                        ))
                        .with_details(format!(
                            "entropy {entropy:.2}, population mean {mean:.2}, \
                             std dev {std_dev:.2}"
                        ))
                        .with_recommendation(
                            "Compare the entry against its neighbors for tampering",
                        )
                        .with_evidence(json!({
                            "index": index,
                            "entropy": entropy,
                            "mean": mean,
                            "std_dev": std_dev,
                            "snippet": snippet(content),
                        })),
                    );
                }
            }
        }

        Ok(findings)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> EntropyDetector {
        EntropyDetector::new(EntropyConfig::default())
    }

    #[test]
    fn entropy_of_uniform_text_is_zero() {
        assert!(shannon_entropy("aaaaaa").abs() < f64::EPSILON);
        assert!(shannon_entropy("").abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_of_equal_frequency_alphabet() {
        // 32 distinct characters, equal frequency: exactly 5 bits/char.
        let text: String = "abcdefghijklmnopqrstuvwxyz012345".repeat(2);
        assert!((shannon_entropy(&text) - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn prose_is_below_thresholds() {
        let session = Session::builder()
            .memory_entry(
                "the user prefers short answers and wants the report delivered \
                 by friday morning at the latest",
            )
            .build();
        assert!(detector().detect(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn medium_band_and_outlier_both_fire() {
        // Five flat entries plus one 5.0-bit entry: the 5.0 entry is both
        // in the medium threshold band and more than two standard
        // deviations above the population mean.
        let dense: String = "abcdefghijklmnopqrstuvwxyz012345".repeat(2);
        let mut builder = Session::builder();
        for _ in 0..5 {
            builder = builder.memory_entry("a".repeat(60));
        }
        let session = builder.memory_entry(dense).build();

        let findings = detector().detect(&session).await.unwrap();
        assert!(findings.iter().any(|f| {
            f.title == "High-entropy memory entry" && f.severity == Severity::Medium
        }));
        assert!(findings.iter().any(|f| {
            f.title == "Entropy outlier among memory entries"
        }));
    }

    #[tokio::test]
    async fn short_dense_strings_are_skipped() {
        let session = Session::builder().memory_entry("aK9$xQ2!").build();
        assert!(detector().detect(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn outlier_check_needs_population() {
        let dense: String = "abcdefghijklmnopqrstuvwxyz012345".repeat(2);
        let session = Session::builder().memory_entry(dense).build();
        let findings = detector().detect(&session).await.unwrap();
        // Threshold finding only, no outlier finding from a population of 1.
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "High-entropy memory entry");
    }
}
