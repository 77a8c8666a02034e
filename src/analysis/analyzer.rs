//! Whole-document analysis: a primary pass keyed on element lines and an
//! alternative pass keyed on state markers for text where no element name
//! survived extraction intact.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::dictionary::{find_element, find_elements_lenient, has_state_marker};
use super::scanner::{scan, LineWindow, ScanResult};
use super::{InspectionElement, StructuredAnalysis, ANALYSIS_VERSION};
use crate::services::cache::AnalysisCache;

/// Default confidence multiplier for results found by the alternative pass.
pub const DEFAULT_ALTERNATIVE_FACTOR: f64 = 0.8;

/// How far above a state marker the alternative pass looks for an element name.
const ALTERNATIVE_LOOKBACK: usize = 3;

/// Trimmed, non-empty lines.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Analyze `text` without caching.
pub fn analyze_text(text: &str, alternative_factor: f64) -> Vec<InspectionElement> {
    let lines = split_lines(text);

    let primary = primary_pass(&lines);
    if !primary.is_empty() {
        return primary;
    }

    alternative_pass(&lines, alternative_factor)
}

fn to_element(name: &str, result: ScanResult) -> InspectionElement {
    InspectionElement {
        element: name.to_string(),
        state: result.state,
        observation: result.observation,
        confidence: result.confidence,
        detection_method: result.method.as_str().to_string(),
    }
}

/// One element per line (the first dictionary match), first mention wins.
fn primary_pass(lines: &[&str]) -> Vec<InspectionElement> {
    let mut seen = HashSet::new();
    let mut elements = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let Some(name) = find_element(line) else {
            continue;
        };
        if !seen.insert(name) {
            continue;
        }
        elements.push(to_element(name, scan(&LineWindow::around(lines, index))));
    }

    elements
}

fn alternative_pass(lines: &[&str], factor: f64) -> Vec<InspectionElement> {
    let mut seen: HashSet<&'static str> = HashSet::new();
    let mut elements = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if !has_state_marker(line) {
            continue;
        }

        let start = index.saturating_sub(ALTERNATIVE_LOOKBACK);
        let nearest = (start..=index)
            .rev()
            .find_map(|j| find_elements_lenient(lines[j]).find(|name| !seen.contains(name)));
        let Some(name) = nearest else {
            continue;
        };
        seen.insert(name);

        let result = scan(&LineWindow::around(lines, index));
        let mut element = to_element(name, result);
        element.confidence *= factor;
        element.detection_method = format!("alternative-{}", element.detection_method);
        elements.push(element);
    }

    elements
}

/// Cache key for a document text under the current heuristics version.
pub fn cache_key(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("analysis:v{}:{}", ANALYSIS_VERSION, hex::encode(digest))
}

/// Analyzer with a pluggable result cache.
pub struct CleaningAnalyzer {
    cache: Arc<dyn AnalysisCache>,
    alternative_factor: f64,
    computations: AtomicUsize,
}

impl CleaningAnalyzer {
    pub fn new(cache: Arc<dyn AnalysisCache>, alternative_factor: f64) -> Self {
        Self {
            cache,
            alternative_factor,
            computations: AtomicUsize::new(0),
        }
    }

    /// Analyze a document text, reusing a cached result unless `force_refresh`.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn analyze(&self, text: &str, force_refresh: bool) -> StructuredAnalysis {
        let key = cache_key(text);

        if force_refresh {
            if let Err(e) = self.cache.invalidate(&key).await {
                warn!(error = %e, "Failed to invalidate cached analysis");
            }
        } else if let Some(cached) = self.cache.get(&key).await {
            debug!("Using cached analysis");
            return cached;
        }

        let elements = analyze_text(text, self.alternative_factor);
        self.computations.fetch_add(1, Ordering::Relaxed);
        let analysis = StructuredAnalysis::from_elements(elements);

        debug!(
            elements = analysis.elements.len(),
            overall = %analysis.summary.overall_status,
            "Analysis computed"
        );

        if let Err(e) = self.cache.set(&key, &analysis).await {
            warn!(error = %e, "Failed to cache analysis");
        }

        analysis
    }

    /// Number of analyses actually computed (cache hits excluded).
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dictionary::ELEMENTS;
    use crate::analysis::InspectionState;
    use crate::services::cache::MemoryAnalysisCache;
    use std::time::Duration;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_every_element_found_once() {
        let text: String = ELEMENTS
            .iter()
            .map(|name| format!("{name}: Bueno\n"))
            .collect::<String>()
            + "Techos: Deficiente\n";

        let elements = analyze_text(&text, DEFAULT_ALTERNATIVE_FACTOR);
        assert_eq!(elements.len(), ELEMENTS.len());

        let names: HashSet<&str> = elements.iter().map(|e| e.element.as_str()).collect();
        assert_eq!(names.len(), ELEMENTS.len());
        assert!(elements.iter().all(|e| e.state == InspectionState::Bueno));
        assert!(elements.iter().all(|e| e.detection_method == "explicit"));
    }

    #[test]
    fn test_first_element_per_line_wins() {
        let elements = analyze_text("Pisos y Paredes: Regular", DEFAULT_ALTERNATIVE_FACTOR);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].element, "Paredes");
    }

    #[test]
    fn test_checkbox_with_observation() {
        let elements = analyze_text(
            "Techos [ ] [X] [ ] [ ]\nObservación: agrietado",
            DEFAULT_ALTERNATIVE_FACTOR,
        );
        assert_eq!(elements.len(), 1);
        let techos = &elements[0];
        assert_eq!(techos.element, "Techos");
        assert_eq!(techos.state, InspectionState::Bueno);
        assert_eq!(techos.observation.as_deref(), Some("agrietado"));
        assert!(approx(techos.confidence, 0.7));
        assert_eq!(techos.detection_method, "checkbox-position");
    }

    #[test]
    fn test_alternative_pass_on_damaged_names() {
        let text = "INFORME\nBanos\n[ ] [X] [ ] [ ]\nZocalos Regular";
        let elements = analyze_text(text, DEFAULT_ALTERNATIVE_FACTOR);
        assert_eq!(elements.len(), 2);

        assert_eq!(elements[0].element, "Baños");
        assert_eq!(elements[0].state, InspectionState::Bueno);
        assert!(approx(elements[0].confidence, 0.7 * 0.8));
        assert_eq!(elements[0].detection_method, "alternative-checkbox-position");

        assert_eq!(elements[1].element, "Zócalos");
        assert_eq!(elements[1].state, InspectionState::Regular);
        assert_eq!(elements[1].detection_method, "alternative-explicit");
    }

    #[test]
    fn test_alternative_pass_never_duplicates() {
        let elements = analyze_text("Banos\n[X]\n[X]", DEFAULT_ALTERNATIVE_FACTOR);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].element, "Baños");
    }

    #[test]
    fn test_alternative_pass_skipped_when_primary_finds_something() {
        let text = "Techos Bueno\nBanos\n[ ] [X] [ ] [ ]";
        let elements = analyze_text(text, DEFAULT_ALTERNATIVE_FACTOR);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].element, "Techos");
        assert!(!elements[0].detection_method.starts_with("alternative-"));
    }

    #[test]
    fn test_empty_text() {
        assert!(analyze_text("", DEFAULT_ALTERNATIVE_FACTOR).is_empty());
        assert!(analyze_text("\n  \n", DEFAULT_ALTERNATIVE_FACTOR).is_empty());
    }

    #[test]
    fn test_cache_key_is_versioned() {
        let key = cache_key("abc");
        assert!(key.starts_with(&format!("analysis:v{ANALYSIS_VERSION}:")));
        assert_ne!(key, cache_key("abd"));
    }

    #[tokio::test]
    async fn test_analyzer_uses_cache_until_forced() {
        let cache = Arc::new(MemoryAnalysisCache::new(Duration::from_secs(3600)));
        let analyzer = CleaningAnalyzer::new(cache, DEFAULT_ALTERNATIVE_FACTOR);

        let first = analyzer.analyze("Pisos Bueno", false).await;
        let second = analyzer.analyze("Pisos Bueno", false).await;
        assert_eq!(first, second);
        assert_eq!(analyzer.computations(), 1);

        analyzer.analyze("Pisos Bueno", true).await;
        assert_eq!(analyzer.computations(), 2);
    }
}
