//! Heuristic recovery of cleaning-inspection results from extracted text.
//!
//! Leaf-first: [`dictionary`] holds the element names and patterns,
//! [`state`] normalizes tokens, [`scanner`] reads a single element line,
//! [`analyzer`] walks a whole document and [`summary`] reduces the result.

pub mod analyzer;
pub mod dictionary;
pub mod scanner;
pub mod state;
pub mod summary;

pub use analyzer::{analyze_text, CleaningAnalyzer};
pub use state::{normalize_state, InspectionState};
pub use summary::{render_report, summarize, CleaningSummary, StatusTally};

use serde::{Deserialize, Serialize};

/// Bumped whenever the heuristics change; stored analyses with an older
/// version are regenerated on the next read.
pub const ANALYSIS_VERSION: i32 = 4;

/// One inspected element recovered from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionElement {
    pub element: String,
    pub state: InspectionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub confidence: f64,
    pub detection_method: String,
}

/// Elements plus their summary, as persisted on the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    pub elements: Vec<InspectionElement>,
    pub summary: CleaningSummary,
}

impl StructuredAnalysis {
    pub fn from_elements(elements: Vec<InspectionElement>) -> Self {
        let summary = summarize(&elements);
        Self { elements, summary }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn report(&self) -> String {
        render_report(&self.elements, &self.summary)
    }
}
