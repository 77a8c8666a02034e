//! Reduces per-element results into an overall cleaning summary and the
//! plain-text report stored alongside it.

use serde::{Deserialize, Serialize};

use super::state::InspectionState;
use super::InspectionElement;

/// Observations kept in a summary.
pub const MAX_SUMMARY_OBSERVATIONS: usize = 10;

/// Per-state tally. Unticked elements are counted as "No determinado".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusTally {
    #[serde(rename = "Excelente")]
    pub excelente: u32,
    #[serde(rename = "Bueno")]
    pub bueno: u32,
    #[serde(rename = "Regular")]
    pub regular: u32,
    #[serde(rename = "Deficiente")]
    pub deficiente: u32,
    #[serde(rename = "No determinado")]
    pub no_determinado: u32,
}

impl StatusTally {
    fn slot(&mut self, state: InspectionState) -> &mut u32 {
        match state {
            InspectionState::Excelente => &mut self.excelente,
            InspectionState::Bueno => &mut self.bueno,
            InspectionState::Regular => &mut self.regular,
            InspectionState::Deficiente => &mut self.deficiente,
            InspectionState::NoMarcada | InspectionState::NoDeterminado => &mut self.no_determinado,
        }
    }

    pub fn get(&self, state: InspectionState) -> u32 {
        match state {
            InspectionState::Excelente => self.excelente,
            InspectionState::Bueno => self.bueno,
            InspectionState::Regular => self.regular,
            InspectionState::Deficiente => self.deficiente,
            InspectionState::NoMarcada | InspectionState::NoDeterminado => self.no_determinado,
        }
    }

    fn as_percentages(&self, total: usize) -> Self {
        if total == 0 {
            return Self::default();
        }
        let pct = |count: u32| ((count as f64) * 100.0 / total as f64).round() as u32;
        Self {
            excelente: pct(self.excelente),
            bueno: pct(self.bueno),
            regular: pct(self.regular),
            deficiente: pct(self.deficiente),
            no_determinado: pct(self.no_determinado),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningSummary {
    pub overall_status: InspectionState,
    /// Average weight over determined elements, absent when none were determined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_score: Option<f64>,
    pub status_counts: StatusTally,
    pub status_percentages: StatusTally,
    pub elements_count: usize,
    pub observations: Vec<String>,
}

impl Default for CleaningSummary {
    fn default() -> Self {
        summarize(&[])
    }
}

pub fn summarize(elements: &[InspectionElement]) -> CleaningSummary {
    let mut counts = StatusTally::default();
    let mut weight_sum = 0u32;
    let mut determined = 0u32;

    for element in elements {
        *counts.slot(element.state) += 1;
        if let Some(weight) = element.state.weight() {
            weight_sum += weight;
            determined += 1;
        }
    }

    let weighted_score = (determined > 0).then(|| weight_sum as f64 / determined as f64);
    let overall_status = weighted_score
        .map(InspectionState::from_weighted_score)
        .unwrap_or(InspectionState::NoDeterminado);

    let observations = elements
        .iter()
        .filter_map(|e| {
            e.observation
                .as_deref()
                .map(|text| format!("{}: {}", e.element, text))
        })
        .take(MAX_SUMMARY_OBSERVATIONS)
        .collect();

    CleaningSummary {
        overall_status,
        weighted_score,
        status_counts: counts,
        status_percentages: counts.as_percentages(elements.len()),
        elements_count: elements.len(),
        observations,
    }
}

/// Render the stored text report, using the same grammar the AI fallback is
/// asked to produce so clients can display either one.
pub fn render_report(elements: &[InspectionElement], summary: &CleaningSummary) -> String {
    let mut out = String::new();

    for element in elements {
        out.push_str(&format!(
            "El estado del \"{}\" es {}\n",
            element.element, element.state
        ));
    }

    out.push_str("\nObservaciones:\n");
    if summary.observations.is_empty() {
        out.push_str("- Sin observaciones\n");
    } else {
        for observation in &summary.observations {
            out.push_str(&format!("- {}\n", observation));
        }
    }

    out.push_str(&format!(
        "\nEstado general: {} ({} elementos evaluados)",
        summary.overall_status, summary.elements_count
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, state: InspectionState, observation: Option<&str>) -> InspectionElement {
        InspectionElement {
            element: name.to_string(),
            state,
            observation: observation.map(str::to_string),
            confidence: 0.8,
            detection_method: "explicit".to_string(),
        }
    }

    #[test]
    fn test_weighted_overall_status() {
        let elements = vec![
            element("Techos", InspectionState::Excelente, None),
            element("Pisos", InspectionState::Excelente, None),
            element("Vidrios", InspectionState::Bueno, None),
            element("Puertas", InspectionState::Regular, None),
        ];
        let summary = summarize(&elements);
        assert_eq!(summary.weighted_score, Some(3.25));
        assert_eq!(summary.overall_status, InspectionState::Bueno);
        assert_eq!(summary.elements_count, 4);
        assert_eq!(summary.status_counts.get(InspectionState::Excelente), 2);
        assert_eq!(summary.status_percentages.excelente, 50);
        assert_eq!(summary.status_percentages.bueno, 25);
    }

    #[test]
    fn test_undetermined_excluded_from_score_but_counted() {
        let elements = vec![
            element("Techos", InspectionState::Deficiente, None),
            element("Pisos", InspectionState::NoDeterminado, None),
            element("Sillas", InspectionState::NoMarcada, None),
        ];
        let summary = summarize(&elements);
        assert_eq!(summary.overall_status, InspectionState::Deficiente);
        assert_eq!(summary.status_counts.no_determinado, 2);
        assert_eq!(summary.status_percentages.no_determinado, 67);
        assert_eq!(summary.status_percentages.deficiente, 33);
    }

    #[test]
    fn test_empty_is_undetermined() {
        let summary = summarize(&[]);
        assert_eq!(summary.overall_status, InspectionState::NoDeterminado);
        assert_eq!(summary.weighted_score, None);
        assert_eq!(summary.status_percentages, StatusTally::default());
        assert!(summary.observations.is_empty());
    }

    #[test]
    fn test_observations_capped() {
        let elements: Vec<_> = (0..15)
            .map(|i| element(&format!("E{i}"), InspectionState::Bueno, Some("sucio")))
            .collect();
        let summary = summarize(&elements);
        assert_eq!(summary.observations.len(), MAX_SUMMARY_OBSERVATIONS);
        assert_eq!(summary.observations[0], "E0: sucio");
    }

    #[test]
    fn test_report_grammar() {
        let elements = vec![element("Techos", InspectionState::Bueno, Some("agrietado"))];
        let report = render_report(&elements, &summarize(&elements));
        assert!(report.starts_with("El estado del \"Techos\" es Bueno\n"));
        assert!(report.contains("Observaciones:\n- Techos: agrietado\n"));
        assert!(report.ends_with("Estado general: Bueno (1 elementos evaluados)"));
    }

    #[test]
    fn test_summary_json_shape() {
        let elements = vec![element("Techos", InspectionState::Regular, None)];
        let json = serde_json::to_value(summarize(&elements)).unwrap();
        assert_eq!(json["overallStatus"], "Regular");
        assert_eq!(json["statusCounts"]["Regular"], 1);
        assert_eq!(json["statusPercentages"]["No determinado"], 0);
        assert_eq!(json["elementsCount"], 1);
    }
}
