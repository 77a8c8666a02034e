//! Canonical inspection states and raw-token normalization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition reported for an inspected element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InspectionState {
    Excelente,
    Bueno,
    Regular,
    Deficiente,
    /// The form had the element but no option ticked.
    #[serde(rename = "No marcada", alias = "No Marcada")]
    NoMarcada,
    #[default]
    #[serde(rename = "No determinado")]
    NoDeterminado,
}

impl InspectionState {
    /// Rated states in checkbox order (left to right on the paper form).
    pub const RATED: [InspectionState; 4] = [
        InspectionState::Excelente,
        InspectionState::Bueno,
        InspectionState::Regular,
        InspectionState::Deficiente,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excelente => "Excelente",
            Self::Bueno => "Bueno",
            Self::Regular => "Regular",
            Self::Deficiente => "Deficiente",
            Self::NoMarcada => "No marcada",
            Self::NoDeterminado => "No determinado",
        }
    }

    /// Score used by the weighted summary (Excelente=4 .. Deficiente=1).
    pub fn weight(&self) -> Option<u32> {
        match self {
            Self::Excelente => Some(4),
            Self::Bueno => Some(3),
            Self::Regular => Some(2),
            Self::Deficiente => Some(1),
            Self::NoMarcada | Self::NoDeterminado => None,
        }
    }

    pub fn is_determined(&self) -> bool {
        self.weight().is_some()
    }

    /// State at a zero-based checkbox position; positions past the fourth are undetermined.
    pub fn from_ordinal(index: usize) -> Self {
        Self::RATED
            .get(index)
            .copied()
            .unwrap_or(Self::NoDeterminado)
    }

    /// Maps an averaged weight back onto a state.
    pub fn from_weighted_score(score: f64) -> Self {
        if score >= 3.5 {
            Self::Excelente
        } else if score >= 2.5 {
            Self::Bueno
        } else if score >= 1.5 {
            Self::Regular
        } else {
            Self::Deficiente
        }
    }
}

impl fmt::Display for InspectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a captured token (letter, word or phrase) into a state.
///
/// Total: anything unrecognized, including the empty string, is
/// `NoDeterminado`. Output is always one of the canonical spellings, so
/// "No Marcada" and "NO MARCADA" both come back as "No marcada".
pub fn normalize_state(raw: &str) -> InspectionState {
    let token = raw.trim().to_uppercase();

    match token.as_str() {
        "E" => InspectionState::Excelente,
        "B" => InspectionState::Bueno,
        "R" => InspectionState::Regular,
        "D" => InspectionState::Deficiente,
        "NO MARCADA" => InspectionState::NoMarcada,
        "NO DETERMINADO" => InspectionState::NoDeterminado,
        t if t.contains("EXCELENTE") => InspectionState::Excelente,
        t if t.contains("BUENO") => InspectionState::Bueno,
        t if t.contains("REGULAR") => InspectionState::Regular,
        t if t.contains("DEFICIENTE") => InspectionState::Deficiente,
        _ => InspectionState::NoDeterminado,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_letters_any_case() {
        assert_eq!(normalize_state("e"), InspectionState::Excelente);
        assert_eq!(normalize_state(" B "), InspectionState::Bueno);
        assert_eq!(normalize_state("r"), InspectionState::Regular);
        assert_eq!(normalize_state("D"), InspectionState::Deficiente);
    }

    #[test]
    fn test_words_inside_phrases() {
        assert_eq!(normalize_state("estado excelente"), InspectionState::Excelente);
        assert_eq!(normalize_state("Bueno."), InspectionState::Bueno);
        assert_eq!(normalize_state("muy deficiente"), InspectionState::Deficiente);
    }

    #[test]
    fn test_unmarked_passes_through() {
        assert_eq!(normalize_state("No Marcada"), InspectionState::NoMarcada);
        assert_eq!(normalize_state("No marcada").as_str(), "No marcada");
        assert_eq!(normalize_state("No determinado"), InspectionState::NoDeterminado);
    }

    #[test]
    fn test_unmarked_spelling_is_canonical() {
        assert_eq!(normalize_state("No Marcada").to_string(), "No marcada");
        assert_eq!(normalize_state(" NO MARCADA ").to_string(), "No marcada");
        let parsed: InspectionState = serde_json::from_str("\"No Marcada\"").unwrap();
        assert_eq!(parsed, InspectionState::NoMarcada);
    }

    #[test]
    fn test_unknown_is_undetermined() {
        for raw in ["xyz", "", "   ", "X", "[ ]", "ñ", "42"] {
            assert_eq!(normalize_state(raw), InspectionState::NoDeterminado, "{raw:?}");
        }
    }

    #[test]
    fn test_weighted_thresholds() {
        assert_eq!(InspectionState::from_weighted_score(3.5), InspectionState::Excelente);
        assert_eq!(InspectionState::from_weighted_score(3.25), InspectionState::Bueno);
        assert_eq!(InspectionState::from_weighted_score(2.5), InspectionState::Bueno);
        assert_eq!(InspectionState::from_weighted_score(1.5), InspectionState::Regular);
        assert_eq!(InspectionState::from_weighted_score(1.49), InspectionState::Deficiente);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&InspectionState::NoDeterminado).unwrap(),
            "\"No determinado\""
        );
        assert_eq!(serde_json::to_string(&InspectionState::Bueno).unwrap(), "\"Bueno\"");
    }
}
