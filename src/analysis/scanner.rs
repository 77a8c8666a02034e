//! Line-context scanner: reads one element line plus its neighbours and
//! decides which state was ticked and what was written about it.

use super::dictionary::{
    has_state_marker, is_mark, mentions_element, BRACKET_PAIR, EXPLICIT_PATTERNS, LABELLED_STATE,
    OBSERVATION_PATTERN, STATE_KEYWORDS,
};
use super::state::{normalize_state, InspectionState};

/// Lines considered on each side of the element line.
pub const CONTEXT_RADIUS: usize = 3;

/// Context lines longer than this are never adopted as implicit observations.
const IMPLICIT_OBSERVATION_MAX_CHARS: usize = 100;

/// Minimum number of printed state labels for the nearest-label heuristic.
const MIN_KEYWORDS_FOR_CONTEXT: usize = 3;

/// Which heuristic produced a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    CheckboxContext,
    CheckboxPosition,
    CheckboxLetter,
    CheckboxEmpty,
    Explicit,
    None,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckboxContext => "checkbox-context",
            Self::CheckboxPosition => "checkbox-position",
            Self::CheckboxLetter => "checkbox-letter",
            Self::CheckboxEmpty => "checkbox-empty",
            Self::Explicit => "explicit",
            Self::None => "none",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::CheckboxContext => 0.9,
            Self::CheckboxLetter => 0.85,
            Self::Explicit => 0.8,
            Self::CheckboxPosition => 0.7,
            Self::CheckboxEmpty => 0.5,
            Self::None => 0.0,
        }
    }
}

/// A line together with up to [`CONTEXT_RADIUS`] neighbours on each side.
#[derive(Debug, Clone, Copy)]
pub struct LineWindow<'a> {
    pub line: &'a str,
    /// Preceding lines, in document order.
    pub before: &'a [&'a str],
    /// Following lines, in document order.
    pub after: &'a [&'a str],
}

impl<'a> LineWindow<'a> {
    /// Window around `lines[index]`.
    pub fn around(lines: &'a [&'a str], index: usize) -> Self {
        let start = index.saturating_sub(CONTEXT_RADIUS);
        let end = (index + 1 + CONTEXT_RADIUS).min(lines.len());
        Self {
            line: lines[index],
            before: &lines[start..index],
            after: &lines[index + 1..end],
        }
    }

    /// Context lines nearest-first, following lines before preceding ones.
    fn context_nearest_first(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.after
            .iter()
            .copied()
            .chain(self.before.iter().rev().copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub state: InspectionState,
    pub confidence: f64,
    pub observation: Option<String>,
    pub method: DetectionMethod,
}

/// Scan an element line and its neighbourhood.
pub fn scan(window: &LineWindow<'_>) -> ScanResult {
    let (state, method) = detect_state(window.line);

    ScanResult {
        state,
        confidence: method.confidence(),
        observation: find_observation(window),
        method,
    }
}

/// State carried by a single line: checkboxes first, then explicit tokens.
pub fn detect_state(line: &str) -> (InspectionState, DetectionMethod) {
    if let Some(found) = checkbox_state(line) {
        return found;
    }
    if let Some(state) = explicit_state(line) {
        return (state, DetectionMethod::Explicit);
    }
    (InspectionState::NoDeterminado, DetectionMethod::None)
}

fn char_offset(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].chars().count()
}

/// Character span `[start, end)` of a match.
type Span = (usize, usize);

fn char_span(text: &str, m: regex::Match<'_>) -> Span {
    (char_offset(text, m.start()), char_offset(text, m.end()))
}

/// Characters between two spans; zero when they overlap.
fn gap((a_start, a_end): Span, (b_start, b_end): Span) -> usize {
    if a_end <= b_start {
        b_start - a_end
    } else if b_end <= a_start {
        a_start - b_end
    } else {
        0
    }
}

fn checkbox_state(line: &str) -> Option<(InspectionState, DetectionMethod)> {
    let boxes: Vec<(Span, Option<char>)> = BRACKET_PAIR
        .captures_iter(line)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let glyph = caps.get(1).and_then(|m| m.as_str().chars().next());
            Some((char_span(line, whole), glyph))
        })
        .collect();

    if boxes.is_empty() {
        return None;
    }

    // Unticked boxes still leave room for a written "Estado: Bueno".
    let Some(ticked) = boxes
        .iter()
        .position(|(_, glyph)| glyph.is_some_and(is_mark))
    else {
        return Some(match labelled_state(line) {
            Some(state) => (state, DetectionMethod::Explicit),
            None => (InspectionState::NoMarcada, DetectionMethod::CheckboxEmpty),
        });
    };

    let (mark, glyph) = boxes[ticked];

    // A lone "[B]" names its state directly.
    if boxes.len() == 1 {
        let lettered = glyph.map(|g| normalize_state(&g.to_string()));
        if let Some(state) = lettered.filter(InspectionState::is_determined) {
            return Some((state, DetectionMethod::CheckboxLetter));
        }
    }

    let lower = line.to_lowercase();
    let keywords: Vec<(InspectionState, Span)> = STATE_KEYWORDS
        .iter()
        .filter_map(|(state, re)| re.find(&lower).map(|m| (*state, char_span(&lower, m))))
        .collect();

    if keywords.len() >= MIN_KEYWORDS_FOR_CONTEXT {
        // "Bueno [X]" legends tie a box to the label before it, "[X] Bueno"
        // legends to the label after it; the layout settles equal gaps.
        let first_label = keywords.iter().map(|(_, (start, _))| *start).min()?;
        let labels_lead = first_label < boxes[0].0 .0;
        let closest = keywords
            .iter()
            .min_by_key(|(_, span)| {
                let label_before = span.1 <= mark.0;
                (gap(mark, *span), label_before != labels_lead)
            })
            .map(|(state, _)| *state)?;
        return Some((closest, DetectionMethod::CheckboxContext));
    }

    let state = InspectionState::from_ordinal(ticked);
    state
        .is_determined()
        .then_some((state, DetectionMethod::CheckboxPosition))
}

fn labelled_state(line: &str) -> Option<InspectionState> {
    let caps = LABELLED_STATE.captures(line)?;
    Some(normalize_state(caps.get(1)?.as_str())).filter(InspectionState::is_determined)
}

fn explicit_state(line: &str) -> Option<InspectionState> {
    EXPLICIT_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(line)?;
        Some(normalize_state(caps.get(1)?.as_str())).filter(InspectionState::is_determined)
    })
}

fn labelled_observation(line: &str) -> Option<String> {
    OBSERVATION_PATTERN
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Labelled observation on the line itself, then on any context line
/// nearest-first. Unlabelled free text is only adopted from the lines *below*
/// the element: the lines above belong to the previous element or to page
/// headings, so they are never taken as implicit observations.
fn find_observation(window: &LineWindow<'_>) -> Option<String> {
    if let Some(found) = labelled_observation(window.line) {
        return Some(found);
    }
    if let Some(found) = window.context_nearest_first().find_map(labelled_observation) {
        return Some(found);
    }

    // Free text right below the element, e.g. a handwritten remark.
    window
        .after
        .iter()
        .map(|line| line.trim())
        .find(|line| {
            !line.is_empty()
                && line.chars().count() < IMPLICIT_OBSERVATION_MAX_CHARS
                && !mentions_element(line)
                && !has_state_marker(line)
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_text(text: &str, index: usize) -> ScanResult {
        let lines: Vec<&str> = text.lines().collect();
        scan(&LineWindow::around(&lines, index))
    }

    #[test]
    fn test_checkbox_ordinal_position() {
        let (state, method) = detect_state("Pisos [ ] [ ] [X] [ ]");
        assert_eq!(state, InspectionState::Regular);
        assert_eq!(method, DetectionMethod::CheckboxPosition);
        assert_eq!(method.confidence(), 0.7);
    }

    #[test]
    fn test_checkbox_nearest_keyword() {
        let (state, method) = detect_state("Vidrios: Excelente      Bueno [X]      Regular      Deficiente");
        assert_eq!(state, InspectionState::Bueno);
        assert_eq!(method, DetectionMethod::CheckboxContext);
        assert_eq!(method.confidence(), 0.9);
    }

    #[test]
    fn test_checkbox_letter_paren_keywords() {
        let (state, method) = detect_state("Sillas (E) (B) (R) (D) [X]");
        assert_eq!(method, DetectionMethod::CheckboxContext);
        assert_eq!(state, InspectionState::Deficiente);
    }

    #[test]
    fn test_two_keywords_fall_back_to_position() {
        let (state, method) = detect_state("Mesas Bueno Regular [ ] [X]");
        assert_eq!(state, InspectionState::Bueno);
        assert_eq!(method, DetectionMethod::CheckboxPosition);
    }

    #[test]
    fn test_lettered_checkbox() {
        let (state, method) = detect_state("Baños [R]");
        assert_eq!(state, InspectionState::Regular);
        assert_eq!(method, DetectionMethod::CheckboxLetter);
    }

    #[test]
    fn test_unticked_boxes() {
        let (state, method) = detect_state("Techos Excelente [ ] Bueno [ ] Regular [ ] Deficiente [ ]");
        assert_eq!(state, InspectionState::NoMarcada);
        assert_eq!(method, DetectionMethod::CheckboxEmpty);
    }

    #[test]
    fn test_unticked_boxes_with_written_state() {
        let (state, method) = detect_state("Techos [ ] [ ] Estado: Bueno");
        assert_eq!(state, InspectionState::Bueno);
        assert_eq!(method, DetectionMethod::Explicit);
        assert_eq!(detect_state("Pisos [ ] [ ] [ ] [ ] está deficiente").0, InspectionState::Deficiente);
    }

    #[test]
    fn test_label_then_box_legend() {
        let (state, method) = detect_state("Techos Excelente [X] Bueno [ ] Regular [ ] Deficiente [ ]");
        assert_eq!(state, InspectionState::Excelente);
        assert_eq!(method, DetectionMethod::CheckboxContext);

        let (state, _) = detect_state("Techos Excelente [ ] Bueno [X] Regular [ ] Deficiente [ ]");
        assert_eq!(state, InspectionState::Bueno);

        let (state, _) = detect_state("Techos Excelente [ ] Bueno [ ] Regular [ ] Deficiente [X]");
        assert_eq!(state, InspectionState::Deficiente);
    }

    #[test]
    fn test_box_then_label_legend() {
        let (state, method) = detect_state("Puertas [X] Excelente [ ] Bueno [ ] Regular [ ] Deficiente");
        assert_eq!(state, InspectionState::Excelente);
        assert_eq!(method, DetectionMethod::CheckboxContext);

        let (state, _) = detect_state("Puertas [ ] Excelente [X] Bueno [ ] Regular [ ] Deficiente");
        assert_eq!(state, InspectionState::Bueno);

        let (state, _) = detect_state("Puertas [ ] Excelente [ ] Bueno [X] Regular [ ] Deficiente");
        assert_eq!(state, InspectionState::Regular);
    }

    #[test]
    fn test_fifth_box_is_not_a_state() {
        let (state, method) = detect_state("Pisos [ ] [ ] [ ] [ ] [X]");
        assert_eq!(state, InspectionState::NoDeterminado);
        assert_eq!(method, DetectionMethod::None);
    }

    #[test]
    fn test_explicit_forms() {
        assert_eq!(detect_state("Techos: Estado: Deficiente").0, InspectionState::Deficiente);
        assert_eq!(detect_state("El piso está regular").0, InspectionState::Regular);
        assert_eq!(detect_state("Extintores excelente").0, InspectionState::Excelente);
        assert_eq!(detect_state("Duchas B").0, InspectionState::Bueno);
        assert_eq!(detect_state("Duchas B").1, DetectionMethod::Explicit);
    }

    #[test]
    fn test_nothing_found() {
        let result = scan_text("Escaleras sin información", 0);
        assert_eq!(result.state, InspectionState::NoDeterminado);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, DetectionMethod::None);
        assert_eq!(result.observation, None);
    }

    #[test]
    fn test_observation_on_following_line() {
        let result = scan_text("Techos [ ] [X] [ ] [ ]\nObservación: agrietado", 0);
        assert_eq!(result.state, InspectionState::Bueno);
        assert_eq!(result.observation.as_deref(), Some("agrietado"));
    }

    #[test]
    fn test_observation_on_same_line_wins() {
        let text = "Pisos Bueno Nota: encerar\nComentario: otro";
        assert_eq!(scan_text(text, 0).observation.as_deref(), Some("encerar"));
    }

    #[test]
    fn test_implicit_observation() {
        let text = "Vidrios Regular\nmanchas en el ventanal norte\nPisos Bueno";
        let result = scan_text(text, 0);
        assert_eq!(result.observation.as_deref(), Some("manchas en el ventanal norte"));
    }

    #[test]
    fn test_implicit_observation_skips_element_and_long_lines() {
        let long = "x".repeat(120);
        let text = format!("Vidrios Regular\n{long}\nPisos Bueno");
        assert_eq!(scan_text(&text, 0).observation, None);
    }

    #[test]
    fn test_implicit_observation_ignores_lines_above() {
        let text = "INFORME SEMANAL\nVidrios Regular";
        assert_eq!(scan_text(text, 1).observation, None);

        let text = "Comentario: sala norte\nVidrios Regular";
        assert_eq!(scan_text(text, 1).observation.as_deref(), Some("sala norte"));
    }

    #[test]
    fn test_window_bounds() {
        let lines = vec!["a", "b", "c", "d", "e", "f", "g", "h"];
        let window = LineWindow::around(&lines, 1);
        assert_eq!(window.before, &["a"]);
        assert_eq!(window.after, &["c", "d", "e"]);
        let window = LineWindow::around(&lines, 7);
        assert_eq!(window.before, &["e", "f", "g"]);
        assert!(window.after.is_empty());
    }
}
