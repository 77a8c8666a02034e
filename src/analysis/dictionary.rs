//! Inspection element dictionary and the line-local pattern families.
//!
//! Every pattern here is single-line: none of them can match across `\n`.

use regex::Regex;
use std::sync::LazyLock;

use super::state::InspectionState;

/// Checklist elements, in match priority order.
///
/// A name that contains another name (e.g. "Marcos de puertas" / "Puertas")
/// must come first, otherwise the shorter one would shadow it.
pub const ELEMENTS: &[&str] = &[
    "Marcos de puertas",
    "Marcos de ventanas",
    "Puertas",
    "Ventanas",
    "Vidrios",
    "Techos",
    "Cielos",
    "Paredes",
    "Pisos",
    "Zócalos",
    "Alfombras",
    "Persianas",
    "Cortinas",
    "Luminarias",
    "Interruptores",
    "Enchufes",
    "Rejillas de ventilación",
    "Aire acondicionado",
    "Extintores",
    "Señalética",
    "Escritorios",
    "Sillas",
    "Mesas",
    "Estantes",
    "Archivadores",
    "Computadores",
    "Teclados",
    "Teléfonos",
    "Papeleros",
    "Basureros",
    "Lavamanos",
    "Inodoros",
    "Urinarios",
    "Espejos",
    "Dispensadores de jabón",
    "Dispensadores de papel",
    "Secadores de manos",
    "Duchas",
    "Refrigerador",
    "Microondas",
    "Lavaplatos",
    "Comedor",
    "Cocina",
    "Baños",
    "Escaleras",
    "Pasamanos",
    "Ascensores",
    "Pasillos",
    "Bodega",
    "Estacionamiento",
    "Jardines",
];

/// Whole-word, case-insensitive matcher per element.
static ELEMENT_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    ELEMENTS
        .iter()
        .map(|name| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(name));
            (*name, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Accent- and space-insensitive element forms for OCR-damaged text.
static ELEMENTS_FOLDED: LazyLock<Vec<(&'static str, String)>> =
    LazyLock::new(|| ELEMENTS.iter().map(|name| (*name, fold(name))).collect());

/// Lowercase, strip diacritics and drop everything that is not a letter or digit.
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter_map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => Some('a'),
            'é' | 'è' | 'ë' | 'ê' => Some('e'),
            'í' | 'ì' | 'ï' | 'î' => Some('i'),
            'ó' | 'ò' | 'ö' | 'ô' => Some('o'),
            'ú' | 'ù' | 'ü' | 'û' => Some('u'),
            'ñ' => Some('n'),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect()
}

/// Any bracket pair holding at most one glyph: `[ ]`, `[]`, `[X]`, `[ B ]`.
pub static BRACKET_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[ \t]*([^\[\]\s])?[ \t]*\]").unwrap());

const LABELLED_STATE_PATTERN: &str =
    r"(?i)(?:estado[ \t]*:|\bes\b|\best[aá]\b)[ \t]*(excelente|bueno|regular|deficiente)\b";

/// A state word introduced by "Estado:", "es" or "está". Unlike a bare label
/// it is never part of a printed checkbox legend.
pub static LABELLED_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LABELLED_STATE_PATTERN).unwrap());

/// Single-line explicit state tokens, most specific first.
pub static EXPLICIT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(LABELLED_STATE_PATTERN).unwrap(),
        Regex::new(r"(?i)\b(excelente|bueno|regular|deficiente)\b").unwrap(),
        Regex::new(r"\b([EBRD])\b").unwrap(),
    ]
});

/// Labelled free-text annotations.
pub static OBSERVATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:observaci[oó]n(?:es)?|comentarios?|notas?)[ \t]*:[ \t]*(\S.*)").unwrap()
});

/// State labels printed next to checkboxes, matched against a lowercased line.
pub static STATE_KEYWORDS: LazyLock<Vec<(InspectionState, Regex)>> = LazyLock::new(|| {
    [
        (InspectionState::Excelente, r"excelente|\(?\be\)"),
        (InspectionState::Bueno, r"bueno|\(?\bb\)"),
        (InspectionState::Regular, r"regular|\(?\br\)"),
        (InspectionState::Deficiente, r"deficiente|\(?\bd\)"),
    ]
    .into_iter()
    .map(|(state, pattern)| (state, Regex::new(pattern).unwrap()))
    .collect()
});

/// Whether a bracket glyph counts as a tick.
pub fn is_mark(glyph: char) -> bool {
    matches!(glyph, 'x' | 'X' | '*' | '✓' | '✔')
        || glyph.is_ascii_digit()
        || matches!(glyph.to_ascii_uppercase(), 'E' | 'B' | 'R' | 'D')
}

/// First dictionary element named in `line` as a whole word, in dictionary order.
pub fn find_element(line: &str) -> Option<&'static str> {
    ELEMENT_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(line))
        .map(|(name, _)| *name)
}

/// Elements whose folded name occurs anywhere in the folded `line`, in dictionary order.
pub fn find_elements_lenient(line: &str) -> impl Iterator<Item = &'static str> {
    let folded = fold(line);
    ELEMENTS_FOLDED
        .iter()
        .filter(move |(_, needle)| folded.contains(needle.as_str()))
        .map(|(name, _)| *name)
}

/// Whether `line` mentions any dictionary element.
pub fn mentions_element(line: &str) -> bool {
    find_element(line).is_some()
}

/// Whether `line` carries a ticked checkbox or an explicit state token.
pub fn has_state_marker(line: &str) -> bool {
    let ticked = BRACKET_PAIR
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().chars().next())
        .any(is_mark);

    ticked || EXPLICIT_PATTERNS.iter().any(|re| re.is_match(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_has_no_shadowed_names() {
        for (i, earlier) in ELEMENTS.iter().enumerate() {
            for later in &ELEMENTS[i + 1..] {
                assert!(
                    !later.to_lowercase().contains(&earlier.to_lowercase()),
                    "{earlier:?} shadows {later:?}"
                );
            }
        }
    }

    #[test]
    fn test_dictionary_size() {
        assert!(ELEMENTS.len() >= 45);
    }

    #[test]
    fn test_find_element_prefers_specific_names() {
        assert_eq!(find_element("Marcos de puertas: Bueno"), Some("Marcos de puertas"));
        assert_eq!(find_element("puertas principales"), Some("Puertas"));
        assert_eq!(find_element("sin elementos"), None);
        assert_eq!(find_element("BAÑOS: Bueno"), Some("Baños"));
        assert_eq!(find_element("Banos: Bueno"), None);
    }

    #[test]
    fn test_lenient_matching() {
        assert_eq!(fold("Zócalos de la Sala"), "zocalosdelasala");
        let found: Vec<_> = find_elements_lenient("Banos y Dispensadoresde jabon").collect();
        assert_eq!(found, vec!["Dispensadores de jabón", "Baños"]);
    }

    #[test]
    fn test_bracket_pairs() {
        let line = "Techos [ ] [X] [] [ ✓ ]";
        let glyphs: Vec<Option<&str>> = BRACKET_PAIR
            .captures_iter(line)
            .map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        assert_eq!(glyphs, vec![None, Some("X"), None, Some("✓")]);
    }

    #[test]
    fn test_patterns_are_line_local() {
        assert!(!OBSERVATION_PATTERN.is_match("Observación:\nagrietado"));
        assert!(!BRACKET_PAIR.is_match("[\nX]"));
        let caps = OBSERVATION_PATTERN.captures("Nota: revisar mañana").unwrap();
        assert_eq!(&caps[1], "revisar mañana");
    }

    #[test]
    fn test_state_markers() {
        assert!(has_state_marker("Pisos [X]"));
        assert!(has_state_marker("Estado: Regular"));
        assert!(has_state_marker("D"));
        assert!(!has_state_marker("Pisos [ ] [ ]"));
        assert!(!has_state_marker("de la sala"));
    }
}
