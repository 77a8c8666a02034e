//! Generative fallback for documents the heuristics cannot read, and the
//! document-grounded chat built on the same model.
//!
//! Model output is returned verbatim; its grammar is never validated here.

use std::sync::Arc;

use crate::analysis::dictionary::ELEMENTS;
use crate::domain::documents::{ConversationEntry, Document};
use crate::services::ai_client::{AiError, GenerativeModel};

/// Document text quoted into a chat prompt. The fallback analysis prompt
/// always carries the whole text.
pub const CHAT_TEXT_MAX_CHARS: usize = 30_000;

/// Conversation turns replayed into the chat prompt.
pub const CHAT_HISTORY_TURNS: usize = 6;

#[derive(Clone)]
pub struct AiFallback {
    model: Arc<dyn GenerativeModel>,
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn analysis_prompt(text: &str) -> String {
    let elements = ELEMENTS
        .iter()
        .map(|element| format!("- {element}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Eres un inspector de limpieza. Analiza el siguiente informe de inspección y \
         determina el estado de cada elemento inspeccionado.\n\n\
         Elementos posibles:\n{elements}\n\n\
         Los estados válidos son: Excelente, Bueno, Regular, Deficiente o No determinado.\n\
         Las casillas marcadas ([X], [*], [✓]) indican el estado elegido; el orden de las \
         casillas es Excelente, Bueno, Regular, Deficiente.\n\n\
         Responde exactamente con este formato, una línea por elemento encontrado:\n\
         El estado del \"<elemento>\" es <estado>\n\n\
         Y al final:\n\
         Observaciones:\n\
         - <elemento>: <observación>\n\n\
         Texto del informe:\n{text}"
    )
}

pub fn chat_prompt(document: &Document, history: &[ConversationEntry], message: &str) -> String {
    let analysis = document
        .ai_analysis_text
        .as_deref()
        .unwrap_or("(sin análisis disponible)");

    let start = history.len().saturating_sub(CHAT_HISTORY_TURNS);
    let turns = history[start..]
        .iter()
        .map(|entry| {
            let speaker = if entry.from_user { "Usuario" } else { "Asistente" };
            format!("{speaker}: {}", entry.message)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Eres un asistente que responde preguntas sobre un informe de inspección de limpieza \
         titulado \"{title}\". Responde en español y solo con información del documento.\n\n\
         Análisis del documento:\n{analysis}\n\n\
         Texto del documento:\n{text}\n\n\
         Conversación previa:\n{turns}\n\n\
         Usuario: {message}\nAsistente:",
        title = document.title,
        text = truncate_chars(&document.extracted_text, CHAT_TEXT_MAX_CHARS),
    )
}

impl AiFallback {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    pub fn is_enabled(&self) -> bool {
        self.model.is_enabled()
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Ask the model for a full analysis of `text`.
    pub async fn analyze(&self, text: &str) -> Result<String, AiError> {
        let response = self.model.generate(&analysis_prompt(text)).await?;
        tracing::info!(
            model = self.model_name(),
            chars = response.len(),
            "AI fallback produced analysis"
        );
        Ok(response)
    }

    pub async fn chat(&self, document: &Document, message: &str) -> Result<String, AiError> {
        self.model
            .generate(&chat_prompt(document, &document.conversation, message))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::documents::StorageType;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerativeModel for RecordingModel {
        async fn generate(&self, prompt: &str) -> Result<String, AiError> {
            self.prompts.lock().push(prompt.to_string());
            Ok("El estado del \"Techos\" es Bueno".to_string())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn test_analysis_prompt_lists_every_element() {
        let prompt = analysis_prompt("Techos [X]");
        for element in ELEMENTS {
            assert!(prompt.contains(&format!("- {element}")));
        }
        assert!(prompt.contains("El estado del \"<elemento>\" es <estado>"));
        assert!(prompt.contains("Observaciones:"));
        assert!(prompt.ends_with("Techos [X]"));
    }

    #[test]
    fn test_analysis_prompt_carries_whole_text() {
        let text = format!("{}Techos [X]", "ñ".repeat(CHAT_TEXT_MAX_CHARS + 500));
        let prompt = analysis_prompt(&text);
        assert!(prompt.ends_with(&text));
    }

    #[test]
    fn test_chat_prompt_caps_document_text() {
        let mut document = Document::new(
            "Informe".into(),
            None,
            "informe.pdf".into(),
            "ref".into(),
            StorageType::Local,
            1,
        );
        document.extracted_text = format!("{}FINAL", "a".repeat(CHAT_TEXT_MAX_CHARS));
        let prompt = chat_prompt(&document, &[], "hola");
        assert!(prompt.contains(&"a".repeat(CHAT_TEXT_MAX_CHARS)));
        assert!(!prompt.contains("FINAL"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("ñandú", 3), "ñan");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_analyze_returns_model_text_verbatim() {
        let model = Arc::new(RecordingModel {
            prompts: Mutex::new(Vec::new()),
        });
        let fallback = AiFallback::new(model.clone());
        let text = fallback.analyze("texto").await.unwrap();
        assert_eq!(text, "El estado del \"Techos\" es Bueno");
        assert_eq!(model.prompts.lock().len(), 1);
    }

    #[test]
    fn test_chat_prompt_keeps_recent_turns() {
        let mut document = Document::new(
            "Informe".into(),
            None,
            "informe.pdf".into(),
            "ref".into(),
            StorageType::Local,
            1,
        );
        document.extracted_text = "Techos [X]".into();
        let history: Vec<_> = (0..10)
            .map(|i| ConversationEntry::user(format!("pregunta {i}")))
            .collect();

        let prompt = chat_prompt(&document, &history, "¿y los vidrios?");
        assert!(!prompt.contains("pregunta 3"));
        assert!(prompt.contains("pregunta 9"));
        assert!(prompt.contains("Usuario: ¿y los vidrios?"));
    }
}
