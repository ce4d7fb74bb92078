//! Построение документа разметки из списка чанков

use std::collections::BTreeSet;
use crate::config::MarkupConfig;
use crate::text::Chunk;
use crate::warning::PipelineWarning;
use super::emphasis::{apply_emphasis, escape_text, find_keywords, MAX_KEYWORDS};
use super::prosody::{format_percent, format_volume_db, resolve_chunk, Parameter, ResolvedChunk};

const SPEAK_NAMESPACE: &str = "http://www.w3.org/2001/10/synthesis";
const MSTTS_NAMESPACE: &str = "https://www.w3.org/2001/mstts";

/// Результат построения разметки
#[derive(Debug, Clone)]
pub struct MarkupDocument {
    pub document: String,
    pub resolved_chunks: Vec<ResolvedChunk>,
    pub warnings: Vec<PipelineWarning>,
}

/// Длительность паузы после текста по его завершающей пунктуации
pub fn pause_for_text(text: &str) -> Option<&'static str> {
    let trimmed = text
        .trim_end()
        .trim_end_matches(|c: char| matches!(c, '"' | '\'' | '”' | '’' | '»' | ')' | ']'));

    if trimmed.ends_with('…') || trimmed.ends_with("...") {
        Some("400ms")
    } else if trimmed.ends_with('—') {
        Some("350ms")
    } else if trimmed.ends_with(['.', '!', '?']) {
        Some("280ms")
    } else if trimmed.ends_with([',', ';', ':']) {
        Some("220ms")
    } else {
        None
    }
}

/// Построитель разметки.
///
/// Отслеживает единственную открытую область голоса: смена голоса закрывает
/// предыдущий `<voice>` и открывает новый, последний закрывается в конце.
pub struct MarkupBuilder<'a> {
    config: &'a MarkupConfig,
    suppressed: BTreeSet<Parameter>,
}

impl<'a> MarkupBuilder<'a> {
    pub fn new(config: &'a MarkupConfig) -> Self {
        Self {
            config,
            suppressed: BTreeSet::new(),
        }
    }

    /// Не выводить указанные параметры (например, отклоненные движком)
    pub fn with_suppressed(mut self, suppressed: &BTreeSet<Parameter>) -> Self {
        self.suppressed = suppressed.clone();
        self
    }

    fn is_suppressed(&self, parameter: Parameter) -> bool {
        self.suppressed.contains(&parameter)
    }

    /// Разрешить чанк с глобальным индексом `index`
    pub fn resolve(&self, index: usize, chunk: &Chunk, warnings: &mut Vec<PipelineWarning>) -> ResolvedChunk {
        resolve_chunk(index, chunk, self.config, warnings)
    }

    /// Построить документ для всего списка
    pub fn build(&self, chunks: &[Chunk]) -> MarkupDocument {
        self.build_from(0, chunks)
    }

    /// Построить документ для подпоследовательности, начинающейся с чанка `first_index`
    pub fn build_from(&self, first_index: usize, chunks: &[Chunk]) -> MarkupDocument {
        let mut warnings = Vec::new();
        let mut resolved_chunks = Vec::with_capacity(chunks.len());
        let mut body = String::new();
        let mut open_voice: Option<String> = None;

        for (offset, chunk) in chunks.iter().enumerate() {
            let resolved = self.resolve(first_index + offset, chunk, &mut warnings);
            if resolved.content.is_empty() {
                continue;
            }

            if open_voice.as_deref() != Some(resolved.voice.as_str()) {
                if open_voice.is_some() {
                    body.push_str("</voice>");
                }
                body.push_str(&format!("<voice name=\"{}\">", escape_text(&resolved.voice)));
                open_voice = Some(resolved.voice.clone());
            }

            body.push_str(&self.render_chunk(&resolved));
            resolved_chunks.push(resolved);
        }
        if open_voice.is_some() {
            body.push_str("</voice>");
        }

        let document = format!(
            "<speak version=\"1.0\" xmlns=\"{}\" xmlns:mstts=\"{}\" xml:lang=\"{}\">{}</speak>",
            SPEAK_NAMESPACE,
            MSTTS_NAMESPACE,
            escape_text(&self.config.language),
            body
        );

        let length = document.chars().count();
        if length > self.config.max_document_chars {
            log::warn!(
                "SSML length {} exceeded {}; consider chunking input further",
                length,
                self.config.max_document_chars
            );
            warnings.push(PipelineWarning::DocumentTooLong {
                length,
                limit: self.config.max_document_chars,
            });
        }

        MarkupDocument {
            document,
            resolved_chunks,
            warnings,
        }
    }

    fn prosody_attributes(&self, chunk: &ResolvedChunk) -> Vec<String> {
        let mut attrs = Vec::with_capacity(3);
        if !self.is_suppressed(Parameter::Rate) {
            attrs.push(format!("rate=\"{}\"", format_percent(chunk.rate)));
        }
        if !self.is_suppressed(Parameter::Pitch) {
            attrs.push(format!("pitch=\"{}\"", format_percent(chunk.pitch)));
        }
        if !self.is_suppressed(Parameter::Volume) {
            attrs.push(format!("volume=\"{}\"", format_volume_db(chunk.volume)));
        }
        attrs
    }

    /// Тело одного чанка без области голоса
    fn render_chunk(&self, chunk: &ResolvedChunk) -> String {
        let mut text = escape_text(&chunk.content);
        if self.config.auto_emphasis {
            text = apply_emphasis(&text, &find_keywords(&chunk.content, MAX_KEYWORDS));
        }

        let attrs = self.prosody_attributes(chunk);
        let inner = if attrs.is_empty() {
            text
        } else {
            format!("<prosody {}>{}</prosody>", attrs.join(" "), text)
        };

        let mut rendered = match chunk.emotion.as_deref() {
            Some(emotion) if !self.is_suppressed(Parameter::Style) => {
                let degree = if self.is_suppressed(Parameter::StyleDegree) {
                    String::new()
                } else {
                    format!(" styledegree=\"{:.2}\"", chunk.styledegree)
                };
                format!(
                    "<mstts:express-as style=\"{}\"{}>{}</mstts:express-as>",
                    escape_text(emotion),
                    degree,
                    inner
                )
            }
            _ => inner,
        };

        if self.config.auto_pauses {
            if let Some(pause) = pause_for_text(&chunk.content) {
                rendered.push_str(&format!("<break time=\"{}\"/>", pause));
            }
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_config() -> MarkupConfig {
        MarkupConfig {
            auto_emphasis: false,
            auto_pauses: false,
            ..MarkupConfig::default()
        }
    }

    fn voiced(content: &str, voice: &str) -> Chunk {
        let mut chunk = Chunk::new(content);
        chunk.voice = Some(voice.to_string());
        chunk
    }

    #[test]
    fn test_pause_table() {
        assert_eq!(pause_for_text("Wait..."), Some("400ms"));
        assert_eq!(pause_for_text("Wait…"), Some("400ms"));
        assert_eq!(pause_for_text("and then —"), Some("350ms"));
        assert_eq!(pause_for_text("He said \"stop.\""), Some("280ms"));
        assert_eq!(pause_for_text("first,"), Some("220ms"));
        assert_eq!(pause_for_text("no punctuation"), None);
    }

    #[test]
    fn test_single_chunk_document() {
        let config = plain_config();
        let doc = MarkupBuilder::new(&config).build(&[Chunk::new("Fish & chips")]);

        assert_eq!(
            doc.document,
            "<speak version=\"1.0\" xmlns=\"http://www.w3.org/2001/10/synthesis\" \
             xmlns:mstts=\"https://www.w3.org/2001/mstts\" xml:lang=\"en-US\">\
             <voice name=\"en-US-JennyNeural\">\
             <prosody rate=\"+0%\" pitch=\"+0%\" volume=\"+0.0dB\">Fish &amp; chips</prosody>\
             </voice></speak>"
        );
        assert!(doc.warnings.is_empty());
        assert_eq!(doc.resolved_chunks.len(), 1);
    }

    #[test]
    fn test_voice_scope_opens_once_per_run() {
        let config = plain_config();
        let chunks = vec![voiced("one", "A"), voiced("two", "A"), voiced("three", "B"), voiced("four", "A")];
        let doc = MarkupBuilder::new(&config).build(&chunks);

        assert_eq!(doc.document.matches("<voice ").count(), 3);
        assert_eq!(doc.document.matches("</voice>").count(), 3);
        let a = doc.document.find("<voice name=\"A\">").unwrap();
        let b = doc.document.find("<voice name=\"B\">").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_emotion_and_pause() {
        let mut chunk = Chunk::new("Great news!");
        chunk.emotion = Some("cheerful".to_string());
        chunk.intensity = Some(3);
        let config = MarkupConfig {
            auto_emphasis: false,
            ..MarkupConfig::default()
        };
        let doc = MarkupBuilder::new(&config).build(&[chunk]);

        assert!(doc.document.contains(
            "<mstts:express-as style=\"cheerful\" styledegree=\"1.30\"><prosody rate=\"+0%\" pitch=\"+0%\" \
             volume=\"+0.0dB\">Great news!</prosody></mstts:express-as><break time=\"280ms\"/>"
        ));
    }

    #[test]
    fn test_clamp_warning_uses_global_index() {
        let mut chunk = Chunk::new("Fast");
        chunk.speed = Some(75.0);
        let config = plain_config();
        let doc = MarkupBuilder::new(&config).build_from(7, &[chunk]);

        assert!(doc.document.contains("rate=\"+50%\""));
        assert_eq!(doc.warnings.len(), 1);
        assert!(matches!(
            doc.warnings[0],
            PipelineWarning::Clamped { chunk_index: 7, parameter: Parameter::Rate, .. }
        ));
    }

    #[test]
    fn test_suppressed_parameters_are_omitted() {
        let mut chunk = Chunk::new("Calm words");
        chunk.emotion = Some("calm".to_string());
        let config = plain_config();
        let suppressed: BTreeSet<Parameter> =
            [Parameter::Style, Parameter::Rate, Parameter::Pitch, Parameter::Volume].into_iter().collect();
        let doc = MarkupBuilder::new(&config).with_suppressed(&suppressed).build(&[chunk]);

        assert!(!doc.document.contains("express-as"));
        assert!(!doc.document.contains("<prosody"));
        assert!(doc.document.contains("<voice name=\"en-US-JennyNeural\">Calm words</voice>"));
    }

    #[test]
    fn test_long_document_warns_but_is_returned() {
        let config = MarkupConfig {
            max_document_chars: 100,
            ..plain_config()
        };
        let doc = MarkupBuilder::new(&config).build(&[Chunk::new("Some text that is reasonably long")]);

        assert!(doc.document.starts_with("<speak"));
        assert!(matches!(doc.warnings[0], PipelineWarning::DocumentTooLong { limit: 100, .. }));
    }

    #[test]
    fn test_emphasis_in_document() {
        let config = MarkupConfig {
            auto_pauses: false,
            ..MarkupConfig::default()
        };
        let doc = MarkupBuilder::new(&config).build(&[Chunk::new("Tremendous results")]);
        assert!(doc.document.contains(
            "<emphasis level=\"moderate\">Tremendous</emphasis> <emphasis level=\"moderate\">results</emphasis>"
        ));
    }
}
