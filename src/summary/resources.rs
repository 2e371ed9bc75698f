//! Per-language system prompts and glossaries for summaries.
//!
//! A resources directory looks like:
//!
//! ```text
//! summarization/
//!   system_prompt_en.txt
//!   system_prompt_simple_ru.txt
//!   glossary/
//!     glossary_en.txt
//! ```
//!
//! Built-in prompts cover English and Russian; files override them and add
//! languages.

use crate::error::{Result, ScribeError};
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (
        "en",
        "You summarize transcripts of talks, meetings and interviews. Write the summary in English. \
         Start with a one-paragraph overview, then list the key points, decisions and action items. \
         Stay faithful to the transcript and do not invent details. Transcripts may contain \
         recognition errors and bracketed gaps where audio could not be transcribed; mention a gap \
         only if it hides something important.",
    ),
    (
        "ru",
        "Ты составляешь краткое изложение расшифровок выступлений, встреч и интервью. Пиши на русском языке. \
         Начни с краткого обзора в одном абзаце, затем перечисли ключевые тезисы, решения и задачи. \
         Не добавляй того, чего нет в расшифровке. В тексте возможны ошибки распознавания и пропуски \
         в квадратных скобках; упоминай пропуск, только если он скрывает что-то важное.",
    ),
];

/// System prompts and glossaries keyed by language code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryResources {
    prompts: BTreeMap<String, String>,
    glossaries: BTreeMap<String, String>,
}

impl Default for SummaryResources {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SummaryResources {
    /// Only the built-in prompts, no glossaries.
    pub fn builtin() -> Self {
        Self {
            prompts: BUILTIN_PROMPTS
                .iter()
                .map(|(lang, prompt)| (lang.to_string(), prompt.to_string()))
                .collect(),
            glossaries: BTreeMap::new(),
        }
    }

    /// Built-ins overlaid with whatever `dir` holds. A missing directory
    /// leaves the built-ins alone.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut resources = Self::builtin();
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "no summary resources directory");
            return Ok(resources);
        }

        for (lang, text) in read_keyed_files(dir, prompt_language)? {
            tracing::info!(language = %lang, "loaded summary prompt");
            resources.prompts.insert(lang, text);
        }
        let glossary_dir = dir.join("glossary");
        if glossary_dir.is_dir() {
            for (lang, text) in read_keyed_files(&glossary_dir, glossary_language)? {
                tracing::info!(language = %lang, "loaded glossary");
                resources.glossaries.insert(lang, text);
            }
        }
        Ok(resources)
    }

    pub fn with_prompt(mut self, language: &str, prompt: &str) -> Self {
        self.prompts.insert(language.to_string(), prompt.to_string());
        self
    }

    pub fn with_glossary(mut self, language: &str, glossary: &str) -> Self {
        self.glossaries.insert(language.to_string(), glossary.to_string());
        self
    }

    /// Languages with a system prompt, sorted.
    pub fn languages(&self) -> Vec<&str> {
        self.prompts.keys().map(String::as_str).collect()
    }

    /// The system prompt for `language`, with its glossary appended when
    /// there is one.
    pub fn system_prompt(&self, language: &str) -> Result<String> {
        let prompt = self
            .prompts
            .get(language)
            .ok_or_else(|| ScribeError::UnsupportedSummaryLanguage {
                language: language.to_string(),
                supported: self.languages().join(", "),
            })?;
        Ok(match self.glossaries.get(language) {
            Some(glossary) => format!("{}\n\nGLOSSARY:\n{}", prompt, glossary),
            None => prompt.clone(),
        })
    }
}

/// `system_prompt_en.txt` and `system_prompt_simple_en.txt` both map to `en`.
fn prompt_language(file_name: &str) -> Option<String> {
    let rest = file_name.strip_prefix("system_prompt_")?.strip_suffix(".txt")?;
    let lang = rest.strip_prefix("simple_").unwrap_or(rest);
    (!lang.is_empty()).then(|| lang.to_string())
}

fn glossary_language(file_name: &str) -> Option<String> {
    let lang = file_name.strip_prefix("glossary_")?.strip_suffix(".txt")?;
    (!lang.is_empty()).then(|| lang.to_string())
}

/// Reads every file in `dir` whose name `key` accepts. Blank files are skipped.
fn read_keyed_files(dir: &Path, key: fn(&str) -> Option<String>) -> Result<Vec<(String, String)>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Some(lang) = entry.file_name().to_str().and_then(key) else {
            continue;
        };
        let text = std::fs::read_to_string(entry.path())?;
        let text = text.trim();
        if !text.is_empty() {
            found.push((lang, text.to_string()));
        }
    }
    found.sort();
    Ok(found)
}
