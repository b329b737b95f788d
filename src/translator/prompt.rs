use crate::language::{UNKNOWN_LANGUAGE, language_name};

use super::UnitKind;

pub const SYSTEM_PROMPT_TEMPLATE: &str = "You are a professional literary translator. \
     Translate the following {unit} {source_clause}to {target_language}. \
     Output only the translated text without any explanations. \
     Preserve the original formatting including blank lines and whitespace.";

/// Prompt used to ask a model which language a sample is written in.
pub const DETECTION_PROMPT: &str = "Identify the language of the text the user sends. \
     Respond with ONLY the ISO 639-1 language code (for example \"en\", \"ru\", \"sr\"). \
     Do not include any explanation.";

fn display_name(code: &str) -> &str {
    language_name(code).unwrap_or(code)
}

#[allow(clippy::literal_string_with_formatting_args)]
pub fn build_system_prompt(source_language: &str, target_language: &str, unit: UnitKind) -> String {
    // Placeholders are replaced by hand, not format arguments.
    let source_clause = if source_language.is_empty() || source_language == UNKNOWN_LANGUAGE {
        String::new()
    } else {
        format!("from {} ", display_name(source_language))
    };

    SYSTEM_PROMPT_TEMPLATE
        .replace("{unit}", unit.as_str())
        .replace("{source_clause}", &source_clause)
        .replace("{target_language}", display_name(target_language))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_both_languages() {
        let prompt = build_system_prompt("en", "sr", UnitKind::ChapterTitle);
        assert!(prompt.contains("chapter title from English to Serbian"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_prompt_without_known_source() {
        let prompt = build_system_prompt(UNKNOWN_LANGUAGE, "ru", UnitKind::SectionContent);
        assert!(prompt.contains("section content to Russian"));
        assert!(!prompt.contains("from"));
    }

    #[test]
    fn test_unlisted_code_passes_through() {
        let prompt = build_system_prompt("en", "tlh", UnitKind::BookTitle);
        assert!(prompt.contains("to tlh"));
    }
}
