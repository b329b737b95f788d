//! Language codes and source-language detection.

mod heuristic;
mod llm;

pub use heuristic::HeuristicDetector;
pub use llm::LlmLanguageDetector;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Language code reported when detection gave up.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Supported language codes (ISO 639-1) and their names.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("af", "Afrikaans"),
    ("ar", "Arabic"),
    ("be", "Belarusian"),
    ("bg", "Bulgarian"),
    ("bn", "Bengali"),
    ("bs", "Bosnian"),
    ("ca", "Catalan"),
    ("cs", "Czech"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hr", "Croatian"),
    ("hu", "Hungarian"),
    ("id", "Indonesian"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("mk", "Macedonian"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("sq", "Albanian"),
    ("sr", "Serbian"),
    ("sv", "Swedish"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("vi", "Vietnamese"),
    ("zh", "Chinese"),
];

/// Three-letter (ISO 639-2) aliases accepted by [`parse_language`].
const ALIASES: &[(&str, &str)] = &[
    ("eng", "en"),
    ("rus", "ru"),
    ("srp", "sr"),
    ("deu", "de"),
    ("ger", "de"),
    ("fra", "fr"),
    ("fre", "fr"),
    ("spa", "es"),
    ("ita", "it"),
    ("por", "pt"),
    ("zho", "zh"),
    ("chi", "zh"),
    ("jpn", "ja"),
    ("kor", "ko"),
    ("ara", "ar"),
    ("pol", "pl"),
    ("ukr", "uk"),
    ("ces", "cs"),
    ("cze", "cs"),
    ("slk", "sk"),
    ("slo", "sk"),
    ("hrv", "hr"),
    ("bul", "bg"),
];

/// English name for a supported code.
pub fn language_name(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Checks that `lang` is a supported ISO 639-1 code.
pub fn validate_language(lang: &str) -> Result<()> {
    if language_name(lang).is_some() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "invalid language code: '{lang}'\n\n\
             Valid language codes (ISO 639-1): en, sr, ru, de, fr, ja, zh, ...\n\
             Run 'tomes languages' to see all supported codes."
        )))
    }
}

/// Resolves a code, three-letter alias or English name to a supported code.
pub fn parse_language(input: &str) -> Option<&'static str> {
    let wanted = input.trim().to_lowercase();

    SUPPORTED_LANGUAGES
        .iter()
        .find(|(code, name)| *code == wanted || name.to_lowercase() == wanted)
        .map(|(code, _)| *code)
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == wanted)
                .map(|(_, code)| *code)
        })
}

/// Something that can name the language of a text sample.
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Returns an ISO 639-1 code.
    async fn detect_language(&self, cancel: &CancellationToken, sample: &str) -> Result<String>;
}

/// Tries a primary detector and falls back to script heuristics.
pub struct FallbackDetector {
    primary: Option<Arc<dyn LanguageDetector>>,
    fallback: HeuristicDetector,
}

impl FallbackDetector {
    pub fn new(primary: Option<Arc<dyn LanguageDetector>>) -> Self {
        Self {
            primary,
            fallback: HeuristicDetector,
        }
    }
}

#[async_trait]
impl LanguageDetector for FallbackDetector {
    async fn detect_language(&self, cancel: &CancellationToken, sample: &str) -> Result<String> {
        if let Some(primary) = &self.primary {
            match primary.detect_language(cancel, sample).await {
                Ok(code) => {
                    if let Some(code) = parse_language(&code) {
                        return Ok(code.to_string());
                    }
                    tracing::debug!(code, "primary detector returned an unsupported code");
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => tracing::debug!(error = %e, "primary detector failed, using heuristics"),
            }
        }

        self.fallback.detect_language(cancel, sample).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_language_valid() {
        assert!(validate_language("sr").is_ok());
        assert!(validate_language("en").is_ok());
    }

    #[test]
    fn test_validate_language_invalid() {
        assert!(validate_language("invalid").is_err());
        assert!(validate_language("").is_err());
        assert!(validate_language("EN").is_err());
    }

    #[test]
    fn test_parse_language_forms() {
        assert_eq!(parse_language("Serbian"), Some("sr"));
        assert_eq!(parse_language(" RU "), Some("ru"));
        assert_eq!(parse_language("ger"), Some("de"));
        assert_eq!(parse_language("klingon"), None);
    }

    struct Fixed(Result<String>);

    #[async_trait]
    impl LanguageDetector for Fixed {
        async fn detect_language(&self, _: &CancellationToken, _: &str) -> Result<String> {
            match &self.0 {
                Ok(code) => Ok(code.clone()),
                Err(_) => Err(Error::LanguageDetection("offline".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_fallback_prefers_primary() {
        let detector = FallbackDetector::new(Some(Arc::new(Fixed(Ok("German".into())))));
        let code = detector
            .detect_language(&CancellationToken::new(), "Hello world")
            .await
            .unwrap();
        assert_eq!(code, "de");
    }

    #[tokio::test]
    async fn test_fallback_uses_heuristics_on_failure() {
        let detector =
            FallbackDetector::new(Some(Arc::new(Fixed(Err(Error::LanguageDetection(String::new()))))));
        let code = detector
            .detect_language(&CancellationToken::new(), "Привет, как дела? Это мир.")
            .await
            .unwrap();
        assert_eq!(code, "ru");
    }
}
