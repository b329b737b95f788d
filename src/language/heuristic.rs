//! Script and marker-letter heuristics.
//!
//! Good enough to tell Cyrillic languages apart and to catch the common
//! European, CJK and Arabic cases. Anything ambiguous is reported as English.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::LanguageDetector;
use crate::error::{Error, Result};

const SAMPLE_CHARS: usize = 1000;

/// Offline detector based on Unicode ranges and marker letters.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDetector;

#[async_trait]
impl LanguageDetector for HeuristicDetector {
    async fn detect_language(&self, cancel: &CancellationToken, sample: &str) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(Self::detect(sample).to_string())
    }
}

#[derive(Default)]
struct ScriptCounts {
    cyrillic: usize,
    latin: usize,
    cjk: usize,
    arabic: usize,
}

const fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{052F}')
}

const fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic()
        || (matches!(c, '\u{00C0}'..='\u{024F}') && c != '\u{00D7}' && c != '\u{00F7}')
        || matches!(c, '\u{1E00}'..='\u{1EFF}')
}

const fn is_hiragana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}')
}

const fn is_katakana(c: char) -> bool {
    matches!(c, '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}')
}

const fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

const fn is_han(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

const fn is_arabic(c: char) -> bool {
    matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}')
}

fn ratio(part: usize, total: usize) -> f64 {
    part as f64 / total as f64
}

fn count_words(words: &[String], needles: &[&str]) -> usize {
    words.iter().filter(|w| needles.contains(&w.as_str())).count()
}

fn lowercase_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl HeuristicDetector {
    /// Detects the dominant language of `text`, defaulting to `"en"`.
    pub fn detect(text: &str) -> &'static str {
        let sample = crate::document::sample(text, SAMPLE_CHARS);

        let mut counts = ScriptCounts::default();
        for c in sample.chars() {
            if is_cyrillic(c) {
                counts.cyrillic += 1;
            } else if is_latin(c) {
                counts.latin += 1;
            } else if is_han(c) || is_hiragana(c) || is_katakana(c) || is_hangul(c) {
                counts.cjk += 1;
            } else if is_arabic(c) {
                counts.arabic += 1;
            }
        }

        let total = counts.cyrillic + counts.latin + counts.cjk + counts.arabic;
        if total == 0 {
            return "en";
        }

        if ratio(counts.cjk, total) > 0.3 {
            return detect_cjk(sample);
        }
        if ratio(counts.arabic, total) > 0.3 {
            return "ar";
        }
        // Cyrillic must clearly outweigh Latin in mixed text.
        if ratio(counts.cyrillic, total) > 0.3 && counts.cyrillic as f64 > counts.latin as f64 * 1.2
        {
            return detect_cyrillic(sample);
        }

        detect_latin(sample)
    }
}

fn detect_cjk(sample: &str) -> &'static str {
    let (mut kana, mut hangul, mut all) = (0usize, 0usize, 0usize);
    for c in sample.chars() {
        if is_hiragana(c) || is_katakana(c) {
            kana += 1;
            all += 1;
        } else if is_hangul(c) {
            hangul += 1;
            all += 1;
        } else if is_han(c) {
            all += 1;
        }
    }

    if all == 0 {
        "zh"
    } else if ratio(hangul, all) > 0.3 {
        "ko"
    } else if ratio(kana, all) > 0.2 {
        "ja"
    } else {
        "zh"
    }
}

fn detect_cyrillic(sample: &str) -> &'static str {
    let lower = sample.to_lowercase();
    let words = lowercase_words(&lower);

    let (mut ru, mut sr, mut uk, mut bg) = (0usize, 0usize, 0usize, 0usize);
    for c in lower.chars() {
        match c {
            'ё' | 'ы' | 'э' => ru += 20,
            'ђ' | 'ћ' | 'љ' | 'њ' | 'џ' | 'ј' => sr += 20,
            'є' | 'ї' | 'ґ' | 'і' => uk += 20,
            'ъ' => bg += 20,
            _ => {}
        }
    }

    ru += 5 * count_words(&words, &["что", "это", "как", "дела", "привет", "мир", "он", "она"]);
    sr += 5 * count_words(&words, &["сам", "за", "се", "свет", "свете", "здраво", "није", "али"]);
    uk += 5 * count_words(&words, &["та", "це", "привіт", "дякую", "що", "як"]);
    bg += 5 * count_words(&words, &["човек", "този", "тази", "че", "здравей", "свят"]);

    let mut best = ("ru", ru);
    for (code, score) in [("sr", sr), ("uk", uk), ("bg", bg)] {
        if score > best.1 {
            best = (code, score);
        }
    }
    best.0
}

fn detect_latin(sample: &str) -> &'static str {
    let lower = sample.to_lowercase();
    let words = lowercase_words(&lower);

    // Order matters for ties: earlier entries win.
    let mut scores: [(&str, usize); 9] = [
        ("es", 0),
        ("fr", 0),
        ("de", 0),
        ("it", 0),
        ("pt", 0),
        ("pl", 0),
        ("cs", 0),
        ("sk", 0),
        ("hr", 0),
    ];
    let mut add = |code: &str, points: usize| {
        if let Some(entry) = scores.iter_mut().find(|(c, _)| *c == code) {
            entry.1 += points;
        }
    };

    for c in lower.chars() {
        match c {
            'ñ' | '¿' | '¡' => add("es", 15),
            'â' | 'æ' | 'ç' | 'ê' | 'ë' | 'î' | 'ï' | 'û' | 'ÿ' | 'œ' => add("fr", 15),
            'ß' => add("de", 15),
            'ã' | 'õ' => add("pt", 15),
            'ą' | 'ę' | 'ł' | 'ń' | 'ś' | 'ź' | 'ż' => add("pl", 15),
            'ě' | 'ň' | 'ř' | 'ů' => add("cs", 15),
            'ĺ' | 'ľ' | 'ŕ' | 'ô' => add("sk", 15),
            'đ' => add("hr", 15),
            'č' | 'š' | 'ž' => {
                add("cs", 5);
                add("sk", 5);
                add("hr", 5);
            }
            'ä' | 'ö' | 'ü' => add("de", 10),
            'á' | 'é' | 'í' | 'ó' | 'ú' => {
                add("es", 3);
                add("pt", 3);
                add("cs", 3);
                add("sk", 3);
            }
            'à' | 'è' | 'ì' | 'ò' | 'ù' => {
                add("fr", 3);
                add("it", 3);
            }
            _ => {}
        }
    }

    let vocab: [(&str, &[&str]); 9] = [
        ("es", &["hola", "mundo", "gracias", "bueno", "el", "los", "está", "donde", "dónde"]),
        ("fr", &["bonjour", "monde", "merci", "oui", "le", "les", "est", "une", "avec"]),
        ("de", &["hallo", "welt", "danke", "nein", "der", "die", "das", "und", "ist"]),
        ("it", &["ciao", "mondo", "grazie", "sì", "il", "gli", "della", "sono"]),
        ("pt", &["olá", "obrigado", "sim", "não", "você", "uma", "muito"]),
        ("pl", &["witaj", "świecie", "dziękuję", "jest", "nie", "się"]),
        ("cs", &["děkuji", "ahoj", "jsem", "není"]),
        ("sk", &["ďakujem", "deň", "dobrý", "som"]),
        ("hr", &["bok", "svijetu", "hvala", "sam", "je"]),
    ];
    for (code, needles) in vocab {
        add(code, 25 * count_words(&words, needles));
    }

    let mut best = ("en", 0usize);
    for (code, score) in scores {
        if score >= 5 && score > best.1 {
            best = (code, score);
        }
    }
    best.0
}
