//! Built-in model catalog.
//!
//! All entries are GGUF Q4 builds runnable on CPU. RAM figures are for the
//! quantized weights plus a working context.

use super::{ModelDescriptor, QualityTier, Specialization};

const GIB: u64 = 1024 * 1024 * 1024;

const QWEN_LANGS: &[&str] = &["en", "ru", "sr", "zh", "ja", "ko", "de", "es", "fr"];

pub(super) fn default_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor {
            id: "qwen2.5-7b-instruct-q4".to_string(),
            name: "Qwen 2.5 7B Instruct (Q4)".to_string(),
            description: "Multilingual model with strong Russian and Serbian support".to_string(),
            parameters: 7_000_000_000,
            min_ram: 6 * GIB,
            recommended_ram: 8 * GIB,
            quantization: "Q4_K_M".to_string(),
            languages: langs(QWEN_LANGS),
            specialization: Specialization::GeneralWithTranslation,
            quality: QualityTier::Excellent,
            license: "Apache-2.0".to_string(),
            source_url: "https://huggingface.co/bartowski/Qwen2.5-7B-Instruct-GGUF".to_string(),
            requires_gpu: false,
            context_length: 32768,
        },
        ModelDescriptor {
            id: "mistral-7b-instruct-q4".to_string(),
            name: "Mistral 7B Instruct v0.3 (Q4)".to_string(),
            description: "General-purpose model with good translation".to_string(),
            parameters: 7_000_000_000,
            min_ram: 6 * GIB,
            recommended_ram: 8 * GIB,
            quantization: "Q4_K_M".to_string(),
            languages: langs(&["en", "ru", "de", "es", "fr", "it"]),
            specialization: Specialization::GeneralWithTranslation,
            quality: QualityTier::Good,
            license: "Apache-2.0".to_string(),
            source_url: "https://huggingface.co/mistralai/Mistral-7B-Instruct-v0.3-GGUF"
                .to_string(),
            requires_gpu: false,
            context_length: 8192,
        },
        ModelDescriptor {
            id: "qwen2.5-14b-instruct-q4".to_string(),
            name: "Qwen 2.5 14B Instruct (Q4)".to_string(),
            description: "Larger model for high-quality translation on capable systems"
                .to_string(),
            parameters: 14_000_000_000,
            min_ram: 12 * GIB,
            recommended_ram: 16 * GIB,
            quantization: "Q4_K_M".to_string(),
            languages: langs(QWEN_LANGS),
            specialization: Specialization::GeneralWithTranslation,
            quality: QualityTier::Excellent,
            license: "Apache-2.0".to_string(),
            source_url: "https://huggingface.co/Qwen/Qwen2.5-14B-Instruct-GGUF".to_string(),
            requires_gpu: false,
            context_length: 32768,
        },
        ModelDescriptor {
            id: "qwen2.5-27b-instruct-q4".to_string(),
            name: "Qwen 2.5 27B Instruct (Q4)".to_string(),
            description: "Professional-grade translation for systems with 32GB+ RAM".to_string(),
            parameters: 27_000_000_000,
            min_ram: 24 * GIB,
            recommended_ram: 32 * GIB,
            quantization: "Q4_K_M".to_string(),
            languages: langs(QWEN_LANGS),
            specialization: Specialization::DedicatedTranslation,
            quality: QualityTier::Excellent,
            license: "Apache-2.0".to_string(),
            source_url: "https://huggingface.co/Qwen/Qwen2.5-27B-Instruct-GGUF".to_string(),
            requires_gpu: false,
            context_length: 32768,
        },
        ModelDescriptor {
            id: "phi-3-mini-4k-q4".to_string(),
            name: "Phi-3 Mini 3.8B (Q4)".to_string(),
            description: "Compact model for resource-constrained systems".to_string(),
            parameters: 3_800_000_000,
            min_ram: 4 * GIB,
            recommended_ram: 6 * GIB,
            quantization: "Q4_K_M".to_string(),
            languages: langs(&["en", "ru", "de", "es", "fr"]),
            specialization: Specialization::GeneralWithTranslation,
            quality: QualityTier::Moderate,
            license: "MIT".to_string(),
            source_url: "https://huggingface.co/microsoft/Phi-3-mini-4k-instruct-gguf".to_string(),
            requires_gpu: false,
            context_length: 4096,
        },
        ModelDescriptor {
            id: "gemma-2-9b-it-q4".to_string(),
            name: "Gemma 2 9B Instruct (Q4)".to_string(),
            description: "Google's efficient multilingual model".to_string(),
            parameters: 9_000_000_000,
            min_ram: 8 * GIB,
            recommended_ram: 12 * GIB,
            quantization: "Q4_K_M".to_string(),
            languages: langs(&["en", "ru", "de", "es", "fr", "it", "pt", "zh", "ja", "ko"]),
            specialization: Specialization::GeneralWithTranslation,
            quality: QualityTier::Good,
            license: "Gemma".to_string(),
            source_url: "https://huggingface.co/google/gemma-2-9b-it-GGUF".to_string(),
            requires_gpu: false,
            context_length: 8192,
        },
    ]
}

fn langs(codes: &[&str]) -> std::collections::BTreeSet<String> {
    codes.iter().map(|c| (*c).to_string()).collect()
}
