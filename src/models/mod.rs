//! Model catalog and hardware-constrained selection.

mod catalog;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::hardware::{Detector, HardwareCapabilities};

const GIB: u64 = 1024 * 1024 * 1024;

/// Quality rating of a model's translations, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Moderate,
    Good,
    Excellent,
}

impl QualityTier {
    const fn score(self) -> u32 {
        match self {
            Self::Moderate => 4,
            Self::Good => 7,
            Self::Excellent => 10,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Moderate => "moderate",
            Self::Good => "good",
            Self::Excellent => "excellent",
        })
    }
}

/// What a model was tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    /// Trained or tuned specifically for translation.
    DedicatedTranslation,
    /// General instruction model that advertises translation ability.
    GeneralWithTranslation,
    General,
}

impl Specialization {
    const fn score(self) -> u32 {
        match self {
            Self::DedicatedTranslation => 8,
            Self::GeneralWithTranslation => 4,
            Self::General => 0,
        }
    }

    pub const fn is_translation(self) -> bool {
        !matches!(self, Self::General)
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Parameter count.
    pub parameters: u64,
    /// Bytes needed to load the model at all.
    pub min_ram: u64,
    /// Bytes needed to run it comfortably.
    pub recommended_ram: u64,
    pub quantization: String,
    pub languages: BTreeSet<String>,
    pub specialization: Specialization,
    pub quality: QualityTier,
    pub license: String,
    pub source_url: String,
    pub requires_gpu: bool,
    /// Maximum context, in tokens.
    pub context_length: u32,
}

impl ModelDescriptor {
    pub fn supports_language(&self, code: &str) -> bool {
        self.languages.contains(code)
    }

    fn fits(&self, max_ram: u64, has_gpu: bool) -> bool {
        self.min_ram <= max_ram && (!self.requires_gpu || has_gpu)
    }
}

static DEFAULT_CATALOG: LazyLock<ModelRegistry> = LazyLock::new(ModelRegistry::with_default_models);

/// Catalog of candidate models, keyed and iterated by id.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelDescriptor>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in catalog.
    pub fn with_default_models() -> Self {
        let models = catalog::default_models()
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        Self { models }
    }

    /// Shared, immutable built-in catalog.
    pub fn default_catalog() -> &'static Self {
        &DEFAULT_CATALOG
    }

    /// Adds a model. Ids are unique.
    pub fn register(&mut self, model: ModelDescriptor) -> Result<()> {
        if self.models.contains_key(&model.id) {
            return Err(Error::Config(format!("duplicate model id: {}", model.id)));
        }
        self.models.insert(model.id.clone(), model);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.get(id)
    }

    /// All models in id order.
    pub fn list(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Picks the highest-scoring model that fits in `max_ram` bytes.
    ///
    /// GPU-only models are skipped unless `has_gpu`. Equal scores go to the
    /// model with the smallest id.
    pub fn find_best_model<S: AsRef<str>>(
        &self,
        max_ram: u64,
        preferred_languages: &[S],
        has_gpu: bool,
    ) -> Result<&ModelDescriptor> {
        let mut best: Option<(&ModelDescriptor, u32)> = None;

        for model in self.models.values().filter(|m| m.fits(max_ram, has_gpu)) {
            let score = Self::score_model(model, preferred_languages, max_ram);
            tracing::trace!(model = %model.id, score, "scored model");
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((model, score));
            }
        }

        best.map(|(model, _)| model)
            .ok_or(Error::NoModelFits { max_ram })
    }

    /// The model with the smallest RAM floor that needs no GPU.
    ///
    /// Models covering every one of `languages` are preferred when any exist.
    /// Ties go to the smallest id.
    pub fn most_conservative<S: AsRef<str>>(&self, languages: &[S]) -> Result<&ModelDescriptor> {
        let cpu: Vec<&ModelDescriptor> = self.models.values().filter(|m| !m.requires_gpu).collect();
        let covering: Vec<&ModelDescriptor> = cpu
            .iter()
            .copied()
            .filter(|m| languages.iter().all(|l| m.supports_language(l.as_ref())))
            .collect();
        let pool = if covering.is_empty() { cpu } else { covering };

        pool.into_iter()
            .min_by(|a, b| a.min_ram.cmp(&b.min_ram).then_with(|| a.id.cmp(&b.id)))
            .ok_or(Error::NoModelFits { max_ram: 0 })
    }

    /// Scores a model for the given languages and RAM ceiling.
    pub fn score_model<S: AsRef<str>>(
        model: &ModelDescriptor,
        preferred_languages: &[S],
        max_ram: u64,
    ) -> u32 {
        let mut score = model.quality.score() + model.specialization.score();

        let supported = preferred_languages
            .iter()
            .filter(|lang| model.supports_language(lang.as_ref()))
            .count() as u32;
        score += supported * 2;

        // Compare ratios in integers: recommended / max <= 0.6 and <= 0.8.
        let recommended = u128::from(model.recommended_ram) * 10;
        let ceiling = u128::from(max_ram);
        if recommended <= ceiling * 6 {
            score += 3;
        } else if recommended <= ceiling * 8 {
            score += 1;
        }

        let billions = model.parameters as f64 / 1_000_000_000.0;
        if (7.0..=14.0).contains(&billions) {
            score += 2;
        } else if billions > 14.0 {
            score += 1;
        }

        if model.context_length >= 8192 {
            score += 1;
        }

        score
    }

    /// Models that support every one of `languages`.
    pub fn filter_by_languages<S: AsRef<str>>(&self, languages: &[S]) -> Vec<&ModelDescriptor> {
        self.models
            .values()
            .filter(|m| languages.iter().all(|l| m.supports_language(l.as_ref())))
            .collect()
    }

    /// Models whose minimum RAM fits in `max_ram` bytes.
    pub fn filter_by_ram(&self, max_ram: u64) -> Vec<&ModelDescriptor> {
        self.models
            .values()
            .filter(|m| m.min_ram <= max_ram)
            .collect()
    }

    /// Suggestions for a machine with `ram_gib` of memory.
    ///
    /// Translation-tuned models come first; general ones pad the list up to three.
    pub fn recommendations_for_hardware(&self, ram_gib: f64, has_gpu: bool) -> Vec<&ModelDescriptor> {
        let ram = (ram_gib * GIB as f64) as u64;
        let candidates: Vec<_> = self
            .models
            .values()
            .filter(|m| m.fits(ram, has_gpu))
            .collect();

        let mut picks: Vec<&ModelDescriptor> = candidates
            .iter()
            .copied()
            .filter(|m| m.specialization.is_translation())
            .collect();

        if picks.len() < 3 {
            for model in candidates {
                if !picks.iter().any(|p| p.id == model.id) {
                    picks.push(model);
                }
            }
        }

        picks
    }
}

/// Detects the host and picks the best model for it.
///
/// When detection fails the host is taken as minimal and the most
/// conservative CPU model is chosen instead.
pub fn select_for_host<'r, S: AsRef<str>>(
    detector: &Detector,
    registry: &'r ModelRegistry,
    languages: &[S],
) -> Result<(HardwareCapabilities, &'r ModelDescriptor)> {
    let (caps, model) = match detector.detect() {
        Ok(caps) => {
            let model = registry.find_best_model(caps.available_ram, languages, caps.has_gpu)?;
            (caps, model)
        }
        Err(e) => {
            tracing::warn!(error = %e, "hardware detection failed, using the smallest model");
            (HardwareCapabilities::minimal(), registry.most_conservative(languages)?)
        }
    };

    tracing::info!(
        model = %model.id,
        available_ram = caps.available_ram,
        has_gpu = caps.has_gpu,
        "selected model for host"
    );

    Ok((caps, model))
}
