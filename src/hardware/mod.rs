//! Host capability detection.
//!
//! A [`Detector`] asks a platform [`Sampler`] for memory, CPU and GPU facts and
//! folds them into a [`HardwareCapabilities`] snapshot. The snapshot's
//! `max_model_size` drives model selection in [`crate::models`].

mod parse;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;

use crate::error::{Error, Result};

pub use parse::{
    parse_cpuinfo_cores, parse_cpuinfo_model, parse_meminfo_field, parse_u64_output,
    parse_vm_stat_available,
};

const GIB: u64 = 1024 * 1024 * 1024;

/// Parameter-count ladder, in billions, used to size the largest runnable model.
const MODEL_SIZE_TIERS: [u64; 6] = [1, 3, 7, 13, 27, 70];

/// GPU acceleration families the detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuKind {
    Metal,
    Cuda,
    Rocm,
    Vulkan,
    OpenCl,
}

impl GpuKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metal => "metal",
            Self::Cuda => "cuda",
            Self::Rocm => "rocm",
            Self::Vulkan => "vulkan",
            Self::OpenCl => "opencl",
        }
    }
}

impl fmt::Display for GpuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of the host's resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareCapabilities {
    pub architecture: String,
    pub total_ram: u64,
    pub available_ram: u64,
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub has_gpu: bool,
    pub gpu_kind: Option<GpuKind>,
    /// Largest model, in parameters, this host is expected to run.
    pub max_model_size: u64,
}

impl HardwareCapabilities {
    /// The most conservative snapshot: no GPU, smallest model tier.
    ///
    /// Used whenever detection fails so callers never assume unlimited capacity.
    pub fn minimal() -> Self {
        Self {
            architecture: std::env::consts::ARCH.to_string(),
            total_ram: 0,
            available_ram: 0,
            cpu_model: "unknown".to_string(),
            cpu_cores: 1,
            has_gpu: false,
            gpu_kind: None,
            max_model_size: MODEL_SIZE_TIERS[0] * 1_000_000_000,
        }
    }

    /// Returns `true` if a model with `params` parameters fits this host.
    pub const fn can_run_model(&self, params: u64) -> bool {
        params <= self.max_model_size
    }
}

impl fmt::Display for HardwareCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hardware Capabilities:")?;
        writeln!(f, "  Architecture: {}", self.architecture)?;
        writeln!(f, "  CPU: {} ({} cores)", self.cpu_model, self.cpu_cores)?;
        writeln!(
            f,
            "  RAM: {:.1} GB total, {:.1} GB available",
            self.total_ram as f64 / GIB as f64,
            self.available_ram as f64 / GIB as f64
        )?;
        match self.gpu_kind {
            Some(kind) if self.has_gpu => writeln!(f, "  GPU: {kind} acceleration")?,
            _ => writeln!(f, "  GPU: None")?,
        }
        write!(
            f,
            "  Max model size: {}B parameters",
            self.max_model_size / 1_000_000_000
        )
    }
}

/// Derives the largest runnable parameter count from usable RAM.
///
/// RAM is divided by an efficiency divisor (2.0 on CPU, 1.5 with a GPU) and the
/// result, in GiB, is matched against the tier ladder at one GiB per billion
/// parameters. Below the first tier the first tier is returned; above the last
/// the last one is.
pub fn calculate_max_model_size(ram: u64, has_gpu: bool) -> u64 {
    let divisor = if has_gpu { 1.5 } else { 2.0 };
    let effective_gib = ram as f64 / divisor / GIB as f64;

    let tier = MODEL_SIZE_TIERS
        .iter()
        .rev()
        .find(|&&tier| effective_gib >= tier as f64)
        .copied()
        .unwrap_or(MODEL_SIZE_TIERS[0]);

    tier * 1_000_000_000
}

/// Platform-specific source of raw hardware facts.
pub trait Sampler: Send + Sync {
    fn total_ram(&self) -> Result<u64>;
    fn available_ram(&self) -> Result<u64>;
    fn cpu_model(&self) -> Result<String>;
    fn cpu_cores(&self) -> Result<usize>;
    /// `Ok(None)` means the sampler ran and found no usable GPU.
    fn gpu(&self) -> Result<Option<GpuKind>>;
}

#[cfg(target_os = "linux")]
use linux::PlatformSampler;
#[cfg(target_os = "macos")]
use macos::PlatformSampler;
#[cfg(target_os = "windows")]
use windows::PlatformSampler;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
struct PlatformSampler;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
impl Sampler for PlatformSampler {
    fn total_ram(&self) -> Result<u64> {
        Err(unsupported())
    }
    fn available_ram(&self) -> Result<u64> {
        Err(unsupported())
    }
    fn cpu_model(&self) -> Result<String> {
        Err(unsupported())
    }
    fn cpu_cores(&self) -> Result<usize> {
        Err(unsupported())
    }
    fn gpu(&self) -> Result<Option<GpuKind>> {
        Err(unsupported())
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn unsupported() -> Error {
    Error::Detection(format!(
        "unsupported operating system: {}",
        std::env::consts::OS
    ))
}

/// Hardware detector over a [`Sampler`].
pub struct Detector {
    sampler: Box<dyn Sampler>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Creates a detector for the host operating system.
    pub fn new() -> Self {
        Self {
            sampler: Box::new(PlatformSampler),
        }
    }

    pub fn with_sampler(sampler: Box<dyn Sampler>) -> Self {
        Self { sampler }
    }

    /// Detects the host's capabilities.
    ///
    /// Either every field is populated or the whole call fails.
    pub fn detect(&self) -> Result<HardwareCapabilities> {
        let total_ram = self.sampler.total_ram()?;
        let available_ram = self.sampler.available_ram()?;
        let cpu_model = self.sampler.cpu_model()?;
        let cpu_cores = self.sampler.cpu_cores()?;
        let gpu_kind = self.sampler.gpu()?;

        if total_ram == 0 {
            return Err(Error::Detection("total RAM reported as zero".to_string()));
        }
        if cpu_cores == 0 {
            return Err(Error::Detection("CPU core count reported as zero".to_string()));
        }

        // Total and available are read at different instants.
        let available_ram = available_ram.min(total_ram);
        let has_gpu = gpu_kind.is_some();

        let caps = HardwareCapabilities {
            architecture: std::env::consts::ARCH.to_string(),
            total_ram,
            available_ram,
            cpu_model,
            cpu_cores,
            has_gpu,
            gpu_kind,
            max_model_size: calculate_max_model_size(available_ram, has_gpu),
        };

        tracing::debug!(
            total_ram = caps.total_ram,
            available_ram = caps.available_ram,
            gpu = ?caps.gpu_kind,
            max_model_size = caps.max_model_size,
            "hardware detected"
        );

        Ok(caps)
    }

    /// Like [`Detector::detect`], falling back to [`HardwareCapabilities::minimal`].
    pub fn detect_or_minimal(&self) -> HardwareCapabilities {
        self.detect().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "hardware detection failed, assuming minimal capability");
            HardwareCapabilities::minimal()
        })
    }
}

/// Runs an external command and returns its trimmed stdout.
pub(crate) fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| Error::Detection(format!("failed to run {program}: {e}")))?;

    if !output.status.success() {
        return Err(Error::Detection(format!(
            "{program} exited with status {}",
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
