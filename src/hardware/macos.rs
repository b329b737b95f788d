//! macOS sampler: `sysctl` and `vm_stat`. Apple Silicon always has Metal.

use super::{GpuKind, Sampler, parse, run_command};
use crate::error::{Error, Result};

pub struct PlatformSampler;

impl Sampler for PlatformSampler {
    fn total_ram(&self) -> Result<u64> {
        parse::parse_u64_output(&run_command("sysctl", &["-n", "hw.memsize"])?)
    }

    fn available_ram(&self) -> Result<u64> {
        parse::parse_vm_stat_available(&run_command("vm_stat", &[])?)
    }

    fn cpu_model(&self) -> Result<String> {
        let model = run_command("sysctl", &["-n", "machdep.cpu.brand_string"])?;
        if model.is_empty() {
            return Err(Error::Detection("empty CPU brand string".to_string()));
        }
        Ok(model)
    }

    fn cpu_cores(&self) -> Result<usize> {
        let cores = parse::parse_u64_output(&run_command("sysctl", &["-n", "hw.physicalcpu"])?)?;
        Ok(cores as usize)
    }

    fn gpu(&self) -> Result<Option<GpuKind>> {
        if std::env::consts::ARCH == "aarch64" {
            return Ok(Some(GpuKind::Metal));
        }
        let displays = run_command("system_profiler", &["SPDisplaysDataType"])?;
        Ok(displays.contains("Metal").then_some(GpuKind::Metal))
    }
}
