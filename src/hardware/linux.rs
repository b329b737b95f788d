//! Linux sampler: `/proc` for memory and CPU, driver nodes for the GPU.

use std::fs;
use std::path::Path;

use super::{GpuKind, Sampler, parse, run_command};
use crate::error::{Error, Result};

pub struct PlatformSampler;

fn read_proc(path: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::Detection(format!("failed to read {path}: {e}")))
}

impl Sampler for PlatformSampler {
    fn total_ram(&self) -> Result<u64> {
        parse::parse_meminfo_field(&read_proc("/proc/meminfo")?, "MemTotal")
    }

    fn available_ram(&self) -> Result<u64> {
        parse::parse_meminfo_field(&read_proc("/proc/meminfo")?, "MemAvailable")
    }

    fn cpu_model(&self) -> Result<String> {
        parse::parse_cpuinfo_model(&read_proc("/proc/cpuinfo")?)
    }

    fn cpu_cores(&self) -> Result<usize> {
        parse::parse_cpuinfo_cores(&read_proc("/proc/cpuinfo")?)
    }

    fn gpu(&self) -> Result<Option<GpuKind>> {
        if Path::new("/proc/driver/nvidia/version").exists()
            || run_command("nvidia-smi", &["-L"]).is_ok()
        {
            return Ok(Some(GpuKind::Cuda));
        }
        if Path::new("/dev/kfd").exists() {
            return Ok(Some(GpuKind::Rocm));
        }
        if Path::new("/dev/dri/renderD128").exists() {
            return Ok(Some(GpuKind::Vulkan));
        }
        Ok(None)
    }
}
