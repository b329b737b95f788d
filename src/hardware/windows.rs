//! Windows sampler: CIM queries through PowerShell.

use super::{GpuKind, Sampler, parse, run_command};
use crate::error::{Error, Result};

pub struct PlatformSampler;

fn powershell(query: &str) -> Result<String> {
    run_command("powershell", &["-NoProfile", "-Command", query])
}

impl Sampler for PlatformSampler {
    fn total_ram(&self) -> Result<u64> {
        parse::parse_u64_output(&powershell(
            "(Get-CimInstance -ClassName Win32_ComputerSystem).TotalPhysicalMemory",
        )?)
    }

    fn available_ram(&self) -> Result<u64> {
        // FreePhysicalMemory is reported in KiB.
        let kib = parse::parse_u64_output(&powershell(
            "(Get-CimInstance -ClassName Win32_OperatingSystem).FreePhysicalMemory",
        )?)?;
        parse::kib_to_bytes(kib, "FreePhysicalMemory")
    }

    fn cpu_model(&self) -> Result<String> {
        let name = powershell("(Get-CimInstance -ClassName Win32_Processor).Name")?;
        name.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::Detection("empty processor name".to_string()))
    }

    fn cpu_cores(&self) -> Result<usize> {
        // One line per socket.
        let output = powershell("(Get-CimInstance -ClassName Win32_Processor).NumberOfCores")?;
        let mut total = 0;
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            total += parse::parse_u64_output(line)?;
        }
        Ok(total as usize)
    }

    fn gpu(&self) -> Result<Option<GpuKind>> {
        let names = powershell("(Get-CimInstance -ClassName Win32_VideoController).Name")?
            .to_lowercase();
        if names.contains("nvidia") {
            Ok(Some(GpuKind::Cuda))
        } else if names.contains("radeon") || names.contains("amd") {
            Ok(Some(GpuKind::Rocm))
        } else if names.contains("intel") && names.contains("arc") {
            Ok(Some(GpuKind::Vulkan))
        } else {
            Ok(None)
        }
    }
}
