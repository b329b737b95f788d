//! Parsers for the text that platform tools print.
//!
//! Kept free of I/O so they can be tested on any host.

use crate::error::{Error, Result};

/// Reads a `Key:   12345 kB` line from `/proc/meminfo` and returns bytes.
pub fn parse_meminfo_field(meminfo: &str, field: &str) -> Result<u64> {
    let line = meminfo
        .lines()
        .find(|line| {
            line.split_once(':')
                .is_some_and(|(key, _)| key.trim() == field)
        })
        .ok_or_else(|| Error::Detection(format!("{field} not found in /proc/meminfo")))?;

    let value = line
        .split_once(':')
        .map(|(_, rest)| rest)
        .and_then(|rest| rest.split_whitespace().next())
        .ok_or_else(|| Error::Detection(format!("unexpected meminfo format: {line}")))?;

    let kib: u64 = value
        .parse()
        .map_err(|e| Error::Detection(format!("invalid {field} value '{value}': {e}")))?;

    kib_to_bytes(kib, field)
}

/// Converts a KiB reading to bytes, rejecting values that overflow `u64`.
pub fn kib_to_bytes(kib: u64, what: &str) -> Result<u64> {
    kib.checked_mul(1024)
        .ok_or_else(|| Error::Detection(format!("{what} of {kib} kB overflows a byte count")))
}

/// Extracts the first `model name` entry from `/proc/cpuinfo`.
///
/// Some ARM kernels only publish `Hardware` or `Processor`, so those are tried next.
pub fn parse_cpuinfo_model(cpuinfo: &str) -> Result<String> {
    ["model name", "Hardware", "Processor"]
        .iter()
        .find_map(|wanted| {
            cpuinfo.lines().find_map(|line| {
                let (key, value) = line.split_once(':')?;
                let value = value.trim();
                (key.trim() == *wanted && !value.is_empty()).then(|| value.to_string())
            })
        })
        .ok_or_else(|| Error::Detection("CPU model not found in /proc/cpuinfo".to_string()))
}

/// Counts physical cores in `/proc/cpuinfo`.
///
/// Uses distinct `(physical id, core id)` pairs when present and falls back
/// to the number of `processor` entries.
pub fn parse_cpuinfo_cores(cpuinfo: &str) -> Result<usize> {
    let mut cores = std::collections::BTreeSet::new();
    let mut processors = 0usize;
    let mut physical_id = String::new();

    for line in cpuinfo.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "processor" => processors += 1,
            "physical id" => physical_id = value.trim().to_string(),
            "core id" => {
                cores.insert((physical_id.clone(), value.trim().to_string()));
            }
            _ => {}
        }
    }

    let count = if cores.is_empty() {
        processors
    } else {
        cores.len()
    };

    if count == 0 {
        Err(Error::Detection(
            "no processors listed in /proc/cpuinfo".to_string(),
        ))
    } else {
        Ok(count)
    }
}

/// Parses a bare integer, as printed by `sysctl -n` or PowerShell.
pub fn parse_u64_output(output: &str) -> Result<u64> {
    let first = output
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::Detection("empty command output".to_string()))?;

    first
        .parse()
        .map_err(|e| Error::Detection(format!("invalid integer '{first}': {e}")))
}

/// Sums free, inactive and speculative pages from `vm_stat` output.
pub fn parse_vm_stat_available(output: &str) -> Result<u64> {
    // Apple Silicon default when the header is missing.
    let mut page_size: u64 = 16384;
    let mut pages: u64 = 0;
    let mut seen = false;

    for line in output.lines() {
        if let Some(rest) = line.split("page size of").nth(1) {
            if let Some(size) = rest
                .split_whitespace()
                .next()
                .and_then(|s| s.parse().ok())
            {
                page_size = size;
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if matches!(
            key.trim(),
            "Pages free" | "Pages inactive" | "Pages speculative"
        ) {
            let count: u64 = value
                .trim()
                .trim_end_matches('.')
                .parse()
                .map_err(|e| Error::Detection(format!("invalid vm_stat line '{line}': {e}")))?;
            pages = pages
                .checked_add(count)
                .ok_or_else(|| Error::Detection("vm_stat page count overflows".to_string()))?;
            seen = true;
        }
    }

    if seen {
        pages.checked_mul(page_size).ok_or_else(|| {
            Error::Detection(format!("{pages} pages of {page_size} bytes overflow a byte count"))
        })
    } else {
        Err(Error::Detection("no page counts in vm_stat output".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16384000 kB\n\
                           MemFree:         1024000 kB\n\
                           MemAvailable:    8192000 kB\n";

    #[test]
    fn test_parse_meminfo_total_and_available() {
        assert_eq!(
            parse_meminfo_field(MEMINFO, "MemTotal").unwrap(),
            16_384_000 * 1024
        );
        assert_eq!(
            parse_meminfo_field(MEMINFO, "MemAvailable").unwrap(),
            8_192_000 * 1024
        );
    }

    #[test]
    fn test_parse_meminfo_missing_field() {
        let err = parse_meminfo_field("MemTotal: 10 kB", "MemAvailable").unwrap_err();
        assert!(err.to_string().contains("MemAvailable"));
    }

    #[test]
    fn test_parse_meminfo_garbage_value() {
        assert!(parse_meminfo_field("MemTotal: lots kB", "MemTotal").is_err());
    }

    #[test]
    fn test_parse_meminfo_overflowing_value() {
        let meminfo = format!("MemTotal: {} kB\n", u64::MAX);
        let err = parse_meminfo_field(&meminfo, "MemTotal").unwrap_err();
        assert!(matches!(err, Error::Detection(_)));
        assert!(err.to_string().contains("MemTotal"));

        let largest = u64::MAX / 1024;
        let meminfo = format!("MemTotal: {largest} kB\n");
        assert_eq!(parse_meminfo_field(&meminfo, "MemTotal").unwrap(), largest * 1024);
    }

    #[test]
    fn test_parse_cpuinfo_model() {
        let cpuinfo = "processor\t: 0\nvendor_id\t: GenuineIntel\n\
                       model name\t: Intel(R) Core(TM) i7-9700K CPU @ 3.60GHz\n";
        assert_eq!(
            parse_cpuinfo_model(cpuinfo).unwrap(),
            "Intel(R) Core(TM) i7-9700K CPU @ 3.60GHz"
        );
    }

    #[test]
    fn test_parse_cpuinfo_model_arm_fallback() {
        let cpuinfo = "processor\t: 0\nBogoMIPS\t: 108.00\nHardware\t: BCM2835\n";
        assert_eq!(parse_cpuinfo_model(cpuinfo).unwrap(), "BCM2835");
    }

    #[test]
    fn test_parse_cpuinfo_cores_uses_core_ids() {
        // Two hyperthreads on each of two cores.
        let cpuinfo = "processor: 0\nphysical id: 0\ncore id: 0\n\n\
                       processor: 1\nphysical id: 0\ncore id: 1\n\n\
                       processor: 2\nphysical id: 0\ncore id: 0\n\n\
                       processor: 3\nphysical id: 0\ncore id: 1\n";
        assert_eq!(parse_cpuinfo_cores(cpuinfo).unwrap(), 2);
    }

    #[test]
    fn test_parse_cpuinfo_cores_counts_processors() {
        let cpuinfo = "processor: 0\nBogoMIPS: 1\n\nprocessor: 1\nBogoMIPS: 1\n";
        assert_eq!(parse_cpuinfo_cores(cpuinfo).unwrap(), 2);
    }

    #[test]
    fn test_parse_cpuinfo_cores_empty() {
        assert!(parse_cpuinfo_cores("").is_err());
    }

    #[test]
    fn test_parse_u64_output() {
        assert_eq!(parse_u64_output("17179869184\n").unwrap(), 17_179_869_184);
        assert!(parse_u64_output("").is_err());
        assert!(parse_u64_output("abc").is_err());
    }

    #[test]
    fn test_parse_vm_stat_available() {
        let output = "Mach Virtual Memory Statistics: (page size of 4096 bytes)\n\
                      Pages free:                               100.\n\
                      Pages active:                             999.\n\
                      Pages inactive:                            50.\n\
                      Pages speculative:                         10.\n";
        assert_eq!(parse_vm_stat_available(output).unwrap(), 160 * 4096);
    }

    #[test]
    fn test_parse_vm_stat_overflowing_pages() {
        let output = format!(
            "Mach Virtual Memory Statistics: (page size of 4096 bytes)\nPages free: {}.\n",
            u64::MAX
        );
        assert!(matches!(
            parse_vm_stat_available(&output).unwrap_err(),
            Error::Detection(_)
        ));
    }

    #[test]
    fn test_parse_vm_stat_rejects_empty() {
        assert!(parse_vm_stat_available("nothing useful").is_err());
    }
}
