use anyhow::Result;

use crate::hardware::{Detector, HardwareCapabilities};
use crate::language::validate_language;
use crate::models::{ModelDescriptor, ModelRegistry, select_for_host};
use crate::ui::{Spinner, Style};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

fn detect() -> HardwareCapabilities {
    Spinner::run("Detecting hardware...", || Detector::new().detect_or_minimal())
}

/// Prints the host's capabilities and the model it would run.
pub fn print_hardware() -> Result<()> {
    let registry = ModelRegistry::default_catalog();
    let detector = Detector::new();
    let selection = Spinner::run("Detecting hardware...", || {
        select_for_host::<&str>(&detector, registry, &[])
    });

    match selection {
        Ok((caps, model)) => {
            println!("{caps}");
            println!();
            println!(
                "{} {} {}",
                Style::label("Best fit:"),
                Style::value(&model.id),
                Style::secondary(format!("({})", model.name))
            );
        }
        Err(e) => {
            println!("{}", detect());
            println!();
            println!("{} {e}", Style::warning("Best fit:"));
        }
    }
    Ok(())
}

fn print_model(model: &ModelDescriptor) {
    println!(
        "  {} {}",
        Style::value(format!("{:<16}", model.id)),
        model.name
    );
    println!(
        "    {} {:.0}B params, {} quality, {:.1} GB min / {:.1} GB recommended{}",
        Style::label("specs:"),
        model.parameters as f64 / 1_000_000_000.0,
        model.quality,
        model.min_ram as f64 / GIB,
        model.recommended_ram as f64 / GIB,
        if model.requires_gpu { ", GPU required" } else { "" }
    );
    if !model.description.is_empty() {
        println!("    {}", Style::secondary(&model.description));
    }
}

/// Lists the catalog, optionally filtered by language or fitted to this host.
pub fn print_models(languages: &[String], recommend: bool) -> Result<()> {
    for lang in languages {
        validate_language(lang)?;
    }

    let registry = ModelRegistry::default_catalog();

    let models: Vec<&ModelDescriptor> = if recommend {
        let caps = detect();
        let ram_gib = caps.available_ram as f64 / GIB;
        println!(
            "{}\n",
            Style::header(format!(
                "Recommended models for {ram_gib:.1} GB available RAM"
            ))
        );
        registry
            .recommendations_for_hardware(ram_gib, caps.has_gpu)
            .into_iter()
            .filter(|m| languages.iter().all(|l| m.supports_language(l)))
            .collect()
    } else {
        println!("{}\n", Style::header("Available models"));
        registry.filter_by_languages(languages)
    };

    if models.is_empty() {
        println!("  {}", Style::hint("No matching models."));
        return Ok(());
    }
    for model in models {
        print_model(model);
    }
    Ok(())
}
