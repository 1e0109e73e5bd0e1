//! `wayfarer config` — Configuration management commands.

use wayfarer_config::{AppConfig, BusyPolicy};

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.navigation.approach_deadline_ms > config.navigation.deadline_ms {
                warnings.push("Approach deadline is longer than the navigation deadline");
            }

            let stall_window = config.stall.sample_interval_ms * u64::from(config.stall.max_consecutive);
            if stall_window >= config.navigation.approach_deadline_ms {
                warnings.push("Stall window outlasts the approach deadline; approaches will time out before they are declared stuck");
            }

            if config.retry.interaction_range < config.navigation.approach_radius {
                warnings.push("Interaction range is smaller than the approach radius");
            }

            if config.smelting.fuels.is_empty() {
                warnings.push("No fuels configured; smelting will always fail");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Deadline:   {}ms", config.navigation.deadline_ms);
            println!("   Attempts:   {}", config.retry.max_attempts);
            println!(
                "   Policy:     {}",
                match config.session.busy_policy {
                    BusyPolicy::Queue => "queue",
                    BusyPolicy::Reject => "reject",
                }
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
