//! `wayfarer status` — Show the effective configuration at a glance.

use wayfarer_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🧭 Wayfarer Status");
    println!("=================");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!(
        "  Server:         {}:{} as {} ({})",
        config.connection.host,
        config.connection.port,
        config.connection.username,
        config.connection.version
    );
    println!("  Nav deadline:   {}ms", config.navigation.deadline_ms);
    println!("  Approach:       {}ms", config.navigation.approach_deadline_ms);
    println!(
        "  Stall:          {} samples of {}ms under {}",
        config.stall.max_consecutive, config.stall.sample_interval_ms, config.stall.threshold
    );
    println!(
        "  Retry:          {} attempts within {}",
        config.retry.max_attempts, config.retry.search_radius
    );
    println!("  Busy policy:    {:?}", config.session.busy_policy);

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `wayfarer onboard` first");
    }

    Ok(())
}
