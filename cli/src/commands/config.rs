use anyhow::Result;
use lazyweights_core::Config;
use std::path::Path;

pub async fn execute(
    config_path: &Path,
    mut config: Config,
    key: Option<&str>,
    value: Option<&str>,
) -> Result<()> {
    match (key, value) {
        // Show all config
        (None, None) => {
            println!("Configuration file: {:?}\n", config_path);
            println!("[source]");
            println!("  base_url = \"{}\"", config.source.base_url);
            println!();
            println!("[downloader]");
            println!("  program = {:?}", config.downloader.program);
            println!("  args = {:?}", config.downloader.args);
            println!();
            println!("[storage]");
            println!(
                "  root = {}",
                config
                    .storage
                    .root
                    .as_ref()
                    .map(|p| format!("{:?}", p))
                    .unwrap_or_else(|| "(current directory)".to_string())
            );
            println!();
            println!("[gate]");
            println!("  override_var = \"{}\"", config.gate.override_var);
            println!("  sandbox_marker = {:?}", config.gate.sandbox_marker);
            println!();
            println!("[wait]");
            println!("  poll_interval_ms = {}", config.wait.poll_interval_ms);
            println!();
            println!("[sentinel]");
            println!("  mode = \"{}\"", config.sentinel.mode.as_str());
        }

        // Get a specific key
        (Some(key), None) => {
            let value = get_config_value(&config, key)?;
            println!("{}", value);
        }

        // Set a specific key
        (Some(key), Some(value)) => {
            set_config_value(&mut config, key, value)?;
            config.save_to(config_path)?;
            println!("Set {} = {}", key, value);
        }

        _ => unreachable!(),
    }

    Ok(())
}

fn get_config_value(config: &Config, key: &str) -> Result<String> {
    match key {
        "source.base_url" => Ok(config.source.base_url.clone()),
        "downloader.program" => Ok(config.downloader.program.display().to_string()),
        "downloader.args" => Ok(config.downloader.args.join(" ")),
        "storage.root" => Ok(config
            .storage
            .root
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()),
        "gate.override_var" => Ok(config.gate.override_var.clone()),
        "gate.sandbox_marker" => Ok(config.gate.sandbox_marker.display().to_string()),
        "wait.poll_interval_ms" => Ok(config.wait.poll_interval_ms.to_string()),
        "sentinel.mode" => Ok(config.sentinel.mode.as_str().to_string()),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "source.base_url" => config.source.base_url = value.to_string(),
        "downloader.program" => config.downloader.program = value.into(),
        "downloader.args" => {
            config.downloader.args = value.split_whitespace().map(str::to_string).collect()
        }
        "storage.root" => {
            config.storage.root = if value.is_empty() {
                None
            } else {
                Some(value.into())
            }
        }
        "gate.override_var" => config.gate.override_var = value.to_string(),
        "gate.sandbox_marker" => config.gate.sandbox_marker = value.into(),
        "wait.poll_interval_ms" => {
            let ms: u64 = value.parse()?;
            if ms == 0 {
                anyhow::bail!("wait.poll_interval_ms must be at least 1");
            }
            config.wait.poll_interval_ms = ms;
        }
        "sentinel.mode" => config.sentinel.mode = value.parse()?,
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
    Ok(())
}
