use anyhow::Result;
use lazyweights_core::{Config, Fetcher, FileState};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct StatusEntry {
    name: PathBuf,
    path: PathBuf,
    sentinel: PathBuf,
    #[serde(flatten)]
    state: FileState,
}

pub async fn execute(config: &Config, names: &[PathBuf], json: bool) -> Result<()> {
    let fetcher = Fetcher::from_config(config);

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let target = fetcher.target(name);
        entries.push(StatusEntry {
            state: fetcher.state(name)?,
            name: target.name,
            path: target.path,
            sentinel: target.sentinel,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{:<40} {:<12} {}", "NAME", "STATE", "SINCE");
    println!("{}", "-".repeat(72));

    for entry in &entries {
        let since = match &entry.state {
            FileState::Downloading { since: Some(t) } => t.format("%Y-%m-%d %H:%M:%S").to_string(),
            _ => "-".to_string(),
        };
        println!(
            "{:<40} {:<12} {}",
            entry.name.display(),
            entry.state.as_str(),
            since
        );
    }

    if entries
        .iter()
        .any(|e| matches!(e.state, FileState::Downloading { .. }))
    {
        println!("\nA marker with no running downloader is never cleared automatically.");
        println!("Remove the `.loading` file by hand if a download died.");
    }

    Ok(())
}
