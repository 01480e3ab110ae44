use anyhow::{Context, Result};
use lazyweights_core::{Config, Fetcher, Manifest};
use std::path::{Path, PathBuf};

pub async fn execute(config: &Config, names: &[PathBuf], manifest: Option<&Path>) -> Result<()> {
    if names.is_empty() && manifest.is_none() {
        anyhow::bail!("Nothing to launch: pass file names or --manifest");
    }

    let fetcher = Fetcher::from_config(config);
    let mut started = 0usize;

    for name in names {
        match fetcher.launch(name)? {
            Some(handle) => {
                println!("Started {} (pid {})", name.display(), handle.pid());
                started += 1;
            }
            None => println!("Skipped {} ({})", name.display(), fetcher.state(name)?.as_str()),
        }
    }

    if let Some(path) = manifest {
        let manifest = Manifest::load(path)
            .with_context(|| format!("Failed to load manifest {:?}", path))?;
        let handles = manifest.launch_all(&fetcher)?;
        for handle in &handles {
            println!("Started {} (pid {})", handle.target().display(), handle.pid());
        }
        started += handles.len();
    }

    // handles are dropped here; the downloaders keep running on their own
    println!("\n{} download(s) started.", started);
    if started > 0 {
        println!("Run `lazyweights wait <name>` to block until they finish.");
    }

    Ok(())
}
