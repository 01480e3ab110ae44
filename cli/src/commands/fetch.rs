use anyhow::Result;
use lazyweights_core::{Config, Fetcher, LazyFile, WaitOutcome};
use std::path::PathBuf;

pub async fn execute(config: &Config, names: Vec<PathBuf>) -> Result<()> {
    let fetcher = Fetcher::from_config(config);

    // process waits and filesystem polling both block
    tokio::task::spawn_blocking(move || fetch_all(fetcher, names)).await?
}

fn fetch_all(fetcher: Fetcher, names: Vec<PathBuf>) -> Result<()> {
    // launch everything first so downloads overlap
    let mut files = names
        .iter()
        .map(|name| LazyFile::new(fetcher.clone(), name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut failed = 0usize;
    for file in &mut files {
        match file.wait()? {
            WaitOutcome::Exited(status) if !status.success() => {
                println!("Failed: {} ({})", file.path().display(), status);
                failed += 1;
            }
            _ => println!("Ready: {}", file.path().display()),
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} download(s) failed", failed, files.len());
    }
    Ok(())
}
