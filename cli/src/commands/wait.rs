use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use lazyweights_core::{wait_for_async, Config, Fetcher};
use std::path::PathBuf;
use std::time::Duration;

pub async fn execute(config: &Config, names: &[PathBuf], timeout: Option<u64>) -> Result<()> {
    let fetcher = Fetcher::from_config(config);
    let interval = fetcher.config().poll_interval;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let wait_all = async {
        for name in names {
            let target = fetcher.target(name);
            pb.set_message(format!("Waiting for {}", name.display()));
            wait_for_async(&target.path, interval).await?;
            pb.println(format!("Ready: {}", target.path.display()));
        }
        Ok::<_, lazyweights_core::FetchError>(())
    };

    let result = match timeout {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), wait_all).await {
            Ok(result) => result,
            Err(_) => {
                pb.abandon_with_message("Timed out");
                anyhow::bail!("Timed out after {}s waiting for downloads", secs);
            }
        },
        None => wait_all.await,
    };

    match result {
        Ok(()) => {
            pb.finish_with_message(format!("{} file(s) ready", names.len()));
            Ok(())
        }
        Err(e) => {
            pb.abandon();
            Err(e.into())
        }
    }
}
