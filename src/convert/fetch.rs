//! Bounded, deduplicated downloading of remote media.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::StreamExt;
use humansize::{format_size, BINARY};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;

use super::report::{Report, Warning};
use super::scan::FetchJob;

/// Maximum fetches in flight at once.
pub const FETCH_CONCURRENCY: usize = 3;

/// Per-fetch deadline, covering the connection and the whole body transfer.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// How a single job was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fetched {
    /// Body streamed to the destination.
    Downloaded,
    /// An existing file already matched the remote size; nothing downloaded.
    AlreadyCurrent,
}

/// Execute the deduplicated download set.
///
/// Jobs run as spawned tasks gated by a semaphore of [`FETCH_CONCURRENCY`]
/// permits; each request carries its own [`FETCH_TIMEOUT`]. The whole batch
/// is joined before returning — a failed item never cancels its siblings.
///
/// The returned table maps URL → destination for successful jobs only.
/// Failures (including panicked tasks) are recorded on `report`, and their
/// destinations never enter the table, so later stages cannot mistake a
/// partial file for a fetched one.
pub async fn fetch_all(
    client: &reqwest::Client,
    jobs: Vec<FetchJob>,
    report: &mut Report,
) -> HashMap<String, PathBuf> {
    let semaphore = Arc::new(Semaphore::new(FETCH_CONCURRENCY));
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        let client = client.clone();
        let semaphore = Arc::clone(&semaphore);
        let url = job.url.clone();
        let handle = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (job, Err(anyhow::anyhow!("scheduler shut down")));
            };
            let outcome = fetch_one(&client, &job).await;
            (job, outcome)
        });
        handles.push((url, handle));
    }

    let mut fetched = HashMap::new();
    for (url, handle) in handles {
        match handle.await {
            Ok((job, Ok(how))) => {
                match how {
                    Fetched::Downloaded => {
                        tracing::debug!(url = %job.url, dest = %job.dest.display(), "Downloaded");
                    }
                    Fetched::AlreadyCurrent => {
                        tracing::debug!(url = %job.url, "Existing file is current, skipping");
                    }
                }
                fetched.insert(job.url, job.dest);
            }
            Ok((job, Err(e))) => {
                report.warn(Warning::FetchFailed {
                    url: job.url,
                    cause: format!("{e:#}"),
                });
            }
            Err(e) => {
                report.warn(Warning::FetchFailed {
                    url,
                    cause: format!("task panicked: {e}"),
                });
            }
        }
    }

    fetched
}

async fn fetch_one(client: &reqwest::Client, job: &FetchJob) -> anyhow::Result<Fetched> {
    // A complete file from a prior run satisfies the job without a download.
    if let Ok(meta) = tokio::fs::metadata(&job.dest).await {
        if probe_same_size(client, &job.url, meta.len()).await {
            return Ok(Fetched::AlreadyCurrent);
        }
    }

    download(client, job).await?;
    Ok(Fetched::Downloaded)
}

/// HEAD the URL; true when it answers 2xx advertising exactly `local_len`
/// bytes. Any probe failure means "download again".
async fn probe_same_size(client: &reqwest::Client, url: &str, local_len: u64) -> bool {
    match client.head(url).timeout(FETCH_TIMEOUT).send().await {
        Ok(response) if response.status().is_success() => {
            advertised_length(&response) == Some(local_len)
        }
        _ => false,
    }
}

async fn download(client: &reqwest::Client, job: &FetchJob) -> anyhow::Result<()> {
    let response = client
        .get(&job.url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .context("request failed")?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("response status {status}");
    }

    let expected = advertised_length(&response);

    let mut file = tokio::fs::File::create(&job.dest)
        .await
        .with_context(|| format!("cannot create '{}'", job.dest.display()))?;

    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("transfer interrupted")?;
        file.write_all(&chunk).await.context("write failed")?;
        written += chunk.len() as u64;
    }
    file.flush().await.context("write failed")?;

    // A transport that ended cleanly can still have delivered less than the
    // server advertised; that file is not usable.
    if let Some(expected) = expected {
        if written < expected {
            anyhow::bail!(
                "expected {} but downloaded {}",
                format_size(expected, BINARY),
                format_size(written, BINARY)
            );
        }
    }

    Ok(())
}

/// The `Content-Length` a response advertises, straight from the header.
///
/// For HEAD responses the body is empty, so the body-derived size would
/// always read zero; only the header reflects the real resource size.
fn advertised_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}
