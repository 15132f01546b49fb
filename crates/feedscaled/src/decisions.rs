//! Worker count change log written by `feedscaled run --decision-log`.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;

use feedscale_autoscale::{ScaleCallback, ScaleFuture};

/// One JSON line per change: `{"descriptor", "worker_count", "epoch"}`.
pub fn render_line(descriptor: &str, worker_count: u32, epoch: u64) -> String {
    let mut line = serde_json::json!({
        "descriptor": descriptor,
        "worker_count": worker_count,
        "epoch": epoch,
    })
    .to_string();
    line.push('\n');
    line
}

/// Scale callback appending each change to `path`.
pub fn append_to(path: PathBuf) -> ScaleCallback {
    Box::new(move |descriptor: &str, worker_count: u32| -> ScaleFuture {
        let path = path.clone();
        let line = render_line(descriptor, worker_count, epoch_secs());
        Box::pin(async move {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        })
    })
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
