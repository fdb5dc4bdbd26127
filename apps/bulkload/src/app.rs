//! Command handlers.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use bulkload_records::{RecordSource, SheetRowSource};
use bulkload_transfer::{
    BatchProgress, BatchStatus, BatchUploader, HttpTransport, ProgressReport, ProgressReporter,
    checksum_bytes, partition,
};

use crate::config::Config;

/// Uploads `file` and waits for the batch to finish.
pub async fn upload(file: &Path, config: Config) -> anyhow::Result<ExitCode> {
    let raw = tokio::fs::read(file).await?;
    let options = config.upload_options();

    let transport = HttpTransport::new(config.endpoint.as_str(), options.request_timeout)?;
    tracing::info!(
        endpoint = transport.endpoint(),
        chunk_size = options.chunk_size,
        concurrency = options.max_concurrency,
        "starting upload"
    );

    let uploader = BatchUploader::new(Arc::new(SheetRowSource::new()), Arc::new(transport));
    let handle = uploader.start_batch(&raw, &options)?;

    let reporter = ProgressReporter::new(Some(config.report_interval()));
    reporter.on_report(Box::new(|r| println!("{}", format_report(r))));
    let reporting = reporter.start(handle.subscribe());

    let interrupt = tokio::spawn({
        let handle = handle.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing in-flight chunks");
                handle.cancel();
            }
        }
    });

    let done = handle.wait().await;
    interrupt.abort();
    reporting.await?;

    print_summary(&done);
    Ok(if done.status == BatchStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Parses and partitions `file`, printing the chunk plan.
pub fn plan(file: &Path, chunk_size: usize) -> anyhow::Result<ExitCode> {
    let raw = std::fs::read(file)?;
    let records = SheetRowSource::new().parse(&raw)?;
    let batch = partition(records, chunk_size)?;

    println!(
        "batch {}: {} records in {} chunks",
        batch.batch_id,
        batch.record_count(),
        batch.total_chunks()
    );
    for chunk in &batch.chunks {
        let payload = chunk.to_payload();
        let body = serde_json::to_vec(&payload)?;
        println!(
            "  chunk {:>4}: {:>5} records  tenant {}  {}  sha256 {}",
            chunk.index,
            chunk.len(),
            payload.tenant_id,
            format_bytes(body.len() as u64),
            &checksum_bytes(&body)[..12]
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn format_report(report: &ProgressReport) -> String {
    let p = &report.progress;
    let mut line = format!(
        "[{:>5.1}%] {:<10} {}/{} chunks",
        p.percentage,
        format!("{:?}", p.status).to_lowercase(),
        p.completed_chunks,
        p.total_chunks
    );
    if p.failed_chunks > 0 {
        line.push_str(&format!(", {} failed", p.failed_chunks));
    }
    if report.bytes_per_second > 0.0 {
        line.push_str(&format!(
            ", {}/s",
            format_bytes(report.bytes_per_second as u64)
        ));
    }
    if let Some(eta) = report.eta {
        line.push_str(&format!(", eta {}", format_eta(eta)));
    }
    line
}

fn print_summary(progress: &BatchProgress) {
    println!("{}", progress.message);
    for e in &progress.errors {
        println!("  chunk {} failed ({}): {}", e.chunk_index, e.kind, e.message);
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkload_transfer::{ChunkError, FailureKind};

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn eta_formatting() {
        assert_eq!(format_eta(Duration::from_secs(42)), "42s");
        assert_eq!(format_eta(Duration::from_secs(125)), "2m05s");
    }

    #[test]
    fn report_line_mentions_failures_and_speed() {
        let report = ProgressReport {
            progress: BatchProgress {
                total_chunks: 5,
                completed_chunks: 3,
                failed_chunks: 1,
                percentage: 60.0,
                status: BatchStatus::Uploading,
                errors: vec![ChunkError {
                    chunk_index: 2,
                    kind: FailureKind::Server,
                    message: "500 Internal Error".into(),
                }],
                ..Default::default()
            },
            bytes_per_second: 4096.0,
            eta: Some(Duration::from_secs(3)),
        };

        let line = format_report(&report);
        assert!(line.starts_with("[ 60.0%] uploading"));
        assert!(line.contains("3/5 chunks"));
        assert!(line.contains("1 failed"));
        assert!(line.contains("4.0 KiB/s"));
        assert!(line.ends_with("eta 3s"));
    }

    #[test]
    fn plan_reads_and_partitions_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rows.json");
        std::fs::write(
            &path,
            r#"[{"Name":"a","Amount":1},{"Name":"b","Amount":2},{"Name":"c","Amount":3}]"#,
        )
        .unwrap();

        assert!(plan(&path, 2).is_ok());
    }

    #[test]
    fn plan_rejects_empty_sheet() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rows.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(plan(&path, 2).is_err());
    }
}
