use crate::{AppError, JsonEnvelope};
use champsum_parse::{
    assemble_batch, config_hash, discover_logs, normalize_ipc, parse_log_file,
    write_batch_artifacts, write_normalized_ipc, Batch, ErrorCode, LabelMap, LogOutcome,
    SummarizeConfig,
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

const LOG_WORK_QUEUE: usize = 64;

pub(super) struct SummarizeCommand {
    pub log_dir: PathBuf,
    pub glob: String,
    pub outdir: PathBuf,
    pub label_map: String,
    pub baseline: Option<String>,
    pub threads: Option<usize>,
    pub show_progress: bool,
    pub json_output: bool,
}

struct LogTask {
    index: usize,
    path: PathBuf,
}

#[derive(Serialize)]
struct RejectedCounts {
    unreadable_file: usize,
    unknown_format: usize,
    missing_roi: usize,
}

#[derive(Serialize)]
struct SummarizeSummary {
    log_dir: String,
    outdir: String,
    schema: &'static str,
    columns: usize,
    logs_total: usize,
    accepted: usize,
    rejected: usize,
    warned: usize,
    rejected_by_code: RejectedCounts,
    outputs: Vec<String>,
    config_hash: String,
    threads: usize,
    duration_ms: u64,
}

pub(super) fn run(command: SummarizeCommand) -> Result<JsonEnvelope, AppError> {
    let SummarizeCommand {
        log_dir,
        glob,
        outdir,
        label_map,
        baseline,
        threads,
        show_progress,
        json_output,
    } = command;

    if matches!(threads, Some(0)) {
        return Err(AppError::usage("--threads must be >= 1".to_string()));
    }
    if baseline.as_deref().is_some_and(str::is_empty) {
        return Err(AppError::usage("--baseline must not be empty".to_string()));
    }

    let started = Instant::now();
    let config = SummarizeConfig {
        glob,
        label_map: LabelMap::parse(&label_map),
        baseline,
    };
    let config_hash = config_hash(&config)
        .map_err(|err| AppError::internal(format!("failed to hash config: {}", err)))?;

    let paths = discover_logs(&log_dir, &config.glob)?;
    tracing::info!(
        dir = %log_dir.display(),
        logs = paths.len(),
        "discovered logs"
    );

    let progress = build_progress_bar(paths.len(), show_progress);
    let pool = build_thread_pool(threads)?;
    let worker_count = pool.current_num_threads().max(1);

    let (task_tx, task_rx) = bounded::<LogTask>(LOG_WORK_QUEUE);
    let (result_tx, result_rx) = unbounded::<(usize, LogOutcome)>();

    let collector = thread::spawn(move || collect_in_order(result_rx));

    // Tasks are fed from a thread outside the pool: a one-thread pool would
    // otherwise block on a full queue before any worker starts.
    let dispatched = thread::scope(|threads| {
        let producer = threads.spawn(|| dispatch_tasks(&paths, task_tx));
        pool.scope(|scope| {
            for _ in 0..worker_count {
                let worker_task_rx = task_rx.clone();
                let worker_result_tx = result_tx.clone();
                let worker_progress = progress.clone();
                let labels = config.label_map.clone();
                scope.spawn(move |_| {
                    run_worker(worker_task_rx, worker_result_tx, worker_progress, labels);
                });
            }
        });
        drop(task_rx);
        producer.join()
    });
    drop(result_tx);

    let outcomes = collector
        .join()
        .map_err(|_| AppError::internal("result collector thread panicked".to_string()))??;
    dispatched.map_err(|_| AppError::internal("task producer thread panicked".to_string()))??;
    if outcomes.len() != paths.len() {
        return Err(AppError::internal(format!(
            "collected {} of {} log results",
            outcomes.len(),
            paths.len()
        )));
    }
    progress.finish_with_message(format!("parsed {} logs", outcomes.len()));

    let batch = assemble_batch(outcomes);
    let artifacts = write_batch_artifacts(&outdir, &batch)?;
    let mut outputs = vec![
        artifacts.full_metrics_csv.display().to_string(),
        artifacts.summary_csv.display().to_string(),
        artifacts.parse_errors_csv.display().to_string(),
    ];
    if let Some(baseline) = &config.baseline {
        let normalized = normalize_ipc(&batch.rows, baseline);
        let path = write_normalized_ipc(&outdir, &normalized)?;
        outputs.push(path.display().to_string());
    }

    let summary = SummarizeSummary {
        log_dir: log_dir.display().to_string(),
        outdir: outdir.display().to_string(),
        schema: batch.schema.as_str(),
        columns: batch.schema.schema().len(),
        logs_total: paths.len(),
        accepted: batch.accepted(),
        rejected: batch.rejected(),
        warned: batch.warned(),
        rejected_by_code: rejected_counts(&batch),
        outputs,
        config_hash,
        threads: worker_count,
        duration_ms: duration_ms(started),
    };

    if !json_output {
        print_summary(&summary, &batch);
    }

    Ok(JsonEnvelope::ok(json!(summary)))
}

fn build_thread_pool(threads: Option<usize>) -> Result<rayon::ThreadPool, AppError> {
    let builder = rayon::ThreadPoolBuilder::new();
    let builder = if let Some(n) = threads {
        builder.num_threads(n)
    } else {
        builder
    };
    builder
        .build()
        .map_err(|err| AppError::dependency(format!("failed to build worker thread pool: {}", err)))
}

fn build_progress_bar(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} logs ({percent}%)",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn dispatch_tasks(paths: &[PathBuf], task_tx: Sender<LogTask>) -> Result<(), AppError> {
    for (index, path) in paths.iter().enumerate() {
        let task = LogTask {
            index,
            path: path.clone(),
        };
        task_tx
            .send(task)
            .map_err(|_| AppError::internal("log worker queue closed unexpectedly".to_string()))?;
    }
    Ok(())
}

fn run_worker(
    task_rx: Receiver<LogTask>,
    result_tx: Sender<(usize, LogOutcome)>,
    progress: ProgressBar,
    labels: LabelMap,
) {
    while let Ok(task) = task_rx.recv() {
        let outcome = parse_log_file(&task.path, &labels);
        if result_tx.send((task.index, outcome)).is_err() {
            break;
        }
        progress.inc(1);
    }
}

/// Re-sequence worker results into input order.
fn collect_in_order(
    result_rx: Receiver<(usize, LogOutcome)>,
) -> Result<Vec<LogOutcome>, AppError> {
    let mut next_expected = 0usize;
    let mut buffer = BTreeMap::<usize, LogOutcome>::new();
    let mut ordered = Vec::new();

    while let Ok((index, outcome)) = result_rx.recv() {
        buffer.insert(index, outcome);
        while let Some(outcome) = buffer.remove(&next_expected) {
            ordered.push(outcome);
            next_expected = next_expected.saturating_add(1);
        }
    }

    if !buffer.is_empty() {
        return Err(AppError::internal(
            "collector stopped before all results were ordered".to_string(),
        ));
    }
    Ok(ordered)
}

fn rejected_counts(batch: &Batch) -> RejectedCounts {
    RejectedCounts {
        unreadable_file: batch.errors.count(ErrorCode::UnreadableFile),
        unknown_format: batch.errors.count(ErrorCode::UnknownFormat),
        missing_roi: batch.errors.count(ErrorCode::MissingRoi),
    }
}

fn duration_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn print_summary(summary: &SummarizeSummary, batch: &Batch) {
    println!(
        "summarize complete: logs={} accepted={} rejected={} warned={} schema={} ({} columns)",
        summary.logs_total,
        summary.accepted,
        summary.rejected,
        summary.warned,
        summary.schema,
        summary.columns
    );
    for record in batch.errors.records().iter().take(20) {
        println!(
            "  rejected [{}] {}: {}",
            record.error_code, record.file, record.detail
        );
    }
    for path in &summary.outputs {
        println!("{path}");
    }
}
