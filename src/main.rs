use std::path::Path;
use std::process::ExitCode as ProcessExitCode;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use seal::cli::{Cli, Command, ExitCode};
use seal::context::RunContext;
use seal::storage;

fn main() -> ProcessExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("seal: {e}");
            ExitCode::Error
        }
    };
    ProcessExitCode::from(u8::from(code))
}

fn init_tracing(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        };
        EnvFilter::new(format!("seal={level}"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Seal { paths, interval } => run_seal(&paths, interval.as_deref()),
        Command::Verify {
            paths,
            prefixes,
            before,
            json,
        } => run_verify(&paths, &prefixes, before.as_deref(), json),
        Command::Index { path, file, backend } => run_index(&path, &file, &backend),
        Command::Compare {
            index_a,
            index_b,
            backend,
            json,
        } => run_compare(&index_a, &index_b, &backend, json),
    }
}

fn run_seal(paths: &[std::path::PathBuf], interval: Option<&str>) -> anyhow::Result<ExitCode> {
    let ctx = RunContext::new();
    let shutdown_ctx = ctx.clone();
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, waiting for in-flight manifest write to finish");
        shutdown_ctx.request_shutdown();
        std::process::exit(u8::from(ExitCode::Error) as i32);
    })
    .ok();

    if let Some(interval) = interval {
        let period = humantime::parse_duration(interval)?;
        spawn_progress_printer(ctx.clone(), period);
    }

    let mut any_failed = false;
    for path in paths {
        match seal::seal_with_context(path, Some(&ctx)) {
            Ok(summary) => {
                println!("{}: sealed {} director{}", path.display(), summary.dirs_sealed, if summary.dirs_sealed == 1 { "y" } else { "ies" });
                for (kind, count) in &summary.skipped {
                    tracing::warn!(?kind, count, path = %path.display(), "skipped non-regular entries");
                }
                if !summary.failed.is_empty() {
                    for failed_dir in &summary.failed {
                        eprintln!("seal: {}: failed to seal directory, skipped", failed_dir.display());
                    }
                    any_failed = true;
                }
            }
            Err(e) => {
                eprintln!("seal: {}: {e}", path.display());
                any_failed = true;
            }
        }
    }

    Ok(if any_failed { ExitCode::Error } else { ExitCode::Success })
}

fn spawn_progress_printer(ctx: RunContext, period: Duration) {
    std::thread::spawn(move || loop {
        std::thread::sleep(period);
        let snap = ctx.snapshot();
        if snap.dirs_total == 0 {
            continue;
        }
        eprintln!(
            "progress: {}/{} ({})",
            snap.dirs_done,
            snap.dirs_total,
            snap.current_path.map(|p| p.display().to_string()).unwrap_or_default()
        );
        if snap.dirs_done >= snap.dirs_total {
            break;
        }
    });
}

fn run_verify(paths: &[std::path::PathBuf], prefixes: &[String], before: Option<&str>, json: bool) -> anyhow::Result<ExitCode> {
    let before = before.map(parse_before).transpose()?;
    let mut any_diverged = false;

    for path in paths {
        let report = seal::verify_before(path, prefixes, before)?;

        if report.any_diverged {
            any_diverged = true;
        }

        if json {
            let lines: Vec<_> = report
                .dirs
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "path": d.path,
                        "quick_identical": d.quick_diff.as_ref().map(|q| q.identical),
                        "hash_identical": d.hash_diff.as_ref().map(|h| h.identical),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&lines)?);
        } else {
            for dir in &report.dirs {
                let quick_ok = dir.quick_diff.as_ref().map(|d| d.identical).unwrap_or(false);
                let hash_ok = dir.hash_diff.as_ref().map(|d| d.identical).unwrap_or(false);
                let status = if quick_ok && hash_ok { "OK" } else { "CHANGED" };
                println!("{status} {}", dir.path.display());
            }
        }
    }

    Ok(if any_diverged { ExitCode::Error } else { ExitCode::Success })
}

fn run_index(path: &Path, file: &Path, backend: &str) -> anyhow::Result<ExitCode> {
    let dirs = seal::scan(path, true, &[], None)?;
    let backend_box = storage::open(backend, file)?;
    seal::build_index(&dirs, path, backend_box)?;
    println!("{}: indexed {} director{} into {}", path.display(), dirs.len(), if dirs.len() == 1 { "y" } else { "ies" }, file.display());
    Ok(ExitCode::Success)
}

fn run_compare(index_a: &Path, index_b: &Path, backend: &str, json: bool) -> anyhow::Result<ExitCode> {
    let mut backend_a = storage::open(backend, index_a)?;
    let mut backend_b = storage::open(backend, index_b)?;

    let loaded_a = seal::load_index(backend_a.as_mut())?;
    let loaded_b = seal::load_index(backend_b.as_mut())?;

    let root_a = loaded_a.by_path.get(".");
    let root_b = loaded_b.by_path.get(".");

    let (Some(root_a), Some(root_b)) = (root_a, root_b) else {
        anyhow::bail!("one or both indices have no root directory entry");
    };
    let (Some(dir_a), Some(dir_b)) = (&root_a.dir, &root_b.dir) else {
        anyhow::bail!("root entries are not directory seals");
    };

    let d = seal::diff_seals(dir_a, dir_b, true);

    if json {
        println!("{}", serde_json::to_string_pretty(&d)?);
    } else if d.identical {
        println!("identical");
    } else {
        println!(
            "differ: {} added, {} missing, {} changed",
            d.files_added.len(),
            d.files_missing.len(),
            d.files_changed.len()
        );
    }

    Ok(if d.identical { ExitCode::Success } else { ExitCode::Error })
}

/// Parses `YYYY-MM-DD[THH:MM[:SS]]` in the local time zone.
fn parse_before(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
        })
        .map_err(|_| anyhow::anyhow!("invalid --before timestamp: {s}"))?;

    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time: {s}"))
}
