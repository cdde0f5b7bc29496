// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use graphrag_indexer::config::load_config;
use graphrag_indexer::observability::init_tracing;
use graphrag_indexer::runtime::PipelineRunner;
use std::env;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

struct CliArgs {
    config: String,
    resume: Option<String>,
    verbose: bool,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} <config.yaml|config.toml> [--resume <run-id>] [--verbose]\n\
         Example: {} configs/dry-run.yaml\n\
         Example: {} configs/openai.toml --resume 20250101-120000",
        program, program, program
    )
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let program = args.first().map(String::as_str).unwrap_or("graphrag-indexer");
    let mut config = None;
    let mut resume = None;
    let mut verbose = false;

    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--verbose" | "-v" => verbose = true,
            "--resume" => match rest.next() {
                Some(run_id) => resume = Some(run_id.clone()),
                None => bail!("--resume needs a run id\n{}", usage(program)),
            },
            flag if flag.starts_with('-') => bail!("unknown option {}\n{}", flag, usage(program)),
            path if config.is_none() => config = Some(path.to_string()),
            extra => bail!("unexpected argument {}\n{}", extra, usage(program)),
        }
    }

    match config {
        Some(config) => Ok(CliArgs {
            config,
            resume,
            verbose,
        }),
        None => bail!("{}", usage(program)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let cli = parse_args(&args)?;
    init_tracing(cli.verbose);

    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted; stopping after the current step...");
            on_interrupt.cancel();
        }
    });

    let mut runner = PipelineRunner::from_config(config)
        .context("failed to set up output storage or cache")?
        .with_cancellation(cancel);
    let resume = cli.resume.is_some();
    if let Some(run_id) = cli.resume {
        runner = runner.with_run_id(run_id);
    }

    println!("🚀 graphrag-indexer");
    println!("═══════════════════════════════════");
    println!("Config: {}", cli.config);
    println!("Run:    {}{}", runner.run_id(), if resume { " (resuming)" } else { "" });
    println!();

    let started = Instant::now();
    let mut completed = 0;
    let mut failures = Vec::new();
    let results = runner.run(resume).context("failed to resolve workflows")?;
    futures::pin_mut!(results);
    while let Some(result) = results.next().await {
        if result.is_success() {
            let rows = result.table.as_ref().map_or(0, |t| t.len());
            println!("✅ {} ({} rows)", result.workflow, rows);
            completed += 1;
        } else {
            for error in &result.errors {
                println!("❌ {}: {}", result.workflow, error);
            }
            failures.push(result.workflow);
        }
    }

    println!("\n{}", "═".repeat(40));
    println!(
        "{} workflow(s) completed in {:.2?}",
        completed,
        started.elapsed()
    );
    if failures.is_empty() {
        println!("🎉 Indexing complete: run {}", runner.run_id());
        Ok(())
    } else {
        bail!(
            "indexing failed at {}; rerun with --resume {} to continue",
            failures.join(", "),
            runner.run_id()
        )
    }
}
