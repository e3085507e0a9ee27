use anyhow::Context;
use colored::Colorize;

use keva_node::{NodeConfig, SnapshotSummary};

use crate::cli::*;
use crate::scenario::{self, Outcome, Runner, StepReport};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => NodeConfig::default(),
    };
    match cli.command {
        Command::Run(args) => cmd_run(args, &config, &cli.format),
        Command::Dump(args) => cmd_dump(args, &config, &cli.format),
        Command::Config(_) => cmd_config(&config),
    }
}

fn cmd_run(args: RunArgs, config: &NodeConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let scenario = scenario::load(&args.script)?;
    let mut runner = Runner::new(scenario.nodes, config)?;
    let reports = runner.run(&scenario)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => reports.iter().for_each(print_report),
    }
    Ok(())
}

fn cmd_dump(args: DumpArgs, config: &NodeConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let scenario = scenario::load(&args.script)?;
    let mut runner = Runner::new(scenario.nodes, config)?;
    runner.run(&scenario)?;
    let summary = runner.node(args.node)?.dump_snapshot(&args.out)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_snapshot(&summary),
    }
    Ok(())
}

fn cmd_config(config: &NodeConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn print_report(report: &StepReport) {
    let head = format!("[{}] node {} {}", report.index, report.node, report.step);
    match &report.outcome {
        Outcome::Created { namespace, .. } => {
            println!("{} {} created {}", "✓".green(), head, namespace.cyan());
        }
        Outcome::Submitted { op_id } => {
            println!("{} {} pending {}", "✓".green(), head, op_id[..8].dimmed());
        }
        Outcome::Mined {
            height,
            ops,
            evicted,
        } => {
            println!(
                "{} {} block {} with {} ops ({} evicted)",
                "✓".green(),
                head,
                height.to_string().bold(),
                ops,
                evicted
            );
        }
        Outcome::Disconnected { height, new_tip } => {
            println!(
                "{} {} block {} disconnected, tip now {}",
                "↩".yellow(),
                head,
                height,
                new_tip.to_string().bold()
            );
        }
        Outcome::Value { key, value } => {
            println!("  {} {} = {:?}", head, key.yellow(), value);
        }
        Outcome::Entries { entries } => {
            println!("  {} {} entries", head, entries.len());
            for entry in entries {
                let at = entry
                    .height
                    .map(|h| format!("@{h}"))
                    .unwrap_or_else(|| "pending".into());
                println!("    {} = {:?} {}", entry.key.yellow(), entry.value, at.dimmed());
            }
        }
        Outcome::Pending { ops } => {
            println!("  {} {} pending", head, ops.len());
            for op in ops {
                println!(
                    "    #{} {} {} {}",
                    op.seq,
                    op.kind.cyan(),
                    op.key.yellow(),
                    op.value
                );
            }
        }
        Outcome::Namespaces { namespaces } => {
            println!("  {} {} namespaces", head, namespaces.len());
            for ns in namespaces {
                let state = if ns.pending {
                    "pending".yellow()
                } else {
                    "confirmed".green()
                };
                println!("    {} {} ({})", ns.namespace.cyan(), ns.display_name, state);
            }
        }
        Outcome::Refused { error } => {
            println!("{} {} refused: {}", "✗".red(), head, error.red());
        }
    }
}

fn print_snapshot(summary: &SnapshotSummary) {
    println!(
        "{} Snapshot written to {}",
        "✓".green().bold(),
        summary.path.display().to_string().bold()
    );
    println!("  Height: {}", summary.base_height);
    println!("  Namespaces: {}", summary.namespaces_written);
    println!("  Records: {}", summary.records_written);
    println!("  Digest: {}", summary.digest_hex().cyan());
}
