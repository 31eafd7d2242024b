mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::env;
use std::path::PathBuf;

use tracelink_core::models::FitStatus;
use tracelink_core::service::{Scope, TraceService};
use tracelink_core::store::{EntityStore, SqliteStore, YamlStore};
use tracelink_core::trace::TraceChain;

use crate::cli::{Cli, Command, FitCommand};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let store = open_store(&cli)?;
    let service = TraceService::new(store.as_ref());

    match &cli.command {
        Command::Trace { r#type, id } => {
            let chain = service.build_chain(r#type, *id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&chain)?);
            } else {
                print_chain(&chain);
            }
        }
        Command::Links { id } => {
            let links = service.get_requirement_links(*id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&links)?);
            } else {
                print_links(&links);
            }
        }
        Command::Summary { id } => {
            let summary = service.get_program_summary(*id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Command::Untested { kind } => {
            let scope = require_scope(&cli)?;
            match kind.as_str() {
                "items" => {
                    let items = service.items_without_tests(scope)?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&items)?);
                    } else if items.is_empty() {
                        println!("{}", "All items have test coverage.".green());
                    } else {
                        for item in &items {
                            println!("{}  {}", item.code.yellow(), item.title);
                        }
                    }
                }
                "requirements" => {
                    let reqs = service.requirements_without_tests(scope)?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&reqs)?);
                    } else if reqs.is_empty() {
                        println!("{}", "All requirements have test evidence.".green());
                    } else {
                        for req in &reqs {
                            println!("{}  {}", req.code.yellow(), req.title);
                        }
                    }
                }
                other => anyhow::bail!("Unknown --kind '{}', expected items or requirements", other),
            }
        }
        Command::Fit(fit_cmd) => {
            handle_fit_command(fit_cmd, &service, cli.json)?;
        }
        Command::DefectsByProcess { id } => {
            let scope = require_scope(&cli)?;
            let chains = service.trace_defects_by_process(scope, *id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&chains)?);
            } else if chains.is_empty() {
                println!("{}", "No defects under this node.".green());
            } else {
                for chain in &chains {
                    print_chain(chain);
                    println!();
                }
            }
        }
        Command::Init => {
            let path = data_path(&cli)?;
            let yaml = YamlStore::new(&path);
            yaml.create_if_not_exists()?;
            println!("{} {}", "Initialized".green(), path.display());
        }
    }

    Ok(())
}

/// Resolves the data file path: explicit flags, then TRACELINK_PATH, then
/// ~/.tracelink/tracelink.yaml
fn data_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(db) = &cli.db {
        return Ok(PathBuf::from(db));
    }
    if let Some(file) = &cli.file {
        return Ok(PathBuf::from(file));
    }
    if let Ok(env_path) = env::var("TRACELINK_PATH") {
        return Ok(PathBuf::from(env_path));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".tracelink").join("tracelink.yaml"))
}

fn open_store(cli: &Cli) -> Result<Box<dyn EntityStore>> {
    let path = data_path(cli)?;
    let is_sqlite = cli.db.is_some()
        || matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("db") | Some("sqlite")
        );
    if is_sqlite {
        Ok(Box::new(SqliteStore::new(&path)?))
    } else {
        let yaml = YamlStore::new(&path);
        yaml.create_if_not_exists()?;
        Ok(Box::new(yaml))
    }
}

fn require_scope(cli: &Cli) -> Result<Scope> {
    match (cli.tenant, cli.project) {
        (Some(tenant_id), Some(project_id)) => Ok(Scope {
            tenant_id,
            project_id,
        }),
        _ => anyhow::bail!("This command requires --tenant and --project"),
    }
}

fn parse_status(s: &str) -> Result<FitStatus> {
    FitStatus::parse(s)
        .with_context(|| format!("Unknown status '{}', expected fit, gap or partial_fit", s))
}

fn handle_fit_command(cmd: &FitCommand, service: &TraceService, json: bool) -> Result<()> {
    match cmd {
        FitCommand::Suggest { id } => {
            let suggestion = service.suggest_fit(*id)?;
            if json {
                println!("{}", serde_json::json!({ "system_suggested_fit": suggestion }));
            } else {
                match suggestion {
                    Some(status) => println!("Suggested: {}", status),
                    None => println!("Suggested: {}", "undecided".yellow()),
                }
            }
        }
        FitCommand::Recalc { id } => {
            let node = service.recalc_consolidated(*id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&node)?);
            } else {
                print_node(&node);
            }
        }
        FitCommand::Override {
            id,
            status,
            rationale,
            actor,
        } => {
            let status = parse_status(status)?;
            let node = service.override_decision(*id, actor, status, rationale)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&node)?);
            } else {
                println!("{}", "Override recorded.".green());
                print_node(&node);
            }
        }
        FitCommand::Propagate { id, status, r#final } => {
            let status = parse_status(status)?;
            let node = service.propagate_from_leaf(*id, status, *r#final)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&node)?);
            } else {
                print_node(&node);
            }
        }
        FitCommand::Signoff {
            id,
            status,
            rationale,
            actor,
            force,
        } => {
            let status = parse_status(status)?;
            let outcome = service.sign_off(*id, actor, status, rationale.as_deref(), *force)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.node)?);
            } else {
                if outcome.overrode_suggestion {
                    println!("{}", "Signed off, overriding the suggestion.".yellow());
                } else {
                    println!("{}", "Signed off.".green());
                }
                print_node(&outcome.node);
            }
        }
        FitCommand::Readiness { id } => {
            let pct = service.readiness(*id)?;
            if json {
                println!("{}", serde_json::json!({ "readiness_pct": pct }));
            } else {
                let rendered = format!("{:.2}%", pct);
                if pct >= 100.0 {
                    println!("Readiness: {}", rendered.green());
                } else {
                    println!("Readiness: {}", rendered.yellow());
                }
            }
        }
    }
    Ok(())
}

fn print_chain(chain: &TraceChain) {
    println!(
        "{} {} ({})",
        chain.entity.kind.tag().bold(),
        chain.entity.title,
        chain.entity.id
    );
    if !chain.upstream.is_empty() {
        println!("{}", "Upstream:".bold());
        for hop in &chain.upstream {
            println!("  <- [{}] {}", hop.kind.tag().cyan(), hop.title);
        }
    }
    if !chain.downstream.is_empty() {
        println!("{}", "Downstream:".bold());
        for hop in &chain.downstream {
            println!("  -> [{}] {}", hop.kind.tag().cyan(), hop.title);
        }
    }
    println!("Chain depth: {}", chain.chain_depth);
    if chain.gaps.is_empty() {
        println!("{}", "No gaps.".green());
    } else {
        for gap in &chain.gaps {
            println!("{} L{}: {}", "Gap".red(), gap.level, gap.message);
        }
    }
}

fn print_links(links: &tracelink_core::lateral::RequirementLinks) {
    if links.open_items.is_empty() && links.decisions.is_empty() && links.notes.is_empty() {
        println!("{}", "No lateral links.".yellow());
        return;
    }
    for item in &links.open_items {
        println!("[{}] {}", item.link_kind.to_string().cyan(), item.hop.title);
    }
    for decision in &links.decisions {
        println!("[{}] {}", "decision".cyan(), decision.title);
    }
    for note in &links.notes {
        println!("[{}] {}", "note".cyan(), note.title);
    }
}

fn print_summary(summary: &tracelink_core::coverage::ProgramSummary) {
    println!("{} ({})", summary.program_name.bold(), summary.program_id);
    println!("Requirements: {}", summary.requirement_count);
    println!(
        "  with implementation: {} ({:.2}%)",
        summary.with_implementation.count, summary.with_implementation.pct
    );
    println!(
        "  with tests:          {} ({:.2}%)",
        summary.with_tests.count, summary.with_tests.pct
    );
    println!(
        "  with defects:        {} ({:.2}%)",
        summary.with_defects.count, summary.with_defects.pct
    );
    println!("Implementation items: {}", summary.implementation_item_count);
    println!("Test cases: {}", summary.test_case_count);
    let open = summary.open_defect_count.to_string();
    println!(
        "Open defects: {}",
        if summary.open_defect_count > 0 {
            open.red()
        } else {
            open.green()
        }
    );
}

fn print_node(node: &tracelink_core::models::ScopeNode) {
    println!("{} {} ({})", node.code.bold(), node.name, node.level);
    if let Some(fit) = node.fit_status {
        println!("  assessed: {}", fit);
    }
    if let Some(suggested) = node.system_suggested_fit {
        println!("  suggested: {}", suggested);
    }
    match node.consolidated_fit_decision {
        Some(decision) => {
            let rendered = decision.to_string();
            let rendered = match decision {
                FitStatus::Fit => rendered.green(),
                FitStatus::Gap => rendered.red(),
                FitStatus::PartialFit => rendered.yellow(),
            };
            println!("  consolidated: {}", rendered);
        }
        None => println!("  consolidated: {}", "undecided".yellow()),
    }
    if node.override_active {
        println!(
            "  {} by {}: {}",
            "overridden".yellow(),
            node.override_by.as_deref().unwrap_or("?"),
            node.override_rationale.as_deref().unwrap_or("")
        );
    }
    if let Some(pct) = node.readiness_pct {
        println!("  readiness: {:.2}% ({})", pct, node.confirmation_status);
    }
}
