use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use linepatch::{
    closest_line, load_from_path, run_rules, PatchEngine, PatchPlan, PatchResult, PathGuard,
    PlanConfig, RuleStatus,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "linepatch")]
#[command(about = "Idempotent, rule-based text patching", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a patch plan to its target file
    Apply {
        /// Plan file to apply (otherwise applies every plan in patches/)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Root directory that root-relative targets resolve against
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Compute and report outcomes without writing the file back
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show a unified diff of the changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report what each rule would do, without modifying the target
    Check {
        /// Plan file to check (otherwise checks every plan in patches/)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Root directory that root-relative targets resolve against
        #[arg(short, long)]
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            plan,
            root,
            dry_run,
            diff,
        } => cmd_apply(plan, root, dry_run, diff),

        Commands::Check { plan, root } => cmd_apply(plan, root, true, false),
    }
}

/// Resolve the root directory.
///
/// Priority order:
/// 1. Explicit --root flag
/// 2. LINEPATCH_ROOT environment variable
/// 3. Current working directory
fn resolve_root(cli_root: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_root {
        return Ok(path.canonicalize()?);
    }

    if let Ok(env_path) = env::var("LINEPATCH_ROOT") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: LINEPATCH_ROOT is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    Ok(env::current_dir()?)
}

/// Discover all .toml plan files in a patches/ directory.
///
/// Discovery order:
/// 1. `<root>/patches` (keeps plan files alongside the tree they patch).
/// 2. `./patches` relative to the current working directory.
fn discover_plan_files(root: &Path) -> Result<Vec<PathBuf>> {
    let cwd_patches_dir = env::current_dir().ok().map(|cwd| cwd.join("patches"));
    let root_patches_dir = root.join("patches");

    let candidate_dirs: Vec<PathBuf> = std::iter::once(root_patches_dir)
        .chain(cwd_patches_dir)
        .collect();

    for patches_dir in candidate_dirs {
        if !patches_dir.exists() {
            continue;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&patches_dir).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();

        if !files.is_empty() {
            return Ok(files);
        }
    }

    anyhow::bail!(
        "No .toml plan files found in either ./patches or {}/patches",
        root.display()
    )
}

/// Resolve a plan's target path, confining root-relative targets to the root.
fn resolve_plan(config: &PlanConfig, root: &Path) -> Result<PatchPlan> {
    let mut plan = config.to_plan(Some(root));
    if config.meta.root_relative {
        let guard = PathGuard::new(root)?;
        plan.file = guard.validate_path(&plan.file)?;
    }
    Ok(plan)
}

/// Show a unified diff between original and patched content.
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
    println!();
}

/// Render one plan's result, with near-miss hints for rules that found
/// nothing.
fn report_result(plan: &PatchPlan, result: &PatchResult, dry_run: bool) {
    let content = fs::read_to_string(&result.file).ok();

    for outcome in &result.outcomes {
        match outcome.status {
            RuleStatus::Applied => {
                let verb = if dry_run { "would apply" } else { "applied" };
                println!("{} {}: {}", "✓".green(), outcome.rule_id, verb);
            }
            RuleStatus::SkippedAlreadyPatched => {
                println!("{} {}: already patched", "⊙".yellow(), outcome.rule_id);
            }
            RuleStatus::NotFound => {
                println!("{} {}: not found", "⊘".cyan(), outcome.rule_id);
                let hint = plan
                    .rules
                    .iter()
                    .find(|r| r.id == outcome.rule_id)
                    .and_then(|r| r.target_hint());
                if let (Some(content), Some(needle)) = (&content, hint) {
                    if let Some(near) = closest_line(content, needle) {
                        println!(
                            "  {}",
                            format!("closest line {}: {}", near.line_number, near.text).dimmed()
                        );
                    }
                }
            }
        }
    }
}

fn cmd_apply(
    plan_file: Option<PathBuf>,
    root: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let root = resolve_root(root)?;

    let plan_files = if let Some(path) = plan_file {
        vec![path]
    } else {
        discover_plan_files(&root)?
    };

    println!("Root: {}", root.display());
    println!();

    let engine = PatchEngine::new().dry_run(dry_run);

    let mut total_applied = 0;
    let mut total_already_applied = 0;
    let mut total_not_found = 0;
    let mut total_failed = 0;

    for plan_path in plan_files {
        println!("Loading plan from {}...", plan_path.display());

        let config = load_from_path(&plan_path)?;
        let plan = match resolve_plan(&config, &root) {
            Ok(plan) => plan,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), config.meta.name, e);
                total_failed += 1;
                continue;
            }
        };

        if dry_run {
            println!("{}", "  [DRY RUN - no file will be modified]".cyan());
        }

        let before = if show_diff {
            fs::read_to_string(&plan.file).ok()
        } else {
            None
        };

        match engine.apply(&plan) {
            Ok(result) => {
                report_result(&plan, &result, dry_run);

                total_applied += result.count(RuleStatus::Applied);
                total_already_applied += result.count(RuleStatus::SkippedAlreadyPatched);
                total_not_found += result.count(RuleStatus::NotFound);

                if show_diff && result.content_changed {
                    if let Some(before) = before {
                        let after = if dry_run {
                            run_rules(&plan.rules, &before).0
                        } else {
                            fs::read_to_string(&plan.file).unwrap_or_default()
                        };
                        display_diff(&plan.file, &before, &after);
                    }
                }
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), config.meta.name, e);
                total_failed += 1;
            }
        }

        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", total_applied).green());
    println!(
        "  {} already patched",
        format!("{}", total_already_applied).yellow()
    );
    println!("  {} not found", format!("{}", total_not_found).cyan());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
