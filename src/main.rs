use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use deploy_sanitizer::report::policy_lines;
use deploy_sanitizer::{ConsoleReporter, Policy, SanitizeOptions, Sanitizer, ScanOptions};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Remove caches, virtual environments, model weights and local databases before deploying",
    long_about = None
)]
struct Args {
    /// Project root to sanitize (defaults to current directory)
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Show what would be removed without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Print every processed entry, not just per-category totals
    #[arg(long, short)]
    list: bool,

    /// Increase diagnostic logging (-v debug, -vv trace)
    #[arg(long, short, action = ArgAction::Count)]
    verbose: u8,

    /// Only print the final summary
    #[arg(long, short, conflicts_with = "verbose")]
    quiet: bool,

    /// Directory names to never enter (repeatable)
    #[arg(long = "exclude", short = 'x', value_name = "NAME")]
    exclude: Vec<String>,

    /// Never enter VCS internals (.git, .hg, .svn, ...)
    #[arg(long)]
    skip_vcs: bool,

    /// Use a policy file instead of the built-in policy
    #[arg(long, value_name = "FILE")]
    policy: Option<PathBuf>,

    /// Print the policy table and exit
    #[arg(long)]
    show_policy: bool,
}

fn default_log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = match std::env::var("DEPLOY_SANITIZER_LOG") {
        Ok(env) => EnvFilter::new(env),
        Err(_) => EnvFilter::new(default_log_level(verbose, quiet)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_policy(path: Option<&Path>) -> Result<Policy> {
    match path {
        Some(path) => Policy::from_file(path)
            .with_context(|| format!("Failed to load policy from {}", path.display())),
        None => Policy::builtin().context("Failed to load built-in policy"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    let policy = load_policy(args.policy.as_deref())?;

    if args.show_policy {
        for line in policy_lines(&policy) {
            println!("{}", line);
        }
        return Ok(());
    }

    tracing::debug!(
        root = %args.root.display(),
        categories = policy.categories().len(),
        rules = policy.rule_count(),
        "starting sanitize"
    );

    let options = SanitizeOptions {
        dry_run: args.dry_run,
        scan: ScanOptions {
            exclude: args.exclude,
            skip_vcs: args.skip_vcs,
            show_progress: !args.quiet,
        },
    };

    let mut reporter = ConsoleReporter::new(args.dry_run, args.list, args.quiet);
    let report = Sanitizer::new(&policy, options).run(&args.root, &mut reporter);
    reporter.finish(&report);

    // Per-entry failures are reported above but never change the exit status
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        assert_eq!(default_log_level(0, false), "info");
        assert_eq!(default_log_level(1, false), "debug");
        assert_eq!(default_log_level(3, false), "trace");
        assert_eq!(default_log_level(0, true), "warn");
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["deploy-sanitizer", "-q", "-v"]).is_err());
        let args = Args::try_parse_from(["deploy-sanitizer", "--skip-vcs"]).unwrap();
        assert!(args.skip_vcs);
        assert_eq!(args.root, PathBuf::from("."));
    }
}
