use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use patchcov::analyzer::AnalyzerOptions;
use patchcov::changeset::ChangeSet;
use patchcov::diff::{DiffSource, GitDiff, GitHubDiff, StdinDiff};
use patchcov::model::ReviewMessage;
use patchcov::translator::WarningTranslator;

/// patchcov — report untested code touched by a code-review diff.
#[derive(Parser)]
#[command(name = "patchcov", version, about)]
struct Cli {
    /// Path to the coverage report (default: coverage/lcov.info).
    #[arg(long)]
    lcov: Option<PathBuf>,

    /// Syntax version hint for the analyzed sources.
    #[arg(long = "ruby-syntax")]
    ruby_syntax: Option<String>,

    /// Project root used to resolve relative file paths (default: the
    /// current directory).
    #[arg(long)]
    path: Option<PathBuf>,

    /// Git diff arguments, e.g. "HEAD~1" or "main..HEAD".
    /// If omitted, reads a unified diff from stdin.
    #[arg(long)]
    git_diff: Option<String>,

    /// Fetch the diff for the current GitHub pull request (requires
    /// GITHUB_TOKEN, GITHUB_REPOSITORY, GITHUB_REF).
    #[arg(long, conflicts_with = "git_diff")]
    github: bool,

    /// Emit messages as a JSON array instead of text.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let source: Box<dyn DiffSource> = if cli.github {
        Box::new(GitHubDiff::from_env()?)
    } else if let Some(args) = cli.git_diff.clone() {
        Box::new(GitDiff { args })
    } else {
        Box::new(StdinDiff)
    };
    let diff_text = source.fetch_diff()?;

    // Flat analyzer configuration; unset keys are omitted entirely.
    let mut config = BTreeMap::new();
    if let Some(lcov) = &cli.lcov {
        config.insert("lcov".to_string(), lcov.display().to_string());
    }
    if let Some(syntax) = &cli.ruby_syntax {
        config.insert("ruby-syntax".to_string(), syntax.clone());
    }
    if let Some(path) = &cli.path {
        config.insert("path".to_string(), path.display().to_string());
    }
    let options = AnalyzerOptions::from_config(&config);

    let changeset = ChangeSet::from_diff(&diff_text, &options.root());
    let messages = WarningTranslator::new(options).run(&changeset);

    if cli.json {
        let body =
            serde_json::to_string_pretty(&messages).context("Failed to serialize messages")?;
        println!("{body}");
    } else {
        print_text(&messages);
    }
    Ok(())
}

fn print_text(messages: &[ReviewMessage]) {
    for message in messages {
        match message.line {
            Some(line) => println!(
                "{}:{}: [{}] {}",
                message.file_path, line, message.severity, message.text
            ),
            None => println!(
                "{}:-: [{}] {}",
                message.file_path, message.severity, message.text
            ),
        }
    }
}
