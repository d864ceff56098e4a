use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Parser;
use loupe_analysis::{analyze_program, ast, CodeBase, Config, IssueCollector, Node};

#[derive(Parser)]
#[command(
    name = "loupe",
    version,
    about = "Check exported syntax trees for type and consistency issues.",
    long_about = "Analyzes one or more AST dumps (JSON, as produced by the companion \
                  exporter) and prints every issue found, sorted by file and line. \
                  Exits non-zero when issues were reported."
)]
struct Cli {
    /// AST dump files to analyze, in declaration order.
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Analysis options as a JSON file; missing keys use their defaults.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Skip call-site re-analysis (faster, less precise).
    #[arg(long)]
    quick: bool,

    /// Report ineffective statements.
    #[arg(long)]
    dead_code: bool,

    /// Target runtime version, e.g. "7.4".
    #[arg(long, value_name = "VERSION")]
    target_version: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => Config::default(),
    };
    if cli.quick {
        config.quick_mode = true;
    }
    if cli.dead_code {
        config.dead_code_detection = true;
    }
    if let Some(version) = &cli.target_version {
        config.target_version = version.clone();
    }
    Ok(config)
}

fn load_files(cli: &Cli) -> Result<Vec<(String, Node)>> {
    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let root = ast::from_json(&text)
            .with_context(|| format!("invalid AST dump {}", path.display()))?;
        files.push((path.display().to_string(), root));
    }
    Ok(files)
}

fn run() -> Result<bool> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let files = load_files(&cli)?;

    let mut codebase = CodeBase::new();
    let mut issues = IssueCollector::new();
    analyze_program(&mut codebase, &config, &mut issues, &files);

    let sorted = issues.into_sorted();
    for issue in &sorted {
        println!("{issue}");
    }
    Ok(sorted.is_empty())
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("loupe: {error:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_file_round_trips_and_flags_override() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"quick_mode": false, "target_version": "7.4"}}"#).expect("write");
        let cli = Cli::parse_from([
            "loupe",
            "--quick",
            "--config",
            file.path().to_str().expect("utf-8 path"),
            "input.json",
        ]);
        let config = load_config(&cli).expect("config loads");
        assert!(config.quick_mode);
        assert_eq!(config.target_version, "7.4");
    }

    #[test]
    fn ast_dumps_deserialize() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"kind": "stmt_list", "line": 1, "children": [
                {{"kind": "assign", "line": 2, "children": [
                    {{"kind": "var", "line": 2, "name": "x"}},
                    {{"kind": "int_lit", "line": 2, "value": 1}}
                ]}}
            ]}}"#
        )
        .expect("write");
        let cli = Cli::parse_from(["loupe", file.path().to_str().expect("utf-8 path")]);
        let files = load_files(&cli).expect("dump loads");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].1.children.len(), 1);
    }
}
