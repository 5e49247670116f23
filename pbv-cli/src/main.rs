//! PBV CLI - Command-line tool for Power BI container conversion
//!
//! This binary provides command-line interfaces for:
//! - extract: container → VCS-friendly directory tree
//! - compress: directory tree → container
//! - textconv: container → readable text on stdout (git textconv driver)
//!
//! `.pbv.toml` files discovered along the input path supply flag defaults;
//! explicit flags always win.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pbv_format::{PbvError, Result};
use pbv_io::{execute_compress, execute_extract, execute_textconv, PipelineOptions};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Config file name discovered along the input path.
const CONFIG_FILE: &str = ".pbv.toml";

#[derive(Parser)]
#[command(name = "pbv")]
#[command(about = "Convert Power BI .pbix/.pbit containers to a VCS-friendly tree and back")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a container into a VCS-friendly directory tree
    Extract {
        /// Input container (.pbix/.pbit)
        input: PathBuf,
        /// Output directory
        output: PathBuf,
        /// Allow overwriting OUTPUT if it exists
        #[arg(long)]
        overwrite: bool,
        /// Reformat for diff-ability: drop volatile timestamp fields (they
        /// are deliberately discarded and not restored on compress), split
        /// multi-line strings, and write large arrays as one file per member
        #[arg(long)]
        diffable: bool,
        /// Sort visual containers by identifier. Caution: the host
        /// application is known to reject containers compressed from a
        /// sorted tree
        #[arg(long)]
        sort_visuals: bool,
        /// Ignore .pbv.toml config files along the input path
        #[arg(long)]
        no_config: bool,
        /// Show a progress spinner
        #[arg(long)]
        progress: bool,
    },
    /// Compress an extracted tree back into a container
    Compress {
        /// Input directory (a previous extraction)
        input: PathBuf,
        /// Output container (.pbix/.pbit)
        output: PathBuf,
        /// Allow overwriting OUTPUT if it exists
        #[arg(long)]
        overwrite: bool,
        /// Reverse the diff-oriented rewrites (markers found in the tree are
        /// reversed regardless; this flag exists for symmetry with extract)
        #[arg(long)]
        diffable: bool,
        /// Ignore .pbv.toml config files along the input path
        #[arg(long)]
        no_config: bool,
        /// Show a progress spinner
        #[arg(long)]
        progress: bool,
    },
    /// Print a textual rendering of a container to stdout
    Textconv {
        /// Input container (.pbix/.pbit)
        input: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract {
            input,
            output,
            overwrite,
            diffable,
            sort_visuals,
            no_config,
            progress,
        } => {
            check_distinct_paths(&input, &output)?;
            let opts = resolve_options(&input, no_config, overwrite, diffable, sort_visuals);
            let spinner = progress.then(|| create_spinner("Extracting entries"));
            let summary = execute_extract(&input, &output, &opts)?;
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }
            report(format!(
                "Extracted {} entries ({} split members) to {}",
                summary.entries,
                summary.split_members,
                output.display()
            ))
        }
        Commands::Compress {
            input,
            output,
            overwrite,
            diffable,
            no_config,
            progress,
        } => {
            check_distinct_paths(&input, &output)?;
            let opts = resolve_options(&input, no_config, overwrite, diffable, false);
            let spinner = progress.then(|| create_spinner("Compressing entries"));
            let summary = execute_compress(&input, &output, &opts)?;
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }
            report(format!(
                "Compressed {} entries to {}",
                summary.entries,
                output.display()
            ))
        }
        Commands::Textconv { input } => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            execute_textconv(&input, &mut out)?;
            out.flush()?;
            Ok(())
        }
    }
}

fn report(message: String) -> Result<()> {
    let mut stderr = std::io::stderr().lock();
    writeln!(&mut stderr, "{message}")?;
    Ok(())
}

fn check_distinct_paths(input: &Path, output: &Path) -> Result<()> {
    let input_abs = std::path::absolute(input).unwrap_or_else(|_| input.to_path_buf());
    let output_abs = std::path::absolute(output).unwrap_or_else(|_| output.to_path_buf());
    if input_abs == output_abs {
        return Err(PbvError::Filesystem {
            path: output.display().to_string(),
            reason: "input and output paths must differ".to_string(),
        });
    }
    Ok(())
}

/// Flag defaults a `.pbv.toml` file may set.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct FileConfig {
    overwrite: Option<bool>,
    diffable: Option<bool>,
    sort_visuals: Option<bool>,
}

impl FileConfig {
    fn merge_over(self, base: FileConfig) -> FileConfig {
        FileConfig {
            overwrite: self.overwrite.or(base.overwrite),
            diffable: self.diffable.or(base.diffable),
            sort_visuals: self.sort_visuals.or(base.sort_visuals),
        }
    }
}

/// Find `.pbv.toml` files along the ancestors of `input`, root first, so the
/// nearest directory's settings win when merged in order.
fn discover_config_files(input: &Path) -> Vec<PathBuf> {
    let absolute = std::path::absolute(input).unwrap_or_else(|_| input.to_path_buf());
    let mut dirs: Vec<&Path> = absolute.ancestors().skip(1).collect();
    dirs.reverse();
    dirs.into_iter()
        .map(|dir| dir.join(CONFIG_FILE))
        .filter(|path| path.is_file())
        .collect()
}

fn load_file_config(input: &Path) -> FileConfig {
    let mut merged = FileConfig::default();
    for path in discover_config_files(input) {
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping unreadable config file");
                continue;
            }
        };
        match toml::from_str::<FileConfig>(&text) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "applying config file");
                merged = config.merge_over(merged);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping invalid config file");
            }
        }
    }
    merged
}

fn resolve_options(
    input: &Path,
    no_config: bool,
    overwrite: bool,
    diffable: bool,
    sort_visuals: bool,
) -> PipelineOptions {
    let file = if no_config {
        FileConfig::default()
    } else {
        load_file_config(input)
    };
    PipelineOptions {
        overwrite: overwrite || file.overwrite.unwrap_or(false),
        diffable: diffable || file.diffable.unwrap_or(false),
        sort_visuals: sort_visuals || file.sort_visuals.unwrap_or(false),
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn merge_prefers_nearer_settings() {
        let far = FileConfig {
            overwrite: Some(true),
            diffable: Some(false),
            sort_visuals: None,
        };
        let near = FileConfig {
            overwrite: None,
            diffable: Some(true),
            sort_visuals: None,
        };
        let merged = near.merge_over(far);
        assert_eq!(merged.overwrite, Some(true));
        assert_eq!(merged.diffable, Some(true));
        assert_eq!(merged.sort_visuals, None);
    }

    #[test]
    fn discover_orders_root_first() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "diffable = true\n").unwrap();
        fs::write(nested.join(CONFIG_FILE), "diffable = false\n").unwrap();

        let input = nested.join("report.pbit");
        fs::write(&input, b"").unwrap();
        let files: Vec<_> = discover_config_files(&input)
            .into_iter()
            .filter(|p| p.starts_with(tmp.path()))
            .collect();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0], tmp.path().join(CONFIG_FILE));
        assert_eq!(files[1], nested.join(CONFIG_FILE));
    }

    #[test]
    fn nearest_config_wins_and_flags_override() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "diffable = true\n").unwrap();
        fs::write(nested.join(CONFIG_FILE), "diffable = false\noverwrite = true\n").unwrap();

        let input = nested.join("report.pbit");
        fs::write(&input, b"").unwrap();

        let opts = resolve_options(&input, false, false, false, false);
        assert!(!opts.diffable);
        assert!(opts.overwrite);

        // explicit flag wins over the config value
        let opts = resolve_options(&input, false, false, true, false);
        assert!(opts.diffable);

        // --no-config ignores every file
        let opts = resolve_options(&input, true, false, false, false);
        assert!(!opts.overwrite);
    }

    #[test]
    fn config_parses_kebab_case_keys() {
        let config: FileConfig = toml::from_str("sort-visuals = true\n").unwrap();
        assert_eq!(config.sort_visuals, Some(true));
    }

    #[test]
    fn identical_paths_are_rejected() {
        let err = check_distinct_paths(Path::new("same/path"), Path::new("same/path"));
        assert!(matches!(err, Err(PbvError::Filesystem { .. })));
    }
}
