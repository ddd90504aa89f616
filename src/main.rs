use clap::{Parser, Subcommand};
use scorm_forge::media::fetch::{HttpFetcher, MediaFetcher, OfflineFetcher};
use scorm_forge::media::{AssetLibrary, NamedAsset};
use scorm_forge::{compile, config, naming, normalize, output, package};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Used when `RUST_LOG` is unset. Progress already goes to stdout.
const DEFAULT_LOG_FILTER: &str = "scorm_forge=warn";

#[derive(Parser)]
#[command(name = "scorm-forge")]
#[command(about = "Compile course documents into SCORM 1.2 packages")]
#[command(long_about = "\
Compile course documents into SCORM 1.2 packages

A course is a JSON document (title, welcome and objectives pages, topics with
optional knowledge checks, an assessment) plus a directory of media files.
The package is a zip an LMS can import directly:

  imsmanifest.xml
  index.html                     # launch page, loads the runtime
  pages/welcome.html             # one fragment per page
  pages/objectives.html
  pages/topic-1.html ...
  pages/assessment.html
  scripts/navigation.js          # navigation, grading, SCORM 1.2 reporting
  styles/main.css
  media/audio/audio-0001.mp3     # narration, named by block number
  media/captions/caption-0001.vtt
  media/images/, media/video/    # page media, named by media id

Media files referenced by the course are looked up in --media by relative
path, then by file name.

Run 'scorm-forge gen-config' to print a documented scorm.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (optional; stock defaults otherwise)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a package from a course document and its media
    Build {
        /// Course document (JSON)
        #[arg(long)]
        course: PathBuf,
        /// Directory holding the course's media files
        #[arg(long)]
        media: Option<PathBuf>,
        /// Output archive (default: course file name with .zip)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Never fetch remote media
        #[arg(long)]
        offline: bool,
    },
    /// Validate a course document and print its outline
    Check {
        /// Course document (JSON)
        #[arg(long)]
        course: PathBuf,
    },
    /// Verify an existing package and list its contents
    Inspect {
        /// Package archive
        archive: PathBuf,
    },
    /// Print a stock scorm.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            course,
            media,
            output: archive,
            offline,
        } => {
            let config = config::load_config(cli.config.as_deref())?;
            let document = read_course(&course)?;
            let assets = match &media {
                Some(dir) => load_assets(dir)?,
                None => AssetLibrary::default(),
            };
            let fetcher: Box<dyn MediaFetcher> = if offline {
                Box::new(OfflineFetcher)
            } else {
                Box::new(HttpFetcher::new(FETCH_TIMEOUT)?)
            };
            let archive = archive.unwrap_or_else(|| course.with_extension("zip"));

            println!("==> Building {}", course.display());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_progress_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = compile::compile(&document, &assets, &config, fetcher.as_ref(), Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            let package = result?;

            std::fs::write(&archive, &package.bytes)?;
            output::print_package_summary(&package, &archive);
        }
        Command::Check { course } => {
            let config = config::load_config(cli.config.as_deref())?;
            println!("==> Checking {}", course.display());
            let document = read_course(&course)?;
            let doc = normalize::normalize(&document, &config.course)?;
            output::print_outline(&doc);
            println!("==> Course is valid");
        }
        Command::Inspect { archive } => {
            let bytes = std::fs::read(&archive)?;
            let report = package::inspect(&bytes)?;
            output::print_inspect_report(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `RUST_LOG` directives when set and valid, the quiet default otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn read_course(path: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Every file under `dir`, named by its path relative to `dir`.
fn load_assets(dir: &Path) -> Result<AssetLibrary, Box<dyn std::error::Error>> {
    let mut assets = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .strip_prefix(dir)?
            .to_string_lossy()
            .replace('\\', "/");
        let mime = naming::extension_of(&name).and_then(|ext| naming::mime_for_extension(&ext));
        let data = std::fs::read(entry.path())?;
        tracing::debug!(asset = %name, bytes = data.len(), "Loaded media file");
        assets.push(NamedAsset::new(name, mime, data));
    }
    tracing::info!(count = assets.len(), dir = %dir.display(), "Loaded media directory");
    Ok(AssetLibrary::new(assets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_defaults_to_warnings() {
        assert_eq!(log_filter(None).to_string(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn log_filter_honors_env_directives() {
        let filter = log_filter(Some("scorm_forge=debug")).to_string();
        assert!(filter.contains("scorm_forge=debug"), "{filter}");
        assert!(!filter.contains("warn"), "{filter}");
    }
}
