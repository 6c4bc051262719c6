//! mdweaver – command-line markdown → PDF/EPUB converter.
//!
//! Usage:
//!   mdweaver <input> [-o output] [-f pdf|epub|both] [-t "Title"] [-w "DRAFT"]
//!
//! Artifacts are written as `<output>/<name>_v<version>.<ext>`.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use mdweaver::config::{OutputFormat, WeaverConfig, VERSION_FILE};

#[derive(Parser, Debug)]
#[command(name = "mdweaver")]
#[command(version, about = "Generate PDF and/or EPUB from markdown files", long_about = None)]
#[command(after_help = "EXAMPLES:
    mdweaver lessons/                    PDF of every markdown file under lessons/
    mdweaver intro.md -f both -o dist    PDF and EPUB of one file into dist/
    mdweaver lessons/ -w CONFIDENTIAL    PDF with a diagonal watermark")]
struct Cli {
    /// Markdown file or directory containing markdown files
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pdf)]
    format: OutputFormat,

    /// Document title (default: derived from input path)
    #[arg(short, long)]
    title: Option<String>,

    /// Watermark text drawn diagonally across PDF pages
    #[arg(short, long)]
    watermark: Option<String>,

    /// Only collect markdown files directly inside INPUT
    #[arg(long)]
    no_recursive: bool,

    /// File holding the export version
    #[arg(long, value_name = "PATH", default_value = VERSION_FILE)]
    version_file: PathBuf,

    /// Log engine stages
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> WeaverConfig {
        WeaverConfig {
            output_dir: self.output.clone(),
            format: self.format,
            title: self.title.clone(),
            watermark: self.watermark.clone(),
            recursive: !self.no_recursive,
            version_file: self.version_file.clone(),
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format(|buf, record| match record.level() {
            log::Level::Info => writeln!(buf, "{}", record.args()),
            level => writeln!(buf, "{level}: {}", record.args()),
        })
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match mdweaver::run(&cli.input, &cli.config()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
