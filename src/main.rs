use clap::{Args, Parser, Subcommand};
use chrono::Local;
use ffpcheck::config::Config;
use ffpcheck::generate::{batch_of, Generator};
use ffpcheck::logging::{self, log_file_name, GENERATE_LOG_PREFIX, VERIFY_LOG_PREFIX};
use ffpcheck::parallel::with_jobs;
use ffpcheck::report::BatchReport;
use ffpcheck::scan::{check_root, clean_root_arg};
use ffpcheck::source::{build_source, FingerprintSource, SourceKind};
use ffpcheck::verify::Verifier;
use ffpcheck::FlacTestProbe;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "ffp", version, about = "Generate and verify FLAC fingerprint (.ffp) manifests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write <folder>.ffp into every album folder under ROOT that has none
    Generate {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Check every .ffp manifest found anywhere under ROOT
    Verify {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Directory to process
    root: String,
    /// Configuration file (default: ./ffp.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// flac executable used for the decode test
    #[arg(long)]
    flac: Option<PathBuf>,
    /// metaflac executable, for --source metaflac
    #[arg(long)]
    metaflac: Option<PathBuf>,
    /// Fingerprint source: streaminfo (default) or metaflac
    #[arg(long)]
    source: Option<String>,
    /// Worker threads (0 = one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Do not keep an error log file in ROOT
    #[arg(long)]
    no_log_file: bool,
    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
    /// More diagnostics on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(flac) = &self.flac { config.tools.flac = flac.clone(); }
        if let Some(metaflac) = &self.metaflac { config.tools.metaflac = metaflac.clone(); }
        if let Some(source) = &self.source { config.tools.fingerprint_source = source.clone(); }
        if let Some(jobs) = self.jobs { config.run.jobs = jobs; }
        if self.no_log_file { config.run.log_file = false; }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (run, generate) = match Cli::parse().command {
        Commands::Generate { run } => (run, true),
        Commands::Verify { run }   => (run, false),
    };

    let root = clean_root_arg(&run.root);
    check_root(&root)?;
    let mut config = Config::load(run.config.as_deref())?;
    run.apply(&mut config);
    let kind = config.source_kind()?;

    let prefix = if generate { GENERATE_LOG_PREFIX } else { VERIFY_LOG_PREFIX };
    let log_path = config.run.log_file.then(|| root.join(log_file_name(prefix, Local::now())));
    let guard = logging::init(run.verbose, log_path.as_deref())?;

    let source = build_source(kind, &config.tools.metaflac);
    let batch = if generate {
        run_generate(&root, &config, source.as_ref(), run.json)?
    } else {
        run_verify(&root, &config, source.as_ref(), run.json)?
    };

    // ── Summary ──────────────────────────────────────────────────────────────
    info!(attempted = batch.attempted, errors = batch.error_count(), "finished");
    if !run.json {
        println!();
        println!("{}", batch.summary());
        for e in &batch.errors {
            println!("{e}");
        }
    }

    guard.finish();
    if !batch.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

// ── Generate ─────────────────────────────────────────────────────────────────

fn run_generate(
    root:   &Path,
    config: &Config,
    source: &dyn FingerprintSource,
    json:   bool,
) -> Result<BatchReport, Box<dyn std::error::Error>> {
    let generator = Generator::new(source, config.generate_options());
    let folders = with_jobs(config.run.jobs, || generator.generate_tree(root))?;
    let batch = batch_of(&folders);
    if json {
        println!("{}", batch.to_json()?);
    } else {
        for line in &batch.results {
            println!("{line}");
        }
    }
    Ok(batch)
}

// ── Verify ───────────────────────────────────────────────────────────────────

fn run_verify(
    root:   &Path,
    config: &Config,
    source: &dyn FingerprintSource,
    json:   bool,
) -> Result<BatchReport, Box<dyn std::error::Error>> {
    if source.kind() == SourceKind::Metaflac {
        info!(metaflac = %config.tools.metaflac.display(), "fingerprints from metaflac");
    }
    let probe = FlacTestProbe::new(&config.tools.flac);
    let verifier = Verifier::new(source, &probe);
    let ext = &config.scan.manifest_extension;
    let tree = with_jobs(config.run.jobs, || verifier.verify_tree(root, ext))?;

    if json {
        println!("{}", tree.to_json()?);
        return Ok(tree.to_batch());
    }

    println!("Searching for *.{ext} files in {} and verifying signatures", root.display());
    if tree.manifests.is_empty() {
        println!("No fingerprints to verify");
    }
    for report in &tree.manifests {
        let name = report.manifest.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let dir = report.manifest.parent().unwrap_or(root);
        println!("Verifying {name} in {}:", dir.display());
        for line in report.to_batch().results {
            println!("{line}");
        }
    }
    for e in &tree.scan_errors {
        println!("{e}");
    }
    Ok(tree.to_batch())
}
