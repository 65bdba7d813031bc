use clap::Parser;
use darkiv::analysis::batch;
use darkiv::config::AnalysisConfig;
use darkiv::output;
use darkiv::stats::Stats;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Extract Rsh, Rs, J0 and n from dark IV measurements
#[derive(Parser)]
#[command(name = "darkiv", version)]
struct Cli {
    /// Measurement files (.csv, .txt, .tsv, .dat, .iv, .xlsx, .xls, .ods)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// TOML analysis configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device area in cm^2 (overrides the config file)
    #[arg(long)]
    area: Option<f64>,

    /// Device temperature in K (overrides the config file)
    #[arg(long)]
    temperature: Option<f64>,

    /// Smoothing window length, odd (overrides the config file)
    #[arg(long)]
    window: Option<usize>,

    /// Smoothing polynomial order (overrides the config file)
    #[arg(long)]
    order: Option<usize>,

    /// Write V, J, n(V) and Rdiff(V) per sample into this directory
    #[arg(long)]
    curves_dir: Option<PathBuf>,

    /// Print run statistics to stderr
    #[arg(long)]
    stats: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut stats = if cli.stats { Some(Stats::new()) } else { None };

    let config = build_config(&cli).unwrap_or_else(|e| {
        eprintln!("Config error: {}", e);
        std::process::exit(1);
    });

    let start = Instant::now();
    let reports = batch::run_files(&cli.files, &config);
    if let Some(ref mut s) = stats {
        s.add_phase("analysis", start.elapsed());
        s.record_reports(&reports);
    }

    let mut stdout = io::stdout();
    output::write_summary_csv(&reports, &mut stdout).unwrap_or_else(|e| {
        eprintln!("Output error: {}", e);
        std::process::exit(1);
    });

    if let Some(dir) = &cli.curves_dir {
        let start = Instant::now();
        if let Err(e) = write_curves(dir, &reports) {
            eprintln!("Curve output error: {}", e);
            std::process::exit(1);
        }
        if let Some(ref mut s) = stats {
            s.add_phase("curve export", start.elapsed());
        }
    }

    if let Some(ref stats) = stats {
        stats.display();
    }
}

fn build_config(cli: &Cli) -> darkiv::Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(area) = cli.area {
        config.area = area;
    }
    if let Some(t) = cli.temperature {
        config.temperature_k = t;
    }
    if let Some(w) = cli.window {
        config.smoothing.window = w;
    }
    if let Some(o) = cli.order {
        config.smoothing.order = o;
    }
    config.validate()?;
    Ok(config)
}

fn write_curves(dir: &Path, reports: &[batch::SampleReport]) -> darkiv::Result<()> {
    std::fs::create_dir_all(dir)?;
    let names = output::curve_file_names(reports.iter().map(|r| r.name.as_str()));
    for (report, name) in reports.iter().zip(names) {
        let Ok(analysis) = &report.outcome else {
            continue;
        };
        let path = dir.join(name);
        let mut file = io::BufWriter::new(std::fs::File::create(&path)?);
        output::write_curves_csv(analysis, &mut file)?;
        file.flush()?;
        tracing::debug!(path = %path.display(), "wrote curves");
    }
    Ok(())
}
