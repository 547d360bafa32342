use anyhow::{Context, Result};
use clap::Parser;
use marginfx::cli::{Cli, OutputFormat};
use marginfx::config::AnalysisConfig;
use marginfx::html_output::HtmlOutput;
use marginfx::json_output::JsonOutput;
use marginfx::{csv_output, loader, pipeline, region, summary};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Config file (or defaults) with CLI overrides applied, validated
fn load_config(args: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(strategy) = args.region_mapping {
        config.regions.strategy = strategy;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = load_config(&args)?;
    let delimiter = args.delimiter_byte().map_err(anyhow::Error::msg)?;

    let mapper = region::mapper_for(&config.regions);
    let data = loader::load_path(&args.input, &config, mapper.as_ref(), delimiter)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    for warning in data.validation.warnings() {
        eprintln!("⚠️  {}", warning);
    }

    let report = pipeline::run(&data, &config);

    if let Some(dir) = &args.out_dir {
        let written = csv_output::write_all(&report, &data.transactions, dir)?;
        JsonOutput::new(&report)
            .with_input(&args.input)
            .write(&dir.join("report.json"))?;
        HtmlOutput::new(&report).write(&dir.join("report.html"))?;
        tracing::info!(
            dir = %dir.display(),
            files = written.len() + 2,
            "exported tables and reports"
        );
    }

    if let Some(path) = &args.html {
        HtmlOutput::new(&report).write(path)?;
    }

    match args.format {
        OutputFormat::Text => print!("{}", summary::to_report_string(&report)),
        OutputFormat::Json => println!(
            "{}",
            JsonOutput::new(&report).with_input(&args.input).to_json()?
        ),
        OutputFormat::Csv => print!("{}", csv_output::comparison_table(&report).to_csv()?),
    }

    Ok(())
}
