use rohkit::centromeres::uncovered_chromosomes;
use rohkit::classify::BoundaryMode;
use rohkit::config::{
    Args, BoundarySpec, CentromereSource, CutoffSpec, PopulationModes, RohConfig,
};
use rohkit::cutoff::CutoffMode;
use rohkit::error::Warning;
use rohkit::model::{Dataset, FrequencyTable};
use rohkit::parse::{
    load_dataset, read_bounds_table, read_centromere_file, read_cutoff_table, read_frequency_file,
};
use rohkit::pipeline::{estimate_frequencies, resampling_rng, run_dataset, PopulationOutcome};
use rohkit::progress::{population_bar, reading_spinner};
use rohkit::report::{print_summary, write_frequencies, write_outcomes, OutputPaths};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use env_logger::Builder;
use log::{info, warn, LevelFilter};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashMap;

fn main() -> Result<()> {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config = RohConfig::from_args(&args, rand::random::<u64>())?;
    info!("Random seed: {}", config.analysis.seed);

    ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build_global()
        .context("failed to build the thread pool")?;
    info!("Threads: {}", config.threads);

    let mut extra_warnings: Vec<Warning> = config.analysis.suspicious();
    for w in &extra_warnings {
        warn!("{}", w);
    }

    let spinner = reading_spinner(format!("Reading {}", config.inputs.tped.display()));
    let dataset = load_dataset(
        &config.inputs.tped,
        &config.inputs.tfam,
        config.inputs.tped_missing,
    )
    .with_context(|| format!("failed to load {}", config.inputs.tped.display()))?;
    spinner.finish_and_clear();

    let centromeres = match &config.inputs.centromeres {
        CentromereSource::File(path) => {
            if let Some(build) = args.build {
                info!("Centromere file {} overrides --build {}", path.display(), build);
            }
            read_centromere_file(path)
                .with_context(|| format!("failed to read {}", path.display()))?
        }
        CentromereSource::Build(build) => {
            info!("Using built-in {} centromeres", build);
            build.centromeres()?
        }
    };
    if let Some(w) = uncovered_chromosomes(&centromeres, &dataset.maps) {
        eprintln!("{}", w.to_string().yellow());
        extra_warnings.push(w);
    }

    let paths = OutputPaths::new(config.out.clone());
    let freqs = load_frequencies(&config, &dataset)?;
    if config.inputs.freq_file.is_none() {
        let names: Vec<String> = dataset.populations.iter().map(|p| p.name.clone()).collect();
        write_frequencies(&paths.freq(), &dataset.maps, &names, &freqs)?;
        info!("Wrote allele frequencies to {}", paths.freq().display());
    }
    if config.freq_only {
        println!("{}", "Frequencies written; stopping (--freq-only).".green());
        return Ok(());
    }

    let modes = population_modes(&config)?;
    let bar = population_bar(dataset.npop());
    let outcomes = run_dataset(
        &dataset,
        freqs,
        &centromeres,
        &config.analysis,
        &modes,
        config.raw_lod,
        Some(&bar),
    )?;
    bar.finish_with_message("done");

    let written = write_outcomes(&paths, &outcomes, &dataset.maps, &extra_warnings)?;
    for path in &written {
        info!("Wrote {}", path.display());
    }
    print_summary(&outcomes);

    if outcomes
        .iter()
        .all(|o| matches!(o, PopulationOutcome::Explored { .. }))
    {
        println!(
            "{}",
            "Window sizes explored; inspect the .kde files and rerun with --winsize.".green()
        );
    }
    Ok(())
}

fn load_frequencies(config: &RohConfig, dataset: &Dataset) -> Result<Vec<Vec<FrequencyTable>>> {
    match &config.inputs.freq_file {
        Some(path) => {
            let file = read_frequency_file(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            info!("Read frequencies for {} SNPs", file.len());
            let tables = dataset
                .populations
                .iter()
                .map(|pop| {
                    dataset
                        .maps
                        .iter()
                        .map(|map| file.table_for(map, &pop.name))
                        .collect::<rohkit::error::Result<Vec<_>>>()
                })
                .collect::<rohkit::error::Result<Vec<_>>>()?;
            Ok(tables)
        }
        None => {
            let seed = config.analysis.seed;
            let resample = config.analysis.resample;
            let tables = (0..dataset.npop())
                .into_par_iter()
                .map(|pop| {
                    let mut rng = resampling_rng(seed, pop);
                    estimate_frequencies(dataset, pop, resample, &mut rng)
                })
                .collect::<rohkit::error::Result<Vec<_>>>()?;
            Ok(tables)
        }
    }
}

fn population_modes(config: &RohConfig) -> Result<PopulationModes> {
    let fallback = config.analysis.fallback_bounds;
    let mut modes = PopulationModes::auto(fallback);

    match &config.cutoff {
        CutoffSpec::Auto => {}
        CutoffSpec::Fixed(c) => modes.default_cutoff = CutoffMode::Fixed(*c),
        CutoffSpec::Table(path) => {
            modes.cutoffs = read_cutoff_table(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
        }
    }
    match &config.bounds {
        BoundarySpec::Auto => {}
        BoundarySpec::Fixed(b) => modes.default_bounds = BoundaryMode::Fixed(*b),
        BoundarySpec::Table(path) => {
            modes.bounds = read_bounds_table(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
        }
    }
    log_table_coverage(&modes.cutoffs, "LOD cutoff");
    log_table_coverage(&modes.bounds, "size boundaries");
    Ok(modes)
}

fn log_table_coverage<V>(table: &HashMap<String, V>, what: &str) {
    if !table.is_empty() {
        info!(
            "{} given for {} populations; others are estimated",
            what,
            table.len()
        );
    }
}
