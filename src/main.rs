use clap::{Arg, ArgAction, Command};
use edit_risk::config::{load_config, EngineConfig};
use edit_risk::{Catalog, Evaluation, RiskEngine};
use log::LevelFilter;
use std::io::Read;
use std::path::PathBuf;
use std::process;

fn main() {
    let matches = Command::new("edit-risk")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Score user-submitted text for abuse, tolerating obfuscation")
        .arg(
            Arg::new("text")
                .value_name("TEXT")
                .help("Text to evaluate (reads --file or stdin when omitted)")
                .num_args(0..),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Evaluate the contents of a file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .value_name("FILE")
                .help("Term catalog to use instead of the built-in one")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("confusables")
                .long("confusables")
                .value_name("FILE")
                .help("Confusable table to use instead of the built-in one")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the evaluation as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-catalog")
                .long("test-catalog")
                .help("Compile every catalog rule and report counts")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging with per-match details")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let loaded = matches
        .get_one::<String>("config")
        .map(|path| (path, load_config(path)));

    // Initialize logger based on verbose flag, then the config file
    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        match &loaded {
            Some((_, Ok(config))) => config.log_level().unwrap_or(LevelFilter::Info),
            _ => LevelFilter::Info,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let mut config = match loaded {
        Some((path, Ok(config))) => {
            log::info!("Loaded configuration from: {}", path);
            config
        }
        Some((_, Err(e))) => {
            log::warn!("Failed to load config ({:#}), using defaults", e);
            EngineConfig::default()
        }
        None => EngineConfig::default(),
    };

    if let Some(path) = matches.get_one::<String>("catalog") {
        config.catalog_path = Some(PathBuf::from(path));
    }
    if let Some(path) = matches.get_one::<String>("confusables") {
        config.confusables_path = Some(PathBuf::from(path));
    }

    if matches.get_flag("test-catalog") {
        test_catalog(&config);
        return;
    }

    let engine = match config.build_engine() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error building engine: {e:#}");
            process::exit(1);
        }
    };

    let text = match read_input(&matches) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading input: {e:#}");
            process::exit(1);
        }
    };

    let evaluation = engine.evaluate(&text);
    if matches.get_flag("json") {
        match serde_json::to_string_pretty(&evaluation) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error encoding evaluation: {e}");
                process::exit(1);
            }
        }
    } else {
        print_evaluation(&evaluation);
    }

    if evaluation.meets(config.alert_threshold) {
        process::exit(2);
    }
}

fn read_input(matches: &clap::ArgMatches) -> anyhow::Result<String> {
    use anyhow::Context;

    if let Some(words) = matches.get_many::<String>("text") {
        return Ok(words.cloned().collect::<Vec<_>>().join(" "));
    }
    if let Some(path) = matches.get_one::<String>("file") {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {path}"));
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read stdin")?;
    Ok(text)
}

fn test_catalog(config: &EngineConfig) {
    println!("Testing term catalog...");

    let catalog = match config.load_catalog() {
        Ok(catalog) => catalog,
        Err(e) => {
            println!("Catalog failed to load: {e:#}");
            process::exit(1);
        }
    };
    let counts = catalog.counts();
    println!("Number of rules: {}", catalog.len());
    println!("  Literals:   {}", counts.literals);
    println!("  Patterns:   {}", counts.patterns);
    println!("  Predicates: {}", counts.predicates);

    match compile_catalog(config, &catalog) {
        Ok(engine) => println!("All {} rules compiled successfully.", engine.rule_count()),
        Err(e) => {
            println!("Catalog validation failed: {e:#}");
            process::exit(1);
        }
    }
}

fn compile_catalog(config: &EngineConfig, catalog: &Catalog) -> anyhow::Result<RiskEngine> {
    let table = config.load_confusables()?;
    let analyzer = config.load_analyzer()?;
    Ok(RiskEngine::new(catalog, table, analyzer)?)
}

fn print_evaluation(evaluation: &Evaluation) {
    println!(
        "Risk: {} (score {:.2})",
        evaluation.risk, evaluation.final_score
    );
    for m in &evaluation.matches {
        println!(
            "  {:<24} {:?} at {}..{} confidence {:.2} obfuscation {:+.2} severity {:.2}",
            m.rule_name,
            m.matched,
            m.original_span.0,
            m.original_span.1,
            m.confidence,
            m.obfuscation,
            m.severity
        );
    }
    if !evaluation.matches.is_empty() {
        let d = &evaluation.diagnostics;
        println!(
            "  matches {} (unique {}, critical {}), raw {:.2}, density -{:.2}, repetition -{:.2}",
            d.match_count,
            d.unique_rules,
            d.critical_patterns,
            d.raw_score,
            d.density_penalty,
            d.repetition_penalty
        );
    }
}
