use edit_risk::config::{load_config_or_default, EngineConfig};
use edit_risk::RiskEngine;
use log::LevelFilter;

// Edits seen while tuning the scoring constants.
const SAMPLE_EDITS: &[&str] = &[
    "Fixed a typo in the infobox and added a citation",
    "This is a great classroom assignment",
    "you are a f**k",
    "what a b.i.t.c.h",
    "Y0U ARE AN ID1OT",
    "fuck you bitch, cunt",
    "just kill   yourself",
    "the assassin passed the embassy in Scunthorpe",
    "see https://example.com for details",
    "contact me at jane.doe@example.org or 555-123-4567",
    "lol!!!!!!!!!!!!!!!!!!!!",
    "THIS PAGE IS COMPLETELY WRONG AND YOU KNOW IT",
    "sh\u{200B}it happens",
    "$h1t $h1t $h1t",
];

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => load_config_or_default(path),
        None => EngineConfig::default(),
    };

    let engine: RiskEngine = match config.build_engine() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to build engine: {e:#}");
            std::process::exit(1);
        }
    };

    println!("Evaluating {} sample edits", SAMPLE_EDITS.len());
    println!();

    for text in SAMPLE_EDITS {
        let evaluation = engine.evaluate(text);
        println!("Text: {text:?}");
        println!(
            "  Risk: {} (score {:.2}, alert: {})",
            evaluation.risk,
            evaluation.final_score,
            evaluation.meets(config.alert_threshold)
        );
        for m in &evaluation.matches {
            println!(
                "  - {} {:?} confidence {:.3} obfuscation {:+.3} severity {:.1}",
                m.rule_name, m.matched, m.confidence, m.obfuscation, m.severity
            );
        }
        if !evaluation.matches.is_empty() {
            println!("  Diagnostics: {:?}", evaluation.diagnostics);
        }
        println!();
    }
}
