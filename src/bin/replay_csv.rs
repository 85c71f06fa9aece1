use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use wristpilot::config::PilotConfig;
use wristpilot::csv_loader::load_samples_from_csv;
use wristpilot::gesture_classifier::WindowOutcome;
use wristpilot::model::ScriptedModel;
use wristpilot::pipeline::GesturePipeline;
use wristpilot::types::WINDOW_SIZE;

const USAGE: &str =
    "Uso: replay_csv [--label <etiqueta>] [--probability <p>] [--config <json>] <grabación.csv>";

struct ReplayOptions {
    label: String,
    probability: f32,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<(PathBuf, ReplayOptions)> {
    let mut opts = ReplayOptions {
        label: "5".to_string(),
        probability: 1.0,
        config: None,
    };
    let mut csv_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--label" => {
                opts.label = args.next().ok_or_else(|| anyhow!("--label sin valor"))?;
            }
            "--probability" => {
                let value = args.next().ok_or_else(|| anyhow!("--probability sin valor"))?;
                opts.probability = value
                    .parse()
                    .with_context(|| format!("Probabilidad inválida: {}", value))?;
            }
            "--config" => {
                let value = args.next().ok_or_else(|| anyhow!("--config sin valor"))?;
                opts.config = Some(PathBuf::from(value));
            }
            _ => {
                if csv_path.is_some() || arg.starts_with("--") {
                    bail!(USAGE);
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("Debes especificar un archivo CSV"))?;
    Ok((csv_path, opts))
}

fn main() -> Result<()> {
    let (csv_path, opts) = parse_args()?;
    println!("🎞️  Reproduciendo grabación desde {:?}", csv_path);

    let config = match &opts.config {
        Some(path) => PilotConfig::load(path)?,
        None => PilotConfig::default(),
    };
    config.validate()?;

    let samples = load_samples_from_csv(&csv_path)?;
    println!(
        "ℹ️  {} muestras ({} ventanas completas)",
        samples.len(),
        samples.len() / WINDOW_SIZE
    );
    println!(
        "🤖 Modelo fijo: etiqueta {:?} con p = {:.2}\n",
        opts.label, opts.probability
    );

    let model = ScriptedModel::new(opts.label.clone(), opts.probability);
    let mut pipeline = GesturePipeline::from_config(model, &config);
    let mut emitted = 0usize;
    let mut windows_seen = 0u64;

    for (idx, sample) in samples.iter().enumerate() {
        let commands = pipeline.on_sample(sample);
        for command in &commands {
            println!("  {:>5}  t={:>8.3}  {}", idx + 1, sample.timestamp, command);
            emitted += 1;
        }
        if pipeline.gestures().windows_classified() == windows_seen {
            continue;
        }
        windows_seen = pipeline.gestures().windows_classified();
        match &pipeline.status().last_window {
            Some(WindowOutcome::Discarded(trick)) => {
                println!("  {:>5}  ⏸️  {:?} descartado (antirrebote)", idx + 1, trick)
            }
            Some(WindowOutcome::Unrecognised(label)) => {
                println!("  {:>5}  ⚠️  Etiqueta desconocida {:?}", idx + 1, label)
            }
            Some(WindowOutcome::ModelFailed) => println!("  {:>5}  ❌ Fallo del modelo", idx + 1),
            Some(WindowOutcome::Emitted(_)) | None => {}
        }
    }

    let status = pipeline.status();
    println!("\n📊 {} comandos emitidos", emitted);
    println!(
        "🥇 Última intención: {}",
        status.last_intent.map(|i| i.as_str()).unwrap_or("-")
    );
    println!(
        "🤸 Último truco: {}",
        status.last_trick.map(|t| t.label()).unwrap_or("-")
    );
    Ok(())
}
