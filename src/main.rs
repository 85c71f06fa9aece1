/*
WristPilot - control de dron por gestos de muñeca

Un solo proceso con los dos dispositivos:
1. Reloj: muestrea el movimiento a 50 Hz, decide intención por gravedad y
   trucos con el modelo de secuencia, y pide comandos al teléfono
2. Teléfono: reenvía cada petición al dron por UDP (puerto 8889) y escucha
   su estado (puerto 8890)

Con una grabación y despegue automático, 30 segundos:
    ./target/release/wristpilot --recording vuelo.csv --takeoff --duration-secs 30

Sin reloj ni grabación (poses simuladas):
    ./target/release/wristpilot --simulate

Con el modelo ONNX hay que compilar con la feature `onnx`:
    cargo build --release --features onnx
    ./target/release/wristpilot --model gesture_seq.onnx --classes classes.json --simulate

Logs: RUST_LOG=wristpilot=debug
*/

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use std::net::IpAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use wristpilot::companion::Companion;
use wristpilot::config::PilotConfig;
use wristpilot::controller::Controller;
use wristpilot::csv_loader::RecordedMotion;
use wristpilot::drone::DroneTransport;
use wristpilot::link::channel_pair;
use wristpilot::model::{ScriptedModel, SequenceModel};
use wristpilot::sampler::MotionSource;
use wristpilot::simulator::SimulatedMotion;
use wristpilot::types::FlightState;

#[derive(Parser, Debug)]
#[command(name = "wristpilot", about = "Control de dron por gestos de muñeca")]
struct Args {
    /// Configuración JSON (opcional; sin ella se usan los valores por defecto)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grabación CSV de sensores a reproducir como si fuera el reloj
    #[arg(long, conflicts_with = "simulate")]
    recording: Option<PathBuf>,

    /// Repite la grabación al llegar al final
    #[arg(long = "loop", requires = "recording")]
    loop_recording: bool,

    /// Poses simuladas en lugar de grabación
    #[arg(long)]
    simulate: bool,

    /// Semilla del simulador
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Modelo de secuencia ONNX (requiere la feature `onnx`)
    #[arg(long)]
    model: Option<String>,

    /// Mapa índice → etiqueta del modelo
    #[arg(long, default_value = "classes.json")]
    classes: String,

    /// IP del dron (sobrescribe la configuración)
    #[arg(long)]
    drone_host: Option<IpAddr>,

    /// Despega al arrancar el muestreo
    #[arg(long)]
    takeoff: bool,

    /// Duración de la sesión; al terminar se para todo
    #[arg(long)]
    duration_secs: Option<u64>,
}

fn load_config(args: &Args) -> Result<PilotConfig> {
    let mut config = match &args.config {
        Some(path) => PilotConfig::load(path)
            .with_context(|| format!("No se pudo cargar la configuración {:?}", path))?,
        None => PilotConfig::default(),
    };
    if let Some(host) = args.drone_host {
        config.drone.host = host;
    }
    config.validate()?;
    Ok(config)
}

fn motion_source(args: &Args) -> Result<Box<dyn MotionSource>> {
    match &args.recording {
        Some(path) => {
            let recording = RecordedMotion::from_csv(path)?.looping(args.loop_recording);
            println!("🎞️  Grabación: {:?} ({} muestras)", path, recording.len());
            Ok(Box::new(recording))
        }
        None => {
            if !args.simulate {
                println!("ℹ️  Sin --recording: usando poses simuladas");
            }
            Ok(Box::new(SimulatedMotion::tour(args.seed)))
        }
    }
}

#[cfg(feature = "onnx")]
fn sequence_model(args: &Args) -> Result<Box<dyn SequenceModel + Send>> {
    use wristpilot::model::OnnxSequenceModel;

    match &args.model {
        Some(path) => {
            println!("🔧 Inicializando modelo ONNX...");
            let model = OnnxSequenceModel::new(path, &args.classes)?;
            println!("✅ Modelo cargado ({} etiquetas)\n", model.labels().len());
            Ok(Box::new(model))
        }
        None => Ok(Box::new(ScriptedModel::idle())),
    }
}

#[cfg(not(feature = "onnx"))]
fn sequence_model(args: &Args) -> Result<Box<dyn SequenceModel + Send>> {
    if args.model.is_some() {
        bail!("--model requiere compilar con --features onnx");
    }
    Ok(Box::new(ScriptedModel::idle()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("🎯 WristPilot - control de dron por gestos\n");
    let args = Args::parse();
    let config = load_config(&args)?;

    if args.model.is_none() {
        println!("ℹ️  Sin modelo: sólo intención por gravedad, sin trucos");
    }
    let model = sequence_model(&args)?;
    let source = motion_source(&args)?;

    // Enlace reloj ↔ teléfono
    let (watch, phone) = channel_pair(config.link.capacity);
    watch.activate();
    phone.activate();

    println!(
        "🛩️  Dron en {}:{} (estado en :{})",
        config.drone.host, config.drone.command_port, config.drone.state_port
    );
    let transport = DroneTransport::connect(&config.drone)
        .context("No se pudieron abrir los puertos UDP del dron")?;

    // Hilo del teléfono
    let (companion_stop_tx, companion_stop_rx) = bounded::<()>(1);
    let mut companion = Companion::new(transport, phone, config.dispatch.ping_interval());
    let companion_handle = thread::Builder::new()
        .name("companion".into())
        .spawn(move || {
            companion.run(companion_stop_rx);
            companion
        })?;

    let mut controller = Controller::from_config(source, model, watch, &config);

    let (stop_tx, stop_rx) = bounded::<()>(1);
    // sin límite el emisor vive hasta Ctrl-C
    let _stop_tx = match args.duration_secs {
        Some(secs) => {
            thread::spawn(move || {
                thread::sleep(Duration::from_secs(secs));
                let _ = stop_tx.send(());
            });
            None
        }
        None => Some(stop_tx),
    };

    controller.start_sampling()?;
    if args.takeoff {
        controller.take_off();
    }
    println!("🎬 Volando...\n");
    controller.run(stop_rx);

    println!("\n🛑 Fin de sesión");
    controller.emergency_stop();
    // margen para que el teléfono procese la emergencia
    thread::sleep(Duration::from_millis(200));
    let _ = companion_stop_tx.send(());

    let mut companion = match companion_handle.join() {
        Ok(companion) => companion,
        Err(_) => bail!("El hilo del teléfono terminó con pánico"),
    };
    if companion.flight_state() == FlightState::Airborne {
        companion.toggle_takeoff_land();
    }

    let status = controller.status();
    println!(
        "📊 {} muestras, {} enviados, {} descartados, último comando: {}",
        status.samples_seen,
        controller.relay().sent(),
        controller.relay().dropped(),
        status
            .last_command
            .map(|c| c.to_wire())
            .unwrap_or_else(|| "-".into())
    );
    println!(
        "📡 {} datagramas del dron, último truco: {}",
        companion.transport().datagrams_received(),
        companion.trick_label()
    );
    Ok(())
}
