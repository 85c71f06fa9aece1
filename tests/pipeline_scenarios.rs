use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use wristpilot::command::DroneCommand;
use wristpilot::companion::Companion;
use wristpilot::config::PilotConfig;
use wristpilot::controller::Controller;
use wristpilot::csv_loader::RecordedMotion;
use wristpilot::drone::DroneTransport;
use wristpilot::link::{channel_pair, ChannelLink, Envelope, Link};
use wristpilot::model::ScriptedModel;
use wristpilot::pipeline::GesturePipeline;
use wristpilot::types::{FlightState, SensorSample, Trick, Vec3, WINDOW_SIZE};

const HOVER_G: Vec3 = Vec3::new(0.0, 0.0, -1.0);
const DESCEND_G: Vec3 = Vec3::new(1.0, 0.0, -0.2);

fn sample(i: usize, g: Vec3) -> SensorSample {
    SensorSample::with_gravity(i as f64 * 0.02, g)
}

/// Gravedad por índice (1-based): descenso en la muestra 50, reposo el resto
fn scenario_gravity(index: usize) -> Vec3 {
    if index == 50 {
        DESCEND_G
    } else {
        HOVER_G
    }
}

#[test]
fn test_end_to_end_left_roll_over_two_windows() {
    let model = ScriptedModel::new("0", 0.75);
    let mut pipeline = GesturePipeline::from_config(model, &PilotConfig::default());
    let mut emitted: Vec<(usize, String)> = Vec::new();

    for index in 1..=2 * WINDOW_SIZE {
        for command in pipeline.on_sample(&sample(index, scenario_gravity(index))) {
            emitted.push((index, command.to_wire()));
        }
    }

    assert_eq!(
        emitted,
        vec![
            (25, "rc 0 0 0 0".to_string()),
            (50, "rc 0 0 -20 0".to_string()),
            (75, "rc 0 0 0 0".to_string()),
            (100, "rc 0 0 0 0".to_string()),
            (100, "flip r".to_string()),
        ]
    );
    let flips = emitted.iter().filter(|(_, w)| w.starts_with("flip")).count();
    assert_eq!(flips, 1);
    assert_eq!(pipeline.status().last_trick, Some(Trick::LeftRoll));
    assert_eq!(pipeline.gestures().windows_classified(), 2);
    assert_eq!(pipeline.gestures().model().calls(), 2);
}

#[test]
fn test_isolated_front_flip_then_hover_emits_nothing() {
    let model = ScriptedModel::idle().then("2", 0.9).then("5", 0.9);
    let mut pipeline = GesturePipeline::from_config(model, &PilotConfig::default());

    let flips: Vec<DroneCommand> = (1..=2 * WINDOW_SIZE)
        .flat_map(|i| pipeline.on_sample(&sample(i, HOVER_G)))
        .filter(|c| !c.is_rc())
        .collect();
    assert!(flips.is_empty());
}

#[test]
fn test_low_confidence_flip_is_hover() {
    let model = ScriptedModel::new("3", 0.599_999);
    let mut pipeline = GesturePipeline::from_config(model, &PilotConfig::default());
    let commands: Vec<DroneCommand> = (1..=2 * WINDOW_SIZE)
        .flat_map(|i| pipeline.on_sample(&sample(i, HOVER_G)))
        .collect();
    assert!(commands.iter().all(|c| c.is_rc()));
    assert_eq!(pipeline.status().last_trick, Some(Trick::None));
}

// ---------------------------------------------------------------------------
// Pila completa: reloj → enlace → teléfono → dron UDP falso
// ---------------------------------------------------------------------------

fn localhost(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

struct Stack {
    drone: UdpSocket,
    watch: Controller<RecordedMotion, ScriptedModel, ChannelLink>,
    phone: Companion<ChannelLink>,
}

impl Stack {
    fn new(model: ScriptedModel, samples: Vec<SensorSample>) -> Self {
        let drone = UdpSocket::bind(localhost(0)).unwrap();
        drone
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let transport =
            DroneTransport::connect_with(localhost(0), localhost(0), drone.local_addr().unwrap())
                .unwrap();

        let config = PilotConfig::default();
        let (watch_link, phone_link) = channel_pair(config.link.capacity);
        watch_link.activate();
        phone_link.activate();

        let watch = Controller::from_config(
            RecordedMotion::new("scenario", samples),
            model,
            watch_link,
            &config,
        );
        let phone = Companion::new(transport, phone_link, config.dispatch.ping_interval());
        let stack = Self {
            drone,
            watch,
            phone,
        };
        assert_eq!(stack.drone_recv(), "command");
        stack
    }

    fn drone_recv(&self) -> String {
        let mut buf = [0u8; 256];
        let (len, _) = self.drone.recv_from(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }

    /// Entrega al teléfono lo que el reloj haya enviado
    fn pump_phone(&mut self) {
        let frames: Vec<Vec<u8>> = self.phone.relay().link().incoming().try_iter().collect();
        for frame in frames {
            self.phone.handle_frame(&frame);
        }
    }

    /// Entrega al reloj lo que el teléfono haya enviado
    fn pump_watch(&mut self) {
        let frames: Vec<Vec<u8>> = self.watch.relay().link().incoming().try_iter().collect();
        for frame in frames {
            self.watch.handle_frame(&frame);
        }
    }
}

#[test]
fn test_full_stack_flight() {
    let samples = (1..=2 * WINDOW_SIZE)
        .map(|i| sample(i, scenario_gravity(i)))
        .collect();
    let mut stack = Stack::new(ScriptedModel::new("0", 0.75), samples);

    stack.watch.start_sampling().unwrap();
    stack.watch.take_off();
    stack.pump_phone();
    assert_eq!(stack.drone_recv(), "takeoff");
    assert_eq!(stack.phone.flight_state(), FlightState::Airborne);

    for _ in 0..2 * WINDOW_SIZE {
        stack.watch.tick();
        stack.pump_phone();
        stack.pump_watch();
    }

    let wires: Vec<String> = (0..5).map(|_| stack.drone_recv()).collect();
    assert_eq!(
        wires,
        vec!["rc 0 0 0 0", "rc 0 0 -20 0", "rc 0 0 0 0", "rc 0 0 0 0", "flip r"]
    );
    assert_eq!(stack.phone.trick_label(), "Right Roll");
    assert_eq!(stack.watch.status().samples_seen, 100);
    assert_eq!(stack.watch.relay().dropped(), 0);

    // la grabación se agota y el muestreo se detiene solo
    assert_eq!(stack.watch.tick(), 0);
    assert!(!stack.watch.is_sampling());
}

#[test]
fn test_emergency_from_phone_stops_watch() {
    let samples = (1..=4 * WINDOW_SIZE).map(|i| sample(i, HOVER_G)).collect();
    let mut stack = Stack::new(ScriptedModel::idle(), samples);

    stack.phone.toggle_takeoff_land();
    assert_eq!(stack.drone_recv(), "takeoff");
    stack.pump_watch();

    stack.watch.start_sampling().unwrap();
    for _ in 0..10 {
        stack.watch.tick();
    }

    stack.phone.emergency();
    assert_eq!(stack.drone_recv(), "emergency");
    assert_eq!(stack.phone.flight_state(), FlightState::Grounded);

    stack.pump_watch();
    assert!(!stack.watch.is_sampling());
    assert_eq!(stack.watch.emergencies(), 1);

    // el reloj también pide emergencia; el teléfono la reenvía
    stack.pump_phone();
    assert_eq!(stack.drone_recv(), "emergency");
    assert_eq!(stack.watch.tick(), 0);
}

#[test]
fn test_phone_unreachable_drops_without_queueing() {
    // el teléfono nunca activa su sesión
    let (watch_link, _phone_link) = channel_pair(4);
    let mut watch = Controller::from_config(
        RecordedMotion::new("orphan", (1..=WINDOW_SIZE).map(|i| sample(i, HOVER_G)).collect()),
        ScriptedModel::idle(),
        watch_link,
        &PilotConfig::default(),
    );
    watch.start_sampling().unwrap();
    for _ in 0..WINDOW_SIZE {
        watch.tick();
    }
    assert_eq!(watch.relay().sent(), 0);
    assert_eq!(watch.relay().dropped(), 2);
    assert!(watch.dispatcher().is_empty());
}

#[test]
fn test_liveness_ping_reaches_watch_once_per_interval() {
    let mut stack = Stack::new(ScriptedModel::idle(), vec![sample(1, HOVER_G)]);
    let t0 = std::time::Instant::now();
    assert!(stack.phone.ping(t0));
    assert!(!stack.phone.ping(t0 + Duration::from_millis(400)));

    let frames: Vec<Envelope> = stack
        .watch
        .relay()
        .link()
        .incoming()
        .try_iter()
        .map(|f| Envelope::decode(&f).unwrap())
        .collect();
    assert_eq!(frames, vec![Envelope::Message("Reachable".into())]);
    stack.pump_watch();
    assert_eq!(stack.watch.emergencies(), 0);
}
