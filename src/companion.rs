use crossbeam_channel::{select, tick, Receiver};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::command::DroneCommand;
use crate::dispatcher::LivenessPinger;
use crate::drone::DroneTransport;
use crate::link::{Envelope, Link, LinkRelay};
use crate::types::FlightState;

pub const NO_ACTION_LABEL: &str = "No Detected Action";
const PING_POLL: Duration = Duration::from_millis(100);

/// Lado del teléfono: recibe peticiones del reloj, las reenvía al dron y
/// mantiene lo que muestra su interfaz (estado de vuelo y último truco).
pub struct Companion<L: Link> {
    transport: DroneTransport,
    relay: LinkRelay<L>,
    pinger: LivenessPinger,
    trick_label: String,
}

impl<L: Link> Companion<L> {
    pub fn new(transport: DroneTransport, link: L, ping_interval: Duration) -> Self {
        Self {
            transport,
            relay: LinkRelay::new(link),
            pinger: LivenessPinger::new(ping_interval),
            trick_label: NO_ACTION_LABEL.to_string(),
        }
    }

    /// Procesa una trama del reloj. Las malformadas se ignoran.
    pub fn handle_frame(&mut self, frame: &[u8]) {
        match Envelope::decode(frame) {
            Ok(Envelope::Request(request)) => {
                let reply = self.handle_request(&request);
                self.relay.deliver(&Envelope::Received(reply));
            }
            Ok(other) => debug!(message = ?other, "ignored message from watch"),
            Err(e) => debug!(error = %e, "malformed frame ignored"),
        }
    }

    /// Reenvía una petición al dron y devuelve el texto de respuesta
    pub fn handle_request(&mut self, request: &str) -> String {
        let command = match request.parse::<DroneCommand>() {
            Ok(command) => command,
            Err(_) if request.contains("flip") => {
                // dirección desconocida: el dron la rechazaría, se mantiene en el sitio
                self.trick_label = NO_ACTION_LABEL.to_string();
                debug!(request, "unknown flip direction, sending hover");
                return self.forward(&DroneCommand::HOVER, "FLIP command Received");
            }
            Err(_) => {
                // mantiene vivo el temporizador de aterrizaje del dron
                debug!(request, "unknown request, sending hover");
                return self.forward(&DroneCommand::HOVER, "Hover sent");
            }
        };

        match command {
            DroneCommand::Rc { .. } => self.forward(&command, "RC command Received"),
            DroneCommand::Flip(direction) => {
                self.trick_label = direction.display_name().to_string();
                info!(trick = %self.trick_label, "performing flip");
                self.forward(&command, "FLIP command Received")
            }
            DroneCommand::Takeoff => self.forward(&command, "Taking off"),
            DroneCommand::Land => self.forward(&command, "Landing"),
            DroneCommand::Emergency => {
                let reply = self.forward(&command, "EMERGENCY: MOTORS OFF");
                self.cancel_pending();
                warn!("emergency stop performed");
                reply
            }
            DroneCommand::Handshake => self.forward(&command, "Command mode"),
        }
    }

    fn forward(&mut self, command: &DroneCommand, reply: &str) -> String {
        match self.transport.issue(command) {
            Ok(_) => reply.to_string(),
            Err(e) => {
                warn!(error = %e, "drone send failed");
                "Send failed".to_string()
            }
        }
    }

    /// Botón despegar/aterrizar
    pub fn toggle_takeoff_land(&mut self) -> FlightState {
        match self.transport.flight_state() {
            FlightState::Grounded => {
                if self.transport.issue(&DroneCommand::Takeoff).is_ok() {
                    self.relay
                        .deliver(&Envelope::Message(DroneCommand::Takeoff.to_wire()));
                }
            }
            FlightState::Airborne => {
                if let Err(e) = self.transport.issue(&DroneCommand::Land) {
                    warn!(error = %e, "land failed");
                }
                self.cancel_pending();
            }
        }
        self.transport.flight_state()
    }

    /// Botón de emergencia: motores fuera y aviso al reloj para que pare
    pub fn emergency(&mut self) {
        if let Err(e) = self.transport.issue(&DroneCommand::Emergency) {
            warn!(error = %e, "emergency send failed");
        }
        self.cancel_pending();
        self.relay
            .deliver(&Envelope::Message(DroneCommand::Emergency.to_wire()));
    }

    /// Descarta peticiones del reloj que aún no se procesaron
    fn cancel_pending(&mut self) -> usize {
        let dropped = self.relay.link().incoming().try_iter().count();
        if dropped > 0 {
            debug!(dropped, "pending watch requests cancelled");
        }
        dropped
    }

    pub fn ping(&mut self, now: Instant) -> bool {
        self.pinger.ping(&mut self.relay, now)
    }

    /// Bucle del teléfono hasta recibir `shutdown` o perder el enlace
    pub fn run(&mut self, shutdown: Receiver<()>) {
        let ping_tick = tick(PING_POLL);
        let incoming = self.relay.link().incoming().clone();
        loop {
            select! {
                recv(incoming) -> frame => match frame {
                    Ok(frame) => self.handle_frame(&frame),
                    Err(_) => {
                        info!("watch link closed");
                        return;
                    }
                },
                recv(ping_tick) -> now => {
                    if let Ok(now) = now {
                        self.ping(now);
                    }
                },
                recv(shutdown) -> _ => return,
            }
        }
    }

    pub fn flight_state(&self) -> FlightState {
        self.transport.flight_state()
    }

    pub fn trick_label(&self) -> &str {
        &self.trick_label
    }

    pub fn transport(&self) -> &DroneTransport {
        &self.transport
    }

    pub fn relay(&self) -> &LinkRelay<L> {
        &self.relay
    }
}
