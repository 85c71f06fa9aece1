use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::DroneCommand;
use crate::config::DroneConfig;
use crate::types::FlightState;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Could not bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("Could not send {command:?}: {source}")]
    Send { command: String, source: io::Error },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

const RECV_POLL: Duration = Duration::from_millis(200);
const MAX_DATAGRAM: usize = 2048;

/// Endpoints UDP hacia el dron.
///
/// - Socket de comandos: enlazado, con broadcast, envía al puerto de
///   comandos del dron y recibe sus respuestas de texto.
/// - Socket de estado: enlazado al puerto de estado, sólo escucha.
///
/// Lo recibido en ambos se decodifica como UTF-8 y se registra; no se
/// interpreta. El estado de vuelo sólo cambia al emitir takeoff/land/emergency.
pub struct DroneTransport {
    command_socket: UdpSocket,
    target: SocketAddr,
    flight_state: FlightState,
    running: Arc<AtomicBool>,
    received: Arc<AtomicU64>,
    listeners: Vec<JoinHandle<()>>,
    local_command_addr: SocketAddr,
    local_state_addr: Option<SocketAddr>,
}

impl DroneTransport {
    /// bind comandos → broadcast → recepción → `command`; el socket de
    /// estado se enlaza por separado y su fallo no impide arrancar.
    pub fn connect(config: &DroneConfig) -> Result<Self, TransportError> {
        let command_addr = SocketAddr::new(config.bind_host, config.command_port);
        let state_addr = SocketAddr::new(config.bind_host, config.state_port);
        let target = SocketAddr::new(config.host, config.command_port);
        Self::connect_with(command_addr, state_addr, target)
    }

    pub fn connect_with(
        command_addr: SocketAddr,
        state_addr: SocketAddr,
        target: SocketAddr,
    ) -> Result<Self, TransportError> {
        let command_socket = UdpSocket::bind(command_addr).map_err(|source| TransportError::Bind {
            addr: command_addr,
            source,
        })?;
        command_socket.set_broadcast(true)?;
        let local_command_addr = command_socket.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let received = Arc::new(AtomicU64::new(0));
        let mut listeners = Vec::with_capacity(2);

        let command_rx = command_socket.try_clone()?;
        listeners.push(spawn_listener(
            "command",
            command_rx,
            Arc::clone(&running),
            Arc::clone(&received),
        )?);

        let mut transport = Self {
            command_socket,
            target,
            flight_state: FlightState::Grounded,
            running,
            received,
            listeners,
            local_command_addr,
            local_state_addr: None,
        };

        match transport.send(&DroneCommand::Handshake) {
            Ok(()) => info!(target = %target, "'command' handshake sent"),
            Err(e) => warn!(error = %e, "handshake failed"),
        }

        match UdpSocket::bind(state_addr) {
            Ok(state_socket) => {
                transport.local_state_addr = state_socket.local_addr().ok();
                match spawn_listener(
                    "state",
                    state_socket,
                    Arc::clone(&transport.running),
                    Arc::clone(&transport.received),
                ) {
                    Ok(handle) => transport.listeners.push(handle),
                    Err(e) => warn!(error = %e, "state listener could not start"),
                }
            }
            Err(e) => warn!(addr = %state_addr, error = %e, "state port bind problem"),
        }

        Ok(transport)
    }

    /// Envío crudo, sin tocar el estado de vuelo
    pub fn send(&self, command: &DroneCommand) -> Result<(), TransportError> {
        let wire = command.to_wire();
        self.command_socket
            .send_to(wire.as_bytes(), self.target)
            .map_err(|source| TransportError::Send {
                command: wire.clone(),
                source,
            })?;
        debug!(command = %wire, "sent to drone");
        Ok(())
    }

    /// Envía y, si el envío tuvo éxito, aplica la transición de estado:
    /// takeoff → Airborne; land / emergency → Grounded.
    pub fn issue(&mut self, command: &DroneCommand) -> Result<FlightState, TransportError> {
        self.send(command)?;
        let next = match command {
            DroneCommand::Takeoff => FlightState::Airborne,
            DroneCommand::Land | DroneCommand::Emergency => FlightState::Grounded,
            _ => self.flight_state,
        };
        if next != self.flight_state {
            info!(from = ?self.flight_state, to = ?next, "flight state");
            self.flight_state = next;
        }
        Ok(self.flight_state)
    }

    pub fn flight_state(&self) -> FlightState {
        self.flight_state
    }

    /// Datagramas recibidos en ambos sockets desde el arranque
    pub fn datagrams_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn local_command_addr(&self) -> SocketAddr {
        self.local_command_addr
    }

    pub fn local_state_addr(&self) -> Option<SocketAddr> {
        self.local_state_addr
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.listeners.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for DroneTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_listener(
    port_name: &'static str,
    socket: UdpSocket,
    running: Arc<AtomicBool>,
    received: Arc<AtomicU64>,
) -> io::Result<JoinHandle<()>> {
    socket.set_read_timeout(Some(RECV_POLL))?;
    thread::Builder::new()
        .name(format!("drone-{}-rx", port_name))
        .spawn(move || {
            let mut buf = [0u8; MAX_DATAGRAM];
            while running.load(Ordering::SeqCst) {
                match socket.recv_from(&mut buf) {
                    Ok((len, from)) => {
                        received.fetch_add(1, Ordering::Relaxed);
                        match std::str::from_utf8(&buf[..len]) {
                            Ok(text) => {
                                info!(target: "wristpilot::drone", port = port_name, from = %from, "{}", text.trim_end())
                            }
                            Err(_) => debug!(port = port_name, len, "non UTF-8 datagram ignored"),
                        }
                    }
                    Err(e)
                        if e.kind() == io::ErrorKind::WouldBlock
                            || e.kind() == io::ErrorKind::TimedOut => {}
                    Err(e) => {
                        warn!(port = port_name, error = %e, "receive error");
                        thread::sleep(RECV_POLL);
                    }
                }
            }
        })
}
