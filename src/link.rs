use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::command::DroneCommand;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Peer unreachable")]
    Unreachable,

    #[error("Peer disconnected")]
    Disconnected,

    #[error("Link queue full ({capacity} frames)")]
    Backpressure { capacity: usize },

    #[error("JSON error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame is not UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("Frame is not a known message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Mensaje entre reloj y teléfono: un mapa con una única clave de texto.
///
/// - `{"request": ...}` reloj → teléfono, comando a reenviar al dron
/// - `{"Message": ...}` teléfono → reloj, interrupciones (emergencia)
/// - `{"received": ...}` respuesta informativa a un `request`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    #[serde(rename = "request")]
    Request(String),
    #[serde(rename = "Message")]
    Message(String),
    #[serde(rename = "received")]
    Received(String),
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>, LinkError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(serde_json::from_str(text)?)
    }
}

/// Canal corto alcance entre dispositivos
pub trait Link {
    /// Si el otro extremo está activo y puede recibir ahora mismo
    fn is_reachable(&self) -> bool;

    /// Envío sin bloqueo; el resultado sólo dice si la trama salió
    fn send(&self, envelope: &Envelope) -> Result<(), LinkError>;

    /// Tramas entrantes sin decodificar, en orden de llegada
    fn incoming(&self) -> &Receiver<Vec<u8>>;

    /// Tramas enviadas que el otro extremo aún no ha consumido
    fn pending(&self) -> usize;

    /// Retira las tramas enviadas y no consumidas. Devuelve cuántas.
    fn discard_pending(&self) -> usize;
}

/// Extremo de un enlace en proceso sobre canales acotados de crossbeam
pub struct ChannelLink {
    name: &'static str,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    // lado receptor de `tx`, para retirar lo que el otro extremo no leyó
    outbox: Receiver<Vec<u8>>,
    capacity: usize,
    local_active: Arc<AtomicBool>,
    peer_active: Arc<AtomicBool>,
}

/// Crea los dos extremos (reloj, teléfono). Ninguno es alcanzable hasta que
/// el otro llame a `activate()`.
pub fn channel_pair(capacity: usize) -> (ChannelLink, ChannelLink) {
    let (to_phone, phone_rx) = bounded(capacity);
    let (to_watch, watch_rx) = bounded(capacity);
    let watch_active = Arc::new(AtomicBool::new(false));
    let phone_active = Arc::new(AtomicBool::new(false));

    let watch = ChannelLink {
        name: "watch",
        tx: to_phone,
        rx: watch_rx.clone(),
        outbox: phone_rx.clone(),
        capacity,
        local_active: Arc::clone(&watch_active),
        peer_active: Arc::clone(&phone_active),
    };
    let phone = ChannelLink {
        name: "phone",
        tx: to_watch,
        rx: phone_rx,
        outbox: watch_rx,
        capacity,
        local_active: phone_active,
        peer_active: watch_active,
    };
    (watch, phone)
}

impl ChannelLink {
    pub fn activate(&self) {
        self.local_active.store(true, Ordering::SeqCst);
        debug!(side = self.name, "link session activated");
    }

    pub fn deactivate(&self) {
        self.local_active.store(false, Ordering::SeqCst);
        debug!(side = self.name, "link session deactivated");
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Link for ChannelLink {
    fn is_reachable(&self) -> bool {
        self.peer_active.load(Ordering::SeqCst)
    }

    fn send(&self, envelope: &Envelope) -> Result<(), LinkError> {
        let frame = envelope.encode()?;
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => LinkError::Backpressure {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => LinkError::Disconnected,
        })
    }

    fn incoming(&self) -> &Receiver<Vec<u8>> {
        &self.rx
    }

    fn pending(&self) -> usize {
        self.tx.len()
    }

    fn discard_pending(&self) -> usize {
        self.outbox.try_iter().count()
    }
}

impl Drop for ChannelLink {
    fn drop(&mut self) {
        self.local_active.store(false, Ordering::SeqCst);
    }
}

/// Resultado de un intento de reenvío
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Sent,
    Dropped,
}

/// Reenvío condicionado a alcanzabilidad, sin cola ni reintentos: un comando
/// de vuelo viejo no sirve de nada.
pub struct LinkRelay<L: Link> {
    link: L,
    sent: u64,
    dropped: u64,
}

impl<L: Link> LinkRelay<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            sent: 0,
            dropped: 0,
        }
    }

    /// Reenvía un comando de vuelo como `{"request": ...}`
    pub fn relay(&mut self, command: &DroneCommand) -> RelayOutcome {
        self.deliver(&Envelope::Request(command.to_wire()))
    }

    pub fn deliver(&mut self, envelope: &Envelope) -> RelayOutcome {
        if !self.link.is_reachable() {
            warn!(message = ?envelope, "peer is not reachable, message dropped");
            self.dropped += 1;
            return RelayOutcome::Dropped;
        }
        match self.link.send(envelope) {
            Ok(()) => {
                self.sent += 1;
                RelayOutcome::Sent
            }
            Err(e) => {
                warn!(error = %e, message = ?envelope, "error sending message");
                self.dropped += 1;
                RelayOutcome::Dropped
            }
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
