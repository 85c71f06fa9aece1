use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::command::DroneCommand;
use crate::link::{Envelope, Link, LinkRelay, RelayOutcome};

/// Cola de envíos pendientes del contexto de control.
///
/// Los envíos pendientes son los encolados aquí más las tramas que siguen en
/// el enlace sin que el teléfono las haya leído. Si en total superan
/// `backlog_limit` se descarta todo en lugar de vaciarlo en orden: el bucle
/// de control no debe ir cada vez más retrasado respecto al tiempo real. El
/// dron aterriza solo si dejan de llegarle comandos.
#[derive(Debug)]
pub struct CommandDispatcher {
    pending: VecDeque<DroneCommand>,
    backlog_limit: usize,
    shed_total: u64,
}

impl CommandDispatcher {
    pub fn new(backlog_limit: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(backlog_limit + 1),
            backlog_limit,
            shed_total: 0,
        }
    }

    /// Encola un envío. Devuelve cuántos envíos se descartaron (0 si ninguno).
    pub fn submit(&mut self, command: DroneCommand) -> usize {
        self.pending.push_back(command);
        if self.pending.len() > self.backlog_limit {
            let shed = self.pending.len();
            self.pending.clear();
            self.shed_total += shed as u64;
            warn!(shed, limit = self.backlog_limit, "send backlog over limit, queue discarded");
            return shed;
        }
        0
    }

    /// Ejecuta los envíos pendientes en orden a través del enlace. Si con lo
    /// que sigue en el enlace se supera el límite, se descarta todo.
    pub fn flush<L: Link>(&mut self, relay: &mut LinkRelay<L>) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let outstanding = self.pending.len() + relay.link().pending();
        if outstanding > self.backlog_limit {
            let shed = self.pending.len() + relay.link().discard_pending();
            self.pending.clear();
            self.shed_total += shed as u64;
            warn!(shed, limit = self.backlog_limit, "peer is not keeping up, backlog discarded");
            return 0;
        }

        let mut sent = 0;
        while let Some(command) = self.pending.pop_front() {
            if relay.relay(&command) == RelayOutcome::Sent {
                sent += 1;
            }
        }
        sent
    }

    /// Cancela todo lo pendiente, también lo que sigue en el enlace.
    /// Seguro en cualquier momento.
    pub fn cancel_all<L: Link>(&mut self, relay: &LinkRelay<L>) -> usize {
        let cancelled = self.pending.len() + relay.link().discard_pending();
        self.pending.clear();
        if cancelled > 0 {
            debug!(cancelled, "pending sends cancelled");
        }
        cancelled
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn backlog_limit(&self) -> usize {
        self.backlog_limit
    }

    pub fn shed_total(&self) -> u64 {
        self.shed_total
    }
}

/// Ping de vida teléfono → reloj con intervalo mínimo entre mensajes
#[derive(Debug)]
pub struct LivenessPinger {
    min_interval: Duration,
    last_attempt: Option<Instant>,
}

pub const PING_PAYLOAD: &str = "Reachable";

impl LivenessPinger {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_attempt: None,
        }
    }

    /// Envía el ping si pasó el intervalo mínimo. El instante se registra
    /// aunque el reloj no sea alcanzable.
    pub fn ping<L: Link>(&mut self, relay: &mut LinkRelay<L>, now: Instant) -> bool {
        if let Some(last) = self.last_attempt {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_attempt = Some(now);
        if !relay.link().is_reachable() {
            return false;
        }
        relay.deliver(&Envelope::Message(PING_PAYLOAD.to_string())) == RelayOutcome::Sent
    }
}
