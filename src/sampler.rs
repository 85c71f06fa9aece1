use crossbeam_channel::{never, tick, Receiver};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::SensorSample;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SamplerError {
    #[error("Motion sensor unavailable: {0}")]
    SensorUnavailable(String),
}

/// Origen de muestras de movimiento (sensor real, grabación o simulación)
pub trait MotionSource: Send {
    /// Nombre legible para los logs
    fn name(&self) -> &str;

    /// `false` si el sensor no puede entregar datos; el muestreo no arranca
    fn is_available(&self) -> bool;

    /// Lee la muestra del tick actual. `None` cuando la fuente se agotó
    fn next_sample(&mut self) -> Option<SensorSample>;
}

impl<S: MotionSource + ?Sized> MotionSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn next_sample(&mut self) -> Option<SensorSample> {
        (**self).next_sample()
    }
}

/// Muestreador periódico a frecuencia fija.
///
/// El temporizador es un canal `tick` de crossbeam: los ticks perdidos se
/// funden en uno, así que un tick nunca empieza antes de que el consumidor
/// termine con el anterior. El consumidor escucha `ticks()` en su propio
/// bucle y llama a `sample()` por cada tick recibido.
pub struct SensorSampler<S: MotionSource> {
    source: S,
    interval: Duration,
    ticker: Option<Receiver<Instant>>,
    ticks_delivered: u64,
    exhausted: bool,
}

impl<S: MotionSource> SensorSampler<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source,
            interval,
            ticker: None,
            ticks_delivered: 0,
            exhausted: false,
        }
    }

    /// Arranca el muestreo. Llamarlo estando activo no hace nada.
    pub fn start(&mut self) -> Result<(), SamplerError> {
        if self.ticker.is_some() {
            debug!("sampler already active");
            return Ok(());
        }
        if !self.source.is_available() {
            return Err(SamplerError::SensorUnavailable(self.source.name().to_string()));
        }
        info!(
            source = self.source.name(),
            interval_ms = self.interval.as_millis() as u64,
            "sampling started"
        );
        self.ticker = Some(tick(self.interval));
        self.exhausted = false;
        Ok(())
    }

    /// Detiene el muestreo. Llamarlo estando inactivo no hace nada.
    pub fn stop(&mut self) {
        if self.ticker.take().is_some() {
            info!(ticks = self.ticks_delivered, "sampling stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    /// Canal de ticks; nunca entrega nada mientras el muestreo está parado
    pub fn ticks(&self) -> Receiver<Instant> {
        self.ticker.clone().unwrap_or_else(never)
    }

    /// Muestra del tick actual. Si la fuente se agota, el muestreo se detiene.
    pub fn sample(&mut self) -> Option<SensorSample> {
        if !self.is_active() {
            return None;
        }
        match self.source.next_sample() {
            Some(sample) => {
                self.ticks_delivered += 1;
                Some(sample)
            }
            None => {
                warn!(source = self.source.name(), "motion source exhausted");
                self.exhausted = true;
                self.stop();
                None
            }
        }
    }

    /// La fuente se agotó (distinto de una pausa)
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn ticks_delivered(&self) -> u64 {
        self.ticks_delivered
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
