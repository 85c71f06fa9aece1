use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::types::SAMPLE_INTERVAL_MS;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuración completa del piloto. Todos los campos tienen valor por
/// defecto, así que un JSON vacío (`{}`) es válido.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub sampler: SamplerConfig,
    pub gravity: GravityConfig,
    pub gesture: GestureConfig,
    pub dispatch: DispatchConfig,
    pub drone: DroneConfig,
    pub link: LinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Periodo de muestreo (20 ms = 50 Hz)
    pub interval_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: SAMPLE_INTERVAL_MS,
        }
    }
}

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GravityConfig {
    /// Semiancho de cada banda de tolerancia
    pub epsilon: f32,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self { epsilon: 0.30 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Probabilidad mínima para aceptar un truco
    pub confidence_threshold: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Envíos pendientes tolerados antes de descartar toda la cola
    pub backlog_limit: usize,
    /// Intervalo mínimo entre pings de vida al reloj
    pub ping_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backlog_limit: 5,
            ping_interval_ms: 500,
        }
    }
}

impl DispatchConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DroneConfig {
    pub host: IpAddr,
    pub command_port: u16,
    pub state_port: u16,
    /// Dirección local donde se enlazan ambos sockets
    pub bind_host: IpAddr,
    /// Magnitud de los comandos `rc` (20 en interiores, 50 al aire libre)
    pub rc_speed: i32,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1)),
            command_port: 8889,
            state_port: 8890,
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            rc_speed: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Capacidad de la cola entre reloj y teléfono
    pub capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { capacity: 32 }
    }
}

impl PilotConfig {
    /// Carga la configuración desde un JSON y la valida
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampler.interval_ms == 0 {
            return Err(ConfigError::Invalid("sampler.interval_ms must be > 0".into()));
        }
        if !(self.gravity.epsilon > 0.0) {
            return Err(ConfigError::Invalid("gravity.epsilon must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.gesture.confidence_threshold) {
            return Err(ConfigError::Invalid(
                "gesture.confidence_threshold must be within [0, 1]".into(),
            ));
        }
        if self.dispatch.backlog_limit == 0 {
            return Err(ConfigError::Invalid("dispatch.backlog_limit must be > 0".into()));
        }
        if !(1..=100).contains(&self.drone.rc_speed) {
            return Err(ConfigError::Invalid("drone.rc_speed must be within 1..=100".into()));
        }
        if self.link.capacity == 0 {
            return Err(ConfigError::Invalid("link.capacity must be > 0".into()));
        }
        Ok(())
    }
}
