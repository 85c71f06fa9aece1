use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use csv::ReaderBuilder;

use crate::sampler::MotionSource;
use crate::types::{SensorSample, Vec3};

/// Columnas de una grabación:
/// timestamp, gravity xyz, user_accel xyz, rotation xyz, accel xyz
pub const RECORDING_HEADER: [&str; 13] = [
    "timestamp",
    "gravity_x",
    "gravity_y",
    "gravity_z",
    "user_accel_x",
    "user_accel_y",
    "user_accel_z",
    "rotation_x",
    "rotation_y",
    "rotation_z",
    "accel_x",
    "accel_y",
    "accel_z",
];

/// Carga una secuencia de SensorSample desde un CSV con cabecera
/// `RECORDING_HEADER`, en orden de llegada.
pub fn load_samples_from_csv(path: impl AsRef<Path>) -> Result<Vec<SensorSample>> {
    let path = path.as_ref();
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;
    read_samples(reader).with_context(|| format!("Grabación inválida {:?}", path))
}

/// Igual que `load_samples_from_csv` pero sobre cualquier lector
pub fn read_samples<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<SensorSample>> {
    let mut samples = Vec::new();
    let mut last_timestamp = f64::NEG_INFINITY;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Fila {} inválida", row_idx + 1))?;
        if record.len() < RECORDING_HEADER.len() {
            bail!(
                "La fila {} no tiene {} columnas",
                row_idx + 1,
                RECORDING_HEADER.len()
            );
        }

        let mut values = [0.0f32; 12];
        for (i, value) in values.iter_mut().enumerate() {
            *value = record[i + 1].parse().with_context(|| {
                format!("{} inválido en fila {}", RECORDING_HEADER[i + 1], row_idx + 1)
            })?;
        }
        let timestamp: f64 = record[0]
            .parse()
            .with_context(|| format!("timestamp inválido en fila {}", row_idx + 1))?;
        ensure!(
            timestamp >= last_timestamp,
            "timestamp decreciente en fila {} ({} < {})",
            row_idx + 1,
            timestamp,
            last_timestamp
        );
        last_timestamp = timestamp;

        samples.push(SensorSample {
            timestamp,
            gravity: Vec3::new(values[0], values[1], values[2]),
            user_acceleration: Vec3::new(values[3], values[4], values[5]),
            rotation_rate: Vec3::new(values[6], values[7], values[8]),
            acceleration: Vec3::new(values[9], values[10], values[11]),
        });
    }

    Ok(samples)
}

/// Reproduce una grabación como si fuera el sensor del reloj
pub struct RecordedMotion {
    name: String,
    samples: Vec<SensorSample>,
    cursor: usize,
    looping: bool,
}

impl RecordedMotion {
    pub fn new(name: impl Into<String>, samples: Vec<SensorSample>) -> Self {
        Self {
            name: name.into(),
            samples,
            cursor: 0,
            looping: false,
        }
    }

    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let samples = load_samples_from_csv(path)?;
        Ok(Self::new(path.display().to_string(), samples))
    }

    /// Vuelve al inicio al terminar en lugar de agotarse
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl MotionSource for RecordedMotion {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        !self.samples.is_empty()
    }

    fn next_sample(&mut self) -> Option<SensorSample> {
        if self.cursor >= self.samples.len() {
            if !self.looping || self.samples.is_empty() {
                return None;
            }
            self.cursor = 0;
        }
        let sample = self.samples[self.cursor];
        self.cursor += 1;
        Some(sample)
    }
}
