use crate::types::{SensorSample, NUM_CHANNELS, WINDOW_SIZE};

/// Ventana de predicción: nueve canales de longitud fija más un cursor de
/// escritura en `0..=WINDOW_SIZE`.
///
/// Al llenarse no se libera nada: `clear()` sólo vuelve el cursor a cero y
/// las muestras siguientes sobrescriben el contenido anterior.
#[derive(Debug, Clone)]
pub struct PredictionWindow {
    channels: [[f32; WINDOW_SIZE]; NUM_CHANNELS],
    cursor: usize,
}

impl PredictionWindow {
    pub fn new() -> Self {
        Self {
            channels: [[0.0; WINDOW_SIZE]; NUM_CHANNELS],
            cursor: 0,
        }
    }

    /// Escribe una muestra en la posición del cursor y lo avanza.
    /// Devuelve el nuevo valor del cursor (1..=WINDOW_SIZE).
    ///
    /// Si la ventana ya estaba llena se reinicia antes de escribir, así el
    /// cursor nunca sale de rango.
    pub fn push(&mut self, sample: &SensorSample) -> usize {
        if self.is_full() {
            self.clear();
        }
        for (channel, value) in self.channels.iter_mut().zip(sample.channels()) {
            channel[self.cursor] = value;
        }
        self.cursor += 1;
        self.cursor
    }

    pub fn is_full(&self) -> bool {
        self.cursor == WINDOW_SIZE
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn clear(&mut self) {
        self.cursor = 0;
    }

    pub fn channel(&self, idx: usize) -> &[f32; WINDOW_SIZE] {
        &self.channels[idx]
    }

    pub fn channels(&self) -> &[[f32; WINDOW_SIZE]; NUM_CHANNELS] {
        &self.channels
    }

    /// `true` si todos los valores escritos son finitos
    pub fn is_well_formed(&self) -> bool {
        self.channels
            .iter()
            .all(|channel| channel[..self.cursor].iter().all(|v| v.is_finite()))
    }

    /// Aplana a formato [t][c] (tiempo mayor), el orden del tensor [1, W, 9]
    pub fn to_time_major(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(WINDOW_SIZE * NUM_CHANNELS);
        for t in 0..WINDOW_SIZE {
            for channel in &self.channels {
                flat.push(channel[t]);
            }
        }
        flat
    }
}

impl Default for PredictionWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, Vec3};

    fn sample(value: f32) -> SensorSample {
        SensorSample {
            timestamp: 0.0,
            gravity: Vec3::default(),
            user_acceleration: Vec3::new(value, 0.0, 0.0),
            rotation_rate: Vec3::new(0.0, value, 0.0),
            acceleration: Vec3::new(0.0, 0.0, value),
        }
    }

    #[test]
    fn test_window_not_full_initially() {
        let window = PredictionWindow::new();
        assert_eq!(window.cursor(), 0);
        assert!(!window.is_full());
    }

    #[test]
    fn test_full_after_window_size_samples() {
        let mut window = PredictionWindow::new();
        for i in 0..WINDOW_SIZE {
            let cursor = window.push(&sample(i as f32));
            assert_eq!(cursor, i + 1);
            assert!(cursor <= WINDOW_SIZE);
        }
        assert!(window.is_full());
        assert_eq!(window.channel(Channel::UserAccelerationX as usize)[49], 49.0);
        assert_eq!(window.channel(Channel::RotationRateY as usize)[10], 10.0);
        assert_eq!(window.channel(Channel::AccelerationZ as usize)[0], 0.0);
    }

    #[test]
    fn test_clear_overwrites_instead_of_freeing() {
        let mut window = PredictionWindow::new();
        for i in 0..WINDOW_SIZE {
            window.push(&sample(i as f32));
        }
        window.clear();
        assert_eq!(window.cursor(), 0);
        // los datos antiguos siguen ahí hasta que se sobrescriben
        assert_eq!(window.channel(0)[1], 1.0);
        window.push(&sample(100.0));
        assert_eq!(window.channel(0)[0], 100.0);
        assert_eq!(window.channel(0)[1], 1.0);
    }

    #[test]
    fn test_push_on_full_window_restarts() {
        let mut window = PredictionWindow::new();
        for _ in 0..WINDOW_SIZE {
            window.push(&sample(1.0));
        }
        assert_eq!(window.push(&sample(2.0)), 1);
    }

    #[test]
    fn test_malformed_values_detected() {
        let mut window = PredictionWindow::new();
        window.push(&sample(1.0));
        assert!(window.is_well_formed());
        window.push(&sample(f32::NAN));
        assert!(!window.is_well_formed());
    }

    #[test]
    fn test_time_major_layout() {
        let mut window = PredictionWindow::new();
        window.push(&sample(3.0));
        let flat = window.to_time_major();
        assert_eq!(flat.len(), WINDOW_SIZE * NUM_CHANNELS);
        assert_eq!(flat[Channel::UserAccelerationX as usize], 3.0);
        assert_eq!(flat[Channel::RotationRateY as usize], 3.0);
        assert_eq!(flat[Channel::AccelerationZ as usize], 3.0);
        assert_eq!(flat[NUM_CHANNELS], 0.0);
    }
}
