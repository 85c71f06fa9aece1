use crate::types::{Intent, Vec3, WINDOW_SIZE};

/// Caja de tolerancia alrededor de una gravedad objetivo
#[derive(Debug, Clone, Copy)]
struct Band {
    intent: Intent,
    target: Vec3,
}

/// Orden fijo de evaluación: la primera banda que contiene el vector gana
const BANDS: [Band; 7] = [
    Band { intent: Intent::Hover, target: Vec3::new(0.0, 0.0, -1.0) },
    Band { intent: Intent::Descend, target: Vec3::new(1.0, 0.0, -0.2) },
    Band { intent: Intent::Ascend, target: Vec3::new(-1.0, 0.0, 0.0) },
    Band { intent: Intent::Right, target: Vec3::new(0.0, -1.0, 0.0) },
    Band { intent: Intent::Left, target: Vec3::new(0.0, 1.0, 0.0) },
    Band { intent: Intent::Forward, target: Vec3::new(-0.5, 0.0, -1.0) },
    Band { intent: Intent::Backward, target: Vec3::new(0.5, 0.0, -1.0) },
];

/// Clasificador sin estado gravedad → intención.
///
/// Sólo se consulta dos veces por ventana (índices 25 y 50), ver
/// [`GravityIntentClassifier::should_evaluate`].
#[derive(Debug, Clone, Copy)]
pub struct GravityIntentClassifier {
    epsilon: f32,
}

impl GravityIntentClassifier {
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Índices de muestra (tras escribir la muestra) en los que se evalúa
    pub fn should_evaluate(index: usize) -> bool {
        index == WINDOW_SIZE / 2 || index == WINDOW_SIZE
    }

    pub fn classify(&self, gravity: Vec3) -> Intent {
        BANDS
            .iter()
            .find(|band| self.contains(band, gravity))
            .map(|band| band.intent)
            .unwrap_or(Intent::Hover)
    }

    fn contains(&self, band: &Band, g: Vec3) -> bool {
        self.near(g.x, band.target.x) && self.near(g.y, band.target.y) && self.near(g.z, band.target.z)
    }

    /// value ∈ [target − ε, target + ε)
    fn near(&self, value: f32, target: f32) -> bool {
        value >= target - self.epsilon && value < target + self.epsilon
    }
}

impl Default for GravityIntentClassifier {
    fn default() -> Self {
        Self::new(0.30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(x: f32, y: f32, z: f32) -> Intent {
        GravityIntentClassifier::default().classify(Vec3::new(x, y, z))
    }

    #[test]
    fn test_band_centres() {
        assert_eq!(classify(0.0, 0.0, -1.0), Intent::Hover);
        assert_eq!(classify(1.0, 0.0, -0.2), Intent::Descend);
        assert_eq!(classify(-1.0, 0.0, 0.0), Intent::Ascend);
        assert_eq!(classify(0.0, -1.0, 0.0), Intent::Right);
        assert_eq!(classify(0.0, 1.0, 0.0), Intent::Left);
        assert_eq!(classify(-0.6, 0.0, -1.0), Intent::Forward);
        assert_eq!(classify(0.6, 0.0, -1.0), Intent::Backward);
    }

    #[test]
    fn test_inside_tolerance() {
        assert_eq!(classify(0.2, -0.2, -0.8), Intent::Hover);
        assert_eq!(classify(0.8, 0.1, 0.0), Intent::Descend);
        assert_eq!(classify(-0.75, 0.25, 0.2), Intent::Ascend);
        assert_eq!(classify(0.1, 0.9, -0.1), Intent::Left);
    }

    #[test]
    fn test_outside_every_band_falls_back_to_hover() {
        assert_eq!(classify(0.0, 0.0, 1.0), Intent::Hover);
        assert_eq!(classify(0.7, 0.7, 0.0), Intent::Hover);
        assert_eq!(classify(-1.5, 0.0, -1.0), Intent::Hover);
    }

    #[test]
    fn test_half_open_bounds() {
        // límite inferior incluido
        assert_eq!(classify(-0.3, 0.0, -1.0), Intent::Hover);
        // límite superior excluido: cae en la banda de Backward
        assert_eq!(classify(0.3, 0.0, -1.0), Intent::Backward);
        assert_eq!(classify(0.29, 0.0, -1.0), Intent::Hover);
    }

    #[test]
    fn test_priority_hover_over_forward_and_backward() {
        // dentro de Hover y de Forward
        assert_eq!(classify(-0.25, 0.0, -1.0), Intent::Hover);
        // dentro de Hover y de Backward
        assert_eq!(classify(0.25, 0.0, -1.0), Intent::Hover);
    }

    #[test]
    fn test_priority_hover_over_descend() {
        // Con ε = 0.6 las cajas de Hover y Descend se solapan
        let wide = GravityIntentClassifier::new(0.6);
        let overlap = Vec3::new(0.45, 0.0, -0.6);
        assert_eq!(wide.classify(overlap), Intent::Hover);
        // fuera de Hover pero dentro de Descend
        assert_eq!(wide.classify(Vec3::new(0.7, 0.0, -0.2)), Intent::Descend);
    }

    #[test]
    fn test_evaluation_points() {
        let points: Vec<usize> = (0..=WINDOW_SIZE)
            .filter(|&i| GravityIntentClassifier::should_evaluate(i))
            .collect();
        assert_eq!(points, vec![25, 50]);
    }
}
