use tracing::{debug, info, warn};

use crate::gesture_buffer::PredictionWindow;
use crate::model::{CarryState, ModelError, SequenceModel};
use crate::types::{SensorSample, Trick};

/// Qué pasó con una ventana completa
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    /// El antirrebote estaba armado: el truco se emite (None → hover)
    Emitted(Trick),
    /// Primera ventana del par: se descarta y se arma el antirrebote
    Discarded(Trick),
    /// Etiqueta fuera del vocabulario; consume el turno armado sin emitir
    Unrecognised(String),
    /// Falló el modelo; la ventana se descarta
    ModelFailed,
}

/// Resultado de alimentar una muestra
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStep {
    /// Cursor tras escribir la muestra (1..=WINDOW_SIZE)
    pub index: usize,
    /// Presente sólo cuando la muestra completó la ventana
    pub outcome: Option<WindowOutcome>,
}

impl WindowStep {
    pub fn emitted(&self) -> Option<Trick> {
        match self.outcome {
            Some(WindowOutcome::Emitted(trick)) => Some(trick),
            _ => None,
        }
    }
}

/// Reconocedor de trucos por ventanas, con umbral de confianza y antirrebote
/// de dos ventanas.
///
/// El flag `armed` alterna en cada ventana completa: la primera se descarta y
/// arma, la siguiente actúa y desarma. Un gesto sostenido durante dos ventanas
/// produce así un único comando; uno aislado seguido de reposo no produce
/// ningún flip.
pub struct WindowedGestureClassifier<M: SequenceModel> {
    model: M,
    window: PredictionWindow,
    state: CarryState,
    armed: bool,
    confidence_threshold: f32,
    windows_classified: u64,
}

impl<M: SequenceModel> WindowedGestureClassifier<M> {
    pub fn new(model: M, confidence_threshold: f32) -> Self {
        Self {
            model,
            window: PredictionWindow::new(),
            state: CarryState::zeros(),
            armed: false,
            confidence_threshold,
            windows_classified: 0,
        }
    }

    /// Escribe la muestra y, si la ventana se llenó, clasifica y reinicia el
    /// cursor antes de devolver.
    pub fn push(&mut self, sample: &SensorSample) -> WindowStep {
        let index = self.window.push(sample);
        if !self.window.is_full() {
            return WindowStep {
                index,
                outcome: None,
            };
        }

        let outcome = match self.classify_window() {
            Ok(label) => self.debounce(label),
            Err(e) => {
                warn!(error = %e, "sequence model failed, window discarded");
                WindowOutcome::ModelFailed
            }
        };
        self.window.clear();
        self.windows_classified += 1;

        WindowStep {
            index,
            outcome: Some(outcome),
        }
    }

    /// Invoca el modelo, sustituye el estado y aplica el umbral de confianza
    fn classify_window(&mut self) -> Result<String, ModelError> {
        let prediction = self.model.predict(&self.window, &self.state)?;
        let confidence = prediction.confidence();
        self.state = prediction.state;

        let label = prediction.label;
        let is_flip = Trick::from_label(&label).is_some_and(|t| t.is_flip());
        if is_flip && confidence < self.confidence_threshold {
            debug!(label = %label, confidence, "below confidence threshold, downgraded to no-op");
            return Ok(Trick::None.label().to_string());
        }
        Ok(label)
    }

    fn debounce(&mut self, label: String) -> WindowOutcome {
        let trick = Trick::from_label(&label);
        if !self.armed {
            self.armed = true;
            return match trick {
                Some(trick) => WindowOutcome::Discarded(trick),
                None => WindowOutcome::Unrecognised(label),
            };
        }

        self.armed = false;
        match trick {
            Some(trick) => {
                if trick.is_flip() {
                    info!(trick = ?trick, "trick recognised");
                }
                WindowOutcome::Emitted(trick)
            }
            None => {
                debug!(label = %label, "unrecognised model label");
                WindowOutcome::Unrecognised(label)
            }
        }
    }

    /// Cursor actual de la ventana (0..=WINDOW_SIZE)
    pub fn cursor(&self) -> usize {
        self.window.cursor()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn carry_state(&self) -> &CarryState {
        &self.state
    }

    pub fn windows_classified(&self) -> u64 {
        self.windows_classified
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}
