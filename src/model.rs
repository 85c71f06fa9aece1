use std::collections::{HashMap, VecDeque};
use thiserror::Error;

use crate::gesture_buffer::PredictionWindow;
use crate::types::{CARRY_STATE_LEN, WINDOW_SIZE};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Malformed window: {0}")]
    MalformedWindow(String),

    #[error("Invalid carry state size: expected {expected}, got {actual}")]
    StateLength { expected: usize, actual: usize },

    #[error("No output tensor found")]
    NoOutputTensor,

    #[error("Missing model {kind}")]
    MissingIo { kind: &'static str },

    #[error("Scripted failure: {0}")]
    Scripted(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),
}

/// Vector de contexto opaco que el modelo pasa de una llamada a la siguiente
#[derive(Debug, Clone, PartialEq)]
pub struct CarryState(Vec<f32>);

impl CarryState {
    pub fn zeros() -> Self {
        Self(vec![0.0; CARRY_STATE_LEN])
    }

    pub fn from_vec(values: Vec<f32>) -> Result<Self, ModelError> {
        if values.len() != CARRY_STATE_LEN {
            return Err(ModelError::StateLength {
                expected: CARRY_STATE_LEN,
                actual: values.len(),
            });
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl Default for CarryState {
    fn default() -> Self {
        Self::zeros()
    }
}

/// Resultado de una invocación del modelo de secuencia
#[derive(Debug, Clone)]
pub struct Prediction {
    pub label: String,
    pub probabilities: HashMap<String, f32>,
    pub state: CarryState,
}

impl Prediction {
    /// Probabilidad de la etiqueta ganadora; 0 si el modelo no la reporta
    pub fn confidence(&self) -> f32 {
        self.probabilities.get(&self.label).copied().unwrap_or(0.0)
    }
}

/// Capacidad de clasificación de secuencias: ventana + estado → etiqueta,
/// probabilidades por etiqueta y nuevo estado.
pub trait SequenceModel {
    fn predict(
        &mut self,
        window: &PredictionWindow,
        state: &CarryState,
    ) -> Result<Prediction, ModelError>;
}

impl<M: SequenceModel + ?Sized> SequenceModel for Box<M> {
    fn predict(
        &mut self,
        window: &PredictionWindow,
        state: &CarryState,
    ) -> Result<Prediction, ModelError> {
        (**self).predict(window, state)
    }
}

fn check_window(window: &PredictionWindow) -> Result<(), ModelError> {
    if window.cursor() != WINDOW_SIZE {
        return Err(ModelError::MalformedWindow(format!(
            "expected {} samples, got {}",
            WINDOW_SIZE,
            window.cursor()
        )));
    }
    if !window.is_well_formed() {
        return Err(ModelError::MalformedWindow("non-finite sample".into()));
    }
    Ok(())
}

/// Modelo determinista: devuelve en orden las respuestas encoladas y después
/// la etiqueta por defecto. Cada llamada incrementa `state[0]` para que se
/// pueda comprobar que el estado se encadena.
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    script: VecDeque<Result<(String, f32), String>>,
    default_label: String,
    default_probability: f32,
    calls: usize,
    last_state_in: Option<CarryState>,
}

impl ScriptedModel {
    pub fn new(default_label: impl Into<String>, default_probability: f32) -> Self {
        Self {
            script: VecDeque::new(),
            default_label: default_label.into(),
            default_probability,
            calls: 0,
            last_state_in: None,
        }
    }

    /// Modelo que nunca reconoce nada (etiqueta "5", no hacer nada)
    pub fn idle() -> Self {
        Self::new("5", 1.0)
    }

    pub fn then(mut self, label: impl Into<String>, probability: f32) -> Self {
        self.push(label, probability);
        self
    }

    pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
        self.script.push_back(Err(reason.into()));
        self
    }

    pub fn push(&mut self, label: impl Into<String>, probability: f32) {
        self.script.push_back(Ok((label.into(), probability)));
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn last_state_in(&self) -> Option<&CarryState> {
        self.last_state_in.as_ref()
    }
}

impl SequenceModel for ScriptedModel {
    fn predict(
        &mut self,
        window: &PredictionWindow,
        state: &CarryState,
    ) -> Result<Prediction, ModelError> {
        self.calls += 1;
        self.last_state_in = Some(state.clone());
        check_window(window)?;

        let (label, probability) = match self.script.pop_front() {
            Some(Ok(entry)) => entry,
            Some(Err(reason)) => return Err(ModelError::Scripted(reason)),
            None => (self.default_label.clone(), self.default_probability),
        };

        let mut probabilities = HashMap::new();
        probabilities.insert(label.clone(), probability);

        let mut next = state.as_slice().to_vec();
        if let Some(first) = next.first_mut() {
            *first += 1.0;
        }

        Ok(Prediction {
            label,
            probabilities,
            state: CarryState::from_vec(next)?,
        })
    }
}

/// Empareja la salida de probabilidades `[1, n]` (o `[n]`) con las etiquetas
/// y elige la más probable. Una salida sin clases es un error, no un pánico.
pub fn label_probabilities(
    labels: &[String],
    shape: &[i64],
    data: &[f32],
) -> Result<(String, HashMap<String, f32>), ModelError> {
    let num_classes = shape.last().copied().unwrap_or(0).max(0) as usize;
    let probabilities: HashMap<String, f32> = labels
        .iter()
        .zip(data.iter().copied())
        .take(num_classes)
        .map(|(label, p)| (label.clone(), p))
        .collect();

    let label = probabilities
        .iter()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(label, _)| label.clone())
        .ok_or(ModelError::NoOutputTensor)?;
    Ok((label, probabilities))
}

#[cfg(feature = "onnx")]
mod onnx {
    use super::*;
    use crate::types::NUM_CHANNELS;
    use ort::session::Session;
    use ort::tensor::TensorElementType;
    use ort::value::ValueType;
    use serde::Deserialize;
    use std::fs;
    use tracing::info;

    #[derive(Debug, Deserialize)]
    struct ClassesJson {
        index_to_class: HashMap<String, String>,
    }

    /// Modelo de secuencia exportado a ONNX.
    ///
    /// Entradas: ventana `[1, 50, 9]` y estado `[1, 400]`.
    /// Salidas: probabilidades `[1, n_clases]` y estado `[1, 400]`.
    pub struct OnnxSequenceModel {
        session: Session,
        labels: Vec<String>,
        window_input: String,
        state_input: String,
        prob_output: String,
        state_output: String,
    }

    impl OnnxSequenceModel {
        pub fn new(model_path: &str, classes_path: &str) -> Result<Self, ModelError> {
            let labels = Self::load_classes(classes_path)?;
            let session = Session::builder()?.commit_from_file(model_path)?;

            let window_input = session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or(ModelError::MissingIo { kind: "window input" })?;
            let state_input = session
                .inputs
                .get(1)
                .map(|input| input.name.clone())
                .ok_or(ModelError::MissingIo { kind: "state input" })?;

            let float_outputs: Vec<String> = session
                .outputs
                .iter()
                .filter(|output| {
                    matches!(
                        output.output_type,
                        ValueType::Tensor {
                            ty: TensorElementType::Float32,
                            ..
                        }
                    )
                })
                .map(|output| output.name.clone())
                .collect();
            let state_output = float_outputs
                .iter()
                .find(|name| name.contains("state"))
                .cloned()
                .ok_or(ModelError::MissingIo { kind: "state output" })?;
            let prob_output = float_outputs
                .iter()
                .find(|name| **name != state_output)
                .cloned()
                .ok_or(ModelError::MissingIo { kind: "probability output" })?;

            info!(model = model_path, labels = ?labels, "sequence model loaded");

            Ok(Self {
                session,
                labels,
                window_input,
                state_input,
                prob_output,
                state_output,
            })
        }

        fn load_classes(path: &str) -> Result<Vec<String>, ModelError> {
            let content = fs::read_to_string(path)?;
            let data: ClassesJson = serde_json::from_str(&content)?;

            // HashMap → Vec ordenado por índice
            let mut pairs: Vec<(usize, String)> = data
                .index_to_class
                .into_iter()
                .filter_map(|(k, v)| k.parse::<usize>().ok().map(|idx| (idx, v)))
                .collect();

            pairs.sort_by_key(|(idx, _)| *idx);
            Ok(pairs.into_iter().map(|(_, name)| name).collect())
        }

        pub fn labels(&self) -> &[String] {
            &self.labels
        }
    }

    impl SequenceModel for OnnxSequenceModel {
        fn predict(
            &mut self,
            window: &PredictionWindow,
            state: &CarryState,
        ) -> Result<Prediction, ModelError> {
            check_window(window)?;

            let window_value = ort::value::Value::from_array((
                vec![1_usize, WINDOW_SIZE, NUM_CHANNELS],
                window.to_time_major(),
            ))?;
            let state_value = ort::value::Value::from_array((
                vec![1_usize, CARRY_STATE_LEN],
                state.as_slice().to_vec(),
            ))?;

            let outputs = self.session.run(ort::inputs![
                self.window_input.as_str() => &window_value,
                self.state_input.as_str() => &state_value,
            ])?;

            let (prob_shape, prob_data) =
                outputs[self.prob_output.as_str()].try_extract_tensor::<f32>()?;
            let dims: Vec<i64> = prob_shape.iter().copied().collect();
            let (label, probabilities) = label_probabilities(&self.labels, &dims, prob_data)?;

            let (_, state_data) =
                outputs[self.state_output.as_str()].try_extract_tensor::<f32>()?;
            let next_state = CarryState::from_vec(state_data.to_vec())?;

            Ok(Prediction {
                label,
                probabilities,
                state: next_state,
            })
        }
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxSequenceModel;
