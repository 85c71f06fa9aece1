use tracing::debug;

use crate::command::{CommandEncoder, DroneCommand};
use crate::config::PilotConfig;
use crate::gesture_classifier::{WindowOutcome, WindowedGestureClassifier};
use crate::gravity_intent::GravityIntentClassifier;
use crate::model::SequenceModel;
use crate::types::{Intent, SensorSample, Trick};

/// Último comando emitido, visible para la interfaz (etiquetas de truco e
/// intención actuales)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PilotStatus {
    pub last_intent: Option<Intent>,
    pub last_trick: Option<Trick>,
    pub last_command: Option<DroneCommand>,
    /// Resultado de la última ventana completa
    pub last_window: Option<WindowOutcome>,
    pub samples_seen: u64,
}

/// Etapas síncronas de un tick: ventana de trucos + intención por gravedad
/// → comandos para el dron. A lo sumo dos comandos por tick (intención y
/// truco al cerrar la ventana, en ese orden).
pub struct GesturePipeline<M: SequenceModel> {
    intent: GravityIntentClassifier,
    gestures: WindowedGestureClassifier<M>,
    encoder: CommandEncoder,
    status: PilotStatus,
}

impl<M: SequenceModel> GesturePipeline<M> {
    pub fn new(
        intent: GravityIntentClassifier,
        gestures: WindowedGestureClassifier<M>,
        encoder: CommandEncoder,
    ) -> Self {
        Self {
            intent,
            gestures,
            encoder,
            status: PilotStatus::default(),
        }
    }

    pub fn from_config(model: M, config: &PilotConfig) -> Self {
        Self::new(
            GravityIntentClassifier::new(config.gravity.epsilon),
            WindowedGestureClassifier::new(model, config.gesture.confidence_threshold),
            CommandEncoder::new(config.drone.rc_speed),
        )
    }

    pub fn on_sample(&mut self, sample: &SensorSample) -> Vec<DroneCommand> {
        self.status.samples_seen += 1;
        let step = self.gestures.push(sample);
        let mut commands = Vec::with_capacity(2);

        if GravityIntentClassifier::should_evaluate(step.index) {
            let intent = self.intent.classify(sample.gravity);
            debug!(index = step.index, intent = intent.as_str(), "intent");
            let command = self.encoder.encode_intent(intent);
            self.status.last_intent = Some(intent);
            self.status.last_command = Some(command);
            commands.push(command);
        }

        if let Some(WindowOutcome::Emitted(trick)) = step.outcome {
            let command = self.encoder.encode_trick(trick);
            self.status.last_trick = Some(trick);
            self.status.last_command = Some(command);
            commands.push(command);
        }
        if step.outcome.is_some() {
            self.status.last_window = step.outcome;
        }

        commands
    }

    pub fn status(&self) -> &PilotStatus {
        &self.status
    }

    pub fn gestures(&self) -> &WindowedGestureClassifier<M> {
        &self.gestures
    }
}
