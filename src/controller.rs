use crossbeam_channel::{select, Receiver};
use tracing::{debug, info, warn};

use crate::command::DroneCommand;
use crate::config::PilotConfig;
use crate::dispatcher::CommandDispatcher;
use crate::link::{Envelope, Link, LinkRelay};
use crate::model::SequenceModel;
use crate::pipeline::{GesturePipeline, PilotStatus};
use crate::sampler::{MotionSource, SamplerError, SensorSampler};
use crate::types::SensorSample;

/// Contexto de control del reloj.
///
/// Todo ocurre en un único hilo: los ticks del muestreador, las tramas del
/// teléfono y la parada llegan por canales y se atienden de uno en uno en
/// `run`, así que el estado de la ventana nunca se comparte.
pub struct Controller<S: MotionSource, M: SequenceModel, L: Link> {
    sampler: SensorSampler<S>,
    pipeline: GesturePipeline<M>,
    dispatcher: CommandDispatcher,
    relay: LinkRelay<L>,
    emergencies: u64,
}

impl<S: MotionSource, M: SequenceModel, L: Link> Controller<S, M, L> {
    pub fn new(
        sampler: SensorSampler<S>,
        pipeline: GesturePipeline<M>,
        dispatcher: CommandDispatcher,
        link: L,
    ) -> Self {
        Self {
            sampler,
            pipeline,
            dispatcher,
            relay: LinkRelay::new(link),
            emergencies: 0,
        }
    }

    pub fn from_config(source: S, model: M, link: L, config: &PilotConfig) -> Self {
        Self::new(
            SensorSampler::new(source, config.sampler.interval()),
            GesturePipeline::from_config(model, config),
            CommandDispatcher::new(config.dispatch.backlog_limit),
            link,
        )
    }

    pub fn start_sampling(&mut self) -> Result<(), SamplerError> {
        self.sampler.start()
    }

    pub fn pause_sampling(&mut self) {
        self.sampler.stop();
    }

    /// Botón de muestreo. Devuelve si queda activo.
    pub fn toggle_sampling(&mut self) -> Result<bool, SamplerError> {
        if self.sampler.is_active() {
            self.sampler.stop();
        } else {
            self.sampler.start()?;
        }
        Ok(self.sampler.is_active())
    }

    /// Atiende un tick del muestreador
    pub fn tick(&mut self) -> usize {
        match self.sampler.sample() {
            Some(sample) => self.on_sample(&sample),
            None => 0,
        }
    }

    /// Pasa una muestra por el pipeline y envía lo que salga.
    /// Devuelve cuántos mensajes salieron por el enlace.
    pub fn on_sample(&mut self, sample: &SensorSample) -> usize {
        for command in self.pipeline.on_sample(sample) {
            self.dispatcher.submit(command);
        }
        self.dispatcher.flush(&mut self.relay)
    }

    pub fn take_off(&mut self) {
        info!("takeoff requested");
        self.dispatcher.submit(DroneCommand::Takeoff);
        self.dispatcher.flush(&mut self.relay);
    }

    /// Parada de emergencia: descarta lo pendiente, pide emergencia al
    /// teléfono y para el muestreo. Se puede llamar en cualquier estado.
    pub fn emergency_stop(&mut self) {
        warn!("emergency stop");
        self.emergencies += 1;
        self.dispatcher.cancel_all(&self.relay);
        self.relay.relay(&DroneCommand::Emergency);
        self.sampler.stop();
    }

    /// Procesa una trama del teléfono. Las malformadas se ignoran.
    pub fn handle_frame(&mut self, frame: &[u8]) {
        match Envelope::decode(frame) {
            Ok(Envelope::Message(text)) if text.to_lowercase().contains("emergency") => {
                info!("emergency interrupt from phone");
                self.emergency_stop();
            }
            Ok(Envelope::Message(text)) => debug!(message = %text, "message from phone"),
            Ok(Envelope::Received(reply)) => debug!(reply = %reply, "phone acknowledged"),
            Ok(Envelope::Request(request)) => {
                debug!(request = %request, "unexpected request from phone ignored")
            }
            Err(e) => debug!(error = %e, "malformed frame ignored"),
        }
    }

    /// Bucle del reloj hasta recibir `shutdown`, perder el enlace o agotarse
    /// la fuente de movimiento
    pub fn run(&mut self, shutdown: Receiver<()>) {
        let incoming = self.relay.link().incoming().clone();
        loop {
            // el canal de ticks cambia al arrancar o parar el muestreo
            let ticks = self.sampler.ticks();
            select! {
                recv(ticks) -> _ => {
                    self.tick();
                    if self.sampler.is_exhausted() {
                        info!("motion source finished, leaving control loop");
                        return;
                    }
                },
                recv(incoming) -> frame => match frame {
                    Ok(frame) => self.handle_frame(&frame),
                    Err(_) => {
                        info!("phone link closed");
                        self.sampler.stop();
                        return;
                    }
                },
                recv(shutdown) -> _ => {
                    self.sampler.stop();
                    return;
                },
            }
        }
    }

    pub fn is_sampling(&self) -> bool {
        self.sampler.is_active()
    }

    pub fn status(&self) -> &PilotStatus {
        self.pipeline.status()
    }

    pub fn pipeline(&self) -> &GesturePipeline<M> {
        &self.pipeline
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn relay(&self) -> &LinkRelay<L> {
        &self.relay
    }

    pub fn emergencies(&self) -> u64 {
        self.emergencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_loader::RecordedMotion;
    use crate::link::{channel_pair, ChannelLink};
    use crate::model::ScriptedModel;
    use crate::types::{Vec3, WINDOW_SIZE};
    use crossbeam_channel::bounded;
    use std::thread;
    use std::time::Duration;

    type TestController = Controller<RecordedMotion, ScriptedModel, ChannelLink>;

    fn hover_recording(len: usize) -> RecordedMotion {
        let samples = (0..len)
            .map(|i| SensorSample::with_gravity(i as f64 * 0.02, Vec3::new(0.0, 0.0, -1.0)))
            .collect();
        RecordedMotion::new("hover", samples)
    }

    fn controller(len: usize, model: ScriptedModel) -> (TestController, ChannelLink) {
        let (watch, phone) = channel_pair(64);
        watch.activate();
        phone.activate();
        let c = Controller::from_config(hover_recording(len), model, watch, &PilotConfig::default());
        (c, phone)
    }

    fn received(phone: &ChannelLink) -> Vec<Envelope> {
        phone
            .incoming()
            .try_iter()
            .map(|f| Envelope::decode(&f).unwrap())
            .collect()
    }

    #[test]
    fn test_ticks_without_sampling_do_nothing() {
        let (mut c, phone) = controller(10, ScriptedModel::idle());
        assert_eq!(c.tick(), 0);
        assert!(received(&phone).is_empty());
    }

    #[test]
    fn test_sampling_emits_hover_at_25() {
        let (mut c, phone) = controller(30, ScriptedModel::idle());
        c.start_sampling().unwrap();
        for _ in 0..25 {
            c.tick();
        }
        assert_eq!(received(&phone), vec![Envelope::Request("rc 0 0 0 0".into())]);
        assert_eq!(c.status().samples_seen, 25);
    }

    #[test]
    fn test_toggle_sampling() {
        let (mut c, _phone) = controller(10, ScriptedModel::idle());
        assert!(c.toggle_sampling().unwrap());
        assert!(!c.toggle_sampling().unwrap());
        assert!(!c.is_sampling());
    }

    #[test]
    fn test_take_off_relays_request() {
        let (mut c, phone) = controller(10, ScriptedModel::idle());
        c.take_off();
        assert_eq!(received(&phone), vec![Envelope::Request("takeoff".into())]);
    }

    #[test]
    fn test_emergency_interrupt_cancels_pending_sends() {
        let (mut c, phone) = controller(200, ScriptedModel::idle());
        c.start_sampling().unwrap();
        c.take_off();
        // el teléfono no lee: takeoff y dos hover quedan en el enlace
        for _ in 0..WINDOW_SIZE {
            c.tick();
        }
        assert_eq!(c.relay().link().pending(), 3);

        let frame = Envelope::Message("emergency".into()).encode().unwrap();
        c.handle_frame(&frame);

        assert!(!c.is_sampling());
        assert!(c.dispatcher().is_empty());
        assert_eq!(c.emergencies(), 1);
        assert_eq!(received(&phone), vec![Envelope::Request("emergency".into())]);
        assert_eq!(c.tick(), 0);
    }

    #[test]
    fn test_slow_phone_backlog_stays_bounded() {
        let (mut c, _phone) = controller(2000, ScriptedModel::idle());
        let limit = c.dispatcher().backlog_limit();
        c.start_sampling().unwrap();
        for _ in 0..2000 {
            c.tick();
            let outstanding = c.relay().link().pending() + c.dispatcher().len();
            assert!(outstanding <= limit, "{} sends outstanding", outstanding);
        }
        assert!(c.dispatcher().shed_total() > 0);
        assert_eq!(c.relay().dropped(), 0);
    }

    #[test]
    fn test_emergency_stop_is_safe_when_idle() {
        let (mut c, _phone) = controller(10, ScriptedModel::idle());
        c.emergency_stop();
        c.emergency_stop();
        assert_eq!(c.emergencies(), 2);
        assert!(!c.is_sampling());
    }

    #[test]
    fn test_other_frames_ignored() {
        let (mut c, _phone) = controller(10, ScriptedModel::idle());
        c.start_sampling().unwrap();
        c.handle_frame(br#"{"Message":"Reachable"}"#);
        c.handle_frame(br#"{"received":"Hover sent"}"#);
        c.handle_frame(b"\xff\xfe");
        assert!(c.is_sampling());
        assert_eq!(c.emergencies(), 0);
    }

    #[test]
    fn test_unreachable_phone_drops_commands() {
        let (watch, phone) = channel_pair(8);
        let mut c = Controller::from_config(
            hover_recording(30),
            ScriptedModel::idle(),
            watch,
            &PilotConfig::default(),
        );
        c.start_sampling().unwrap();
        for _ in 0..25 {
            c.tick();
        }
        assert_eq!(c.relay().dropped(), 1);
        assert!(phone.incoming().is_empty());
    }

    #[test]
    fn test_run_until_shutdown() {
        // 200 muestras a 20 ms: la grabación no llega a agotarse
        let (mut c, _phone) = controller(200, ScriptedModel::idle());
        c.start_sampling().unwrap();
        let (stop_tx, stop_rx) = bounded(1);

        let handle = thread::spawn(move || {
            c.run(stop_rx);
            c
        });
        thread::sleep(Duration::from_millis(300));
        stop_tx.send(()).unwrap();
        let c = handle.join().unwrap();

        assert!(!c.is_sampling());
        let seen = c.status().samples_seen;
        assert!(seen > 0 && seen < 200, "{} samples", seen);
    }

    #[test]
    fn test_run_returns_when_recording_ends() {
        let (mut c, phone) = controller(60, ScriptedModel::idle());
        c.start_sampling().unwrap();
        // nadie envía nunca la parada
        let (_stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded(1);

        thread::spawn(move || {
            c.run(stop_rx);
            let _ = done_tx.send(c);
        });
        let c = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(!c.is_sampling());
        assert_eq!(c.status().samples_seen, 60);
        let requests = received(&phone);
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|e| *e == Envelope::Request("rc 0 0 0 0".into())));
    }
}
