pub mod command;
pub mod companion;
pub mod config;
pub mod controller;
pub mod csv_loader;
pub mod dispatcher;
pub mod drone;
pub mod gesture_buffer;
pub mod gesture_classifier;
pub mod gravity_intent;
pub mod link;
pub mod model;
pub mod pipeline;
pub mod sampler;
pub mod simulator;
pub mod types;
