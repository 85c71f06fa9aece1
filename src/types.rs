use serde::{Deserialize, Serialize};

/// Vector de tres ejes tal como lo entrega el sensor de movimiento
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Una muestra de movimiento de la muñeca, producida una vez por tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSample {
    /// Segundos desde el inicio de la sesión
    pub timestamp: f64,
    /// Componente de gravedad en el marco local del reloj, aprox. [-1, 1]
    pub gravity: Vec3,
    pub user_acceleration: Vec3,
    pub rotation_rate: Vec3,
    /// Aceleración cruda del acelerómetro
    pub acceleration: Vec3,
}

impl SensorSample {
    /// Muestra en reposo con la gravedad dada y el resto de canales a cero
    pub fn with_gravity(timestamp: f64, gravity: Vec3) -> Self {
        Self {
            timestamp,
            gravity,
            ..Self::default()
        }
    }

    /// Los nueve canales que consume el modelo de secuencia, en el orden de
    /// [`Channel`]
    pub fn channels(&self) -> [f32; NUM_CHANNELS] {
        [
            self.user_acceleration.x,
            self.user_acceleration.y,
            self.user_acceleration.z,
            self.rotation_rate.x,
            self.rotation_rate.y,
            self.rotation_rate.z,
            self.acceleration.x,
            self.acceleration.y,
            self.acceleration.z,
        ]
    }
}

/// Orden de los canales dentro de la ventana de predicción
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    UserAccelerationX = 0,
    UserAccelerationY,
    UserAccelerationZ,
    RotationRateX,
    RotationRateY,
    RotationRateZ,
    AccelerationX,
    AccelerationY,
    AccelerationZ,
}

/// Intención de movimiento continuo derivada de la inclinación de la muñeca
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Hover,
    Ascend,
    Descend,
    Left,
    Right,
    Forward,
    Backward,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hover => "Hover",
            Self::Ascend => "Ascend",
            Self::Descend => "Descend",
            Self::Left => "Fly Left",
            Self::Right => "Fly Right",
            Self::Forward => "Fly Forwards",
            Self::Backward => "Fly Backwards",
        }
    }
}

/// Truco discreto reconocido por el modelo de secuencia
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trick {
    LeftRoll,
    RightRoll,
    FrontFlip,
    BackFlip,
    None,
}

impl Trick {
    pub const FLIPS: [Trick; 4] = [
        Trick::LeftRoll,
        Trick::RightRoll,
        Trick::FrontFlip,
        Trick::BackFlip,
    ];

    /// Conversión etiqueta del modelo → truco. Etiquetas fuera del
    /// vocabulario devuelven `None` (de Option, no el truco)
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "0" => Some(Self::LeftRoll),
            "1" => Some(Self::RightRoll),
            "2" => Some(Self::FrontFlip),
            "3" => Some(Self::BackFlip),
            "5" => Some(Self::None),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::LeftRoll => "0",
            Self::RightRoll => "1",
            Self::FrontFlip => "2",
            Self::BackFlip => "3",
            Self::None => "5",
        }
    }

    pub fn is_flip(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Estado de vuelo aproximado, mantenido por el transporte del dron
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlightState {
    #[default]
    Grounded,
    Airborne,
}

/// Constantes del sistema
pub const WINDOW_SIZE: usize = 50;
pub const NUM_CHANNELS: usize = 9; // user accel xyz, rotation xyz, accel xyz
pub const CARRY_STATE_LEN: usize = 400;
pub const SAMPLING_RATE: f32 = 50.0; // Hz
pub const SAMPLE_INTERVAL_MS: u64 = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_follow_channel_order() {
        let sample = SensorSample {
            timestamp: 0.0,
            gravity: Vec3::new(9.0, 9.0, 9.0),
            user_acceleration: Vec3::new(1.0, 2.0, 3.0),
            rotation_rate: Vec3::new(4.0, 5.0, 6.0),
            acceleration: Vec3::new(7.0, 8.0, 9.0),
        };
        let ch = sample.channels();
        assert_eq!(ch[Channel::UserAccelerationX as usize], 1.0);
        assert_eq!(ch[Channel::RotationRateY as usize], 5.0);
        assert_eq!(ch[Channel::AccelerationZ as usize], 9.0);
    }

    #[test]
    fn test_trick_labels() {
        for trick in Trick::FLIPS {
            assert_eq!(Trick::from_label(trick.label()), Some(trick));
            assert!(trick.is_flip());
        }
        assert_eq!(Trick::from_label("5"), Some(Trick::None));
        assert_eq!(Trick::from_label("4"), None);
        assert!(!Trick::None.is_flip());
    }
}
