use std::fmt;
use std::str::FromStr;

use crate::types::{Intent, Trick};

/// Dirección de un flip, tal como la espera el dron
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlipDirection {
    Right,
    Left,
    Front,
    Back,
}

impl FlipDirection {
    fn code(&self) -> char {
        match self {
            Self::Right => 'r',
            Self::Left => 'l',
            Self::Front => 'f',
            Self::Back => 'b',
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "r" => Some(Self::Right),
            "l" => Some(Self::Left),
            "f" => Some(Self::Front),
            "b" => Some(Self::Back),
            _ => None,
        }
    }

    /// Texto que muestra la interfaz del teléfono
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Right => "Right Roll",
            Self::Left => "Left Roll",
            Self::Front => "Front Flip",
            Self::Back => "Back Flip",
        }
    }
}

/// Vocabulario completo de comandos UDP del dron (ASCII, sensible a mayúsculas)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DroneCommand {
    /// `command`: pasa el dron a modo SDK
    Handshake,
    Takeoff,
    Land,
    Emergency,
    /// `rc <izq-der> <adelante-atrás> <arriba-abajo> <yaw>`
    Rc {
        left_right: i32,
        forward_back: i32,
        up_down: i32,
        yaw: i32,
    },
    Flip(FlipDirection),
}

impl DroneCommand {
    pub const HOVER: DroneCommand = DroneCommand::Rc {
        left_right: 0,
        forward_back: 0,
        up_down: 0,
        yaw: 0,
    };

    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    pub fn is_rc(&self) -> bool {
        matches!(self, Self::Rc { .. })
    }
}

impl fmt::Display for DroneCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake => write!(f, "command"),
            Self::Takeoff => write!(f, "takeoff"),
            Self::Land => write!(f, "land"),
            Self::Emergency => write!(f, "emergency"),
            Self::Rc {
                left_right,
                forward_back,
                up_down,
                yaw,
            } => write!(f, "rc {} {} {} {}", left_right, forward_back, up_down, yaw),
            Self::Flip(direction) => write!(f, "flip {}", direction.code()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(pub String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown drone command: {:?}", self.0)
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for DroneCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCommandError(s.to_string());
        let mut parts = s.split_whitespace();
        let command = match parts.next().ok_or_else(err)? {
            "command" => Self::Handshake,
            "takeoff" => Self::Takeoff,
            "land" => Self::Land,
            "emergency" => Self::Emergency,
            "flip" => {
                let direction = parts.next().and_then(FlipDirection::from_code).ok_or_else(err)?;
                Self::Flip(direction)
            }
            "rc" => {
                let mut axes = [0i32; 4];
                for axis in axes.iter_mut() {
                    let value: i32 = parts
                        .next()
                        .and_then(|p| p.parse().ok())
                        .ok_or_else(err)?;
                    if !(-100..=100).contains(&value) {
                        return Err(err());
                    }
                    *axis = value;
                }
                Self::Rc {
                    left_right: axes[0],
                    forward_back: axes[1],
                    up_down: axes[2],
                    yaw: axes[3],
                }
            }
            _ => return Err(err()),
        };
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(command)
    }
}

/// Conversión intención/truco → comando del dron. Sin estado.
#[derive(Debug, Clone, Copy)]
pub struct CommandEncoder {
    speed: i32,
}

impl CommandEncoder {
    pub fn new(speed: i32) -> Self {
        Self { speed }
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }

    pub fn encode_intent(&self, intent: Intent) -> DroneCommand {
        let s = self.speed;
        let (left_right, forward_back, up_down) = match intent {
            Intent::Hover => return DroneCommand::HOVER,
            Intent::Ascend => (0, 0, s),
            Intent::Descend => (0, 0, -s),
            Intent::Right => (-s, 0, 0),
            Intent::Left => (s, 0, 0),
            Intent::Forward => (0, s, 0),
            Intent::Backward => (0, -s, 0),
        };
        DroneCommand::Rc {
            left_right,
            forward_back,
            up_down,
            yaw: 0,
        }
    }

    /// Los giros laterales van en espejo: el reloj ve la muñeca, el dron
    /// gira hacia el lado contrario.
    pub fn encode_trick(&self, trick: Trick) -> DroneCommand {
        match trick {
            Trick::LeftRoll => DroneCommand::Flip(FlipDirection::Right),
            Trick::RightRoll => DroneCommand::Flip(FlipDirection::Left),
            Trick::FrontFlip => DroneCommand::Flip(FlipDirection::Front),
            Trick::BackFlip => DroneCommand::Flip(FlipDirection::Back),
            Trick::None => DroneCommand::HOVER,
        }
    }
}

impl Default for CommandEncoder {
    fn default() -> Self {
        Self::new(20)
    }
}
