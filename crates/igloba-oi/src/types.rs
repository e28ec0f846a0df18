use serde::Serialize;

/// One positional argument of a fixed-format command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArgSpec {
    pub name: &'static str,
    /// Width on the wire in bytes (1 or 2).
    pub width: u8,
    pub signed: bool,
    pub min: i32,
    pub max: i32,
    /// Sentinels the firmware accepts outside `min..=max`.
    pub specials: &'static [i32],
    pub unit: &'static str,
}

impl ArgSpec {
    pub fn accepts(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value) || self.specials.contains(&value)
    }
}

/// A command: one opcode byte followed by its arguments in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OpcodeSpec {
    pub name: &'static str,
    pub opcode: u8,
    pub args: &'static [ArgSpec],
}

impl OpcodeSpec {
    /// Total encoded length: opcode byte plus argument widths.
    pub fn encoded_len(&self) -> usize {
        1 + self.args.iter().map(|a| usize::from(a.width)).sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldKind {
    /// Big-endian unsigned integer.
    Unsigned,
    /// Big-endian two's complement integer.
    Signed,
    /// Raw integer multiplied by `scale`.
    Scaled { scale: f64, signed: bool },
    /// Single bit of the big-endian word, bit 0 = least significant.
    Flag { bit: u8 },
    /// `(word >> shift) & mask` indexes into `labels`.
    Enumerated {
        shift: u8,
        mask: u16,
        labels: &'static [&'static str],
    },
}

/// A named view over `width` bytes starting at `offset` in a packet payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: u8,
    pub width: u8,
    pub kind: FieldKind,
}

/// A sensor telegram layout. Fields may share bytes (flags of one word).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PacketSpec {
    pub id: u8,
    pub name: &'static str,
    pub len: u8,
    pub fields: &'static [FieldSpec],
}

impl PacketSpec {
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Host control levels reported by packet 19.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    Off,
    Passive,
    Safe,
    Full,
}

impl OperatingMode {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "off" => Some(Self::Off),
            "passive" => Some(Self::Passive),
            "safe" => Some(Self::Safe),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Charger state reported by packet 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargingState {
    NotCharging,
    Full,
    Charging,
    Fault,
}

impl ChargingState {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "not_charging" => Some(Self::NotCharging),
            "full" => Some(Self::Full),
            "charging" => Some(Self::Charging),
            "fault" => Some(Self::Fault),
            _ => None,
        }
    }
}

/// LED colors accepted by the `leds` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Off = 0,
    Blue = 1,
    Red = 2,
    BlueRed = 3,
}

/// Motor switches for the `motors` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorState {
    pub side_brush: bool,
    pub vacuum_fan: bool,
    pub main_brush: bool,
}

impl MotorState {
    pub fn bits(self) -> u8 {
        let mut b = 0u8;
        if self.side_brush {
            b |= 0x01;
        }
        if self.main_brush {
            b |= 0x02;
        }
        if self.vacuum_fan {
            b |= 0x04;
        }
        b
    }
}
