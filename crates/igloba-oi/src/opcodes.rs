//! Static command table.

use crate::types::{ArgSpec, OpcodeSpec};

/// Radius sentinel for driving straight.
pub const RADIUS_STRAIGHT: i32 = 32767;
/// Alternate straight sentinel (0x8000).
pub const RADIUS_STRAIGHT_ALT: i32 = -32768;
/// Spin in place counter-clockwise.
pub const RADIUS_TURN_CCW: i32 = 1;
/// Spin in place clockwise.
pub const RADIUS_TURN_CW: i32 = -1;

pub const OP_SENSORS: u8 = 142;
pub const OP_QUERY_LIST: u8 = 149;
pub const OP_STREAM: u8 = 148;

const VELOCITY: ArgSpec = ArgSpec {
    name: "velocity",
    width: 2,
    signed: true,
    min: -500,
    max: 500,
    specials: &[],
    unit: "mm/s",
};

const RADIUS: ArgSpec = ArgSpec {
    name: "radius",
    width: 2,
    signed: true,
    min: -2000,
    max: 2000,
    specials: &[RADIUS_STRAIGHT, RADIUS_STRAIGHT_ALT],
    unit: "mm",
};

const fn wheel(name: &'static str, limit: i32, unit: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        width: 2,
        signed: true,
        min: -limit,
        max: limit,
        specials: &[],
        unit,
    }
}

const fn byte(name: &'static str, max: i32) -> ArgSpec {
    ArgSpec {
        name,
        width: 1,
        signed: false,
        min: 0,
        max,
        specials: &[],
        unit: "",
    }
}

const fn bare(name: &'static str, opcode: u8) -> OpcodeSpec {
    OpcodeSpec {
        name,
        opcode,
        args: &[],
    }
}

pub static OPCODES: &[OpcodeSpec] = &[
    bare("start", 128),
    bare("reset", 7),
    bare("stop", 173),
    bare("safe_mode", 131),
    bare("full_mode", 132),
    bare("clean", 135),
    bare("max_clean", 136),
    bare("seek_dock", 143),
    bare("power_off", 133),
    OpcodeSpec {
        name: "drive",
        opcode: 137,
        args: &[VELOCITY, RADIUS],
    },
    OpcodeSpec {
        name: "drive_direct",
        opcode: 145,
        args: &[
            wheel("left_velocity", 500, "mm/s"),
            wheel("right_velocity", 500, "mm/s"),
        ],
    },
    OpcodeSpec {
        name: "drive_pwm",
        opcode: 146,
        args: &[wheel("left_pwm", 255, ""), wheel("right_pwm", 255, "")],
    },
    // bit0 side brush, bit1 main brush, bit2 vacuum fan
    OpcodeSpec {
        name: "motors",
        opcode: 138,
        args: &[byte("motor_bits", 0x07)],
    },
    OpcodeSpec {
        name: "leds",
        opcode: 139,
        args: &[byte("color", 3), byte("intensity", 255)],
    },
    OpcodeSpec {
        name: "sensors",
        opcode: OP_SENSORS,
        args: &[byte("packet_id", 255)],
    },
    OpcodeSpec {
        name: "pause_resume_stream",
        opcode: 150,
        args: &[byte("state", 1)],
    },
];

pub fn opcode_by_name(name: &str) -> Option<&'static OpcodeSpec> {
    OPCODES.iter().find(|o| o.name == name)
}

pub fn opcode_by_value(opcode: u8) -> Option<&'static OpcodeSpec> {
    OPCODES.iter().find(|o| o.opcode == opcode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_and_opcodes_are_unique() {
        let names: HashSet<_> = OPCODES.iter().map(|o| o.name).collect();
        let codes: HashSet<_> = OPCODES.iter().map(|o| o.opcode).collect();
        assert_eq!(names.len(), OPCODES.len());
        assert_eq!(codes.len(), OPCODES.len());
        assert!(!codes.contains(&OP_QUERY_LIST));
        assert!(!codes.contains(&OP_STREAM));
    }

    #[test]
    fn widths_are_one_or_two_bytes() {
        for op in OPCODES {
            for arg in op.args {
                assert!(arg.width == 1 || arg.width == 2, "{}.{}", op.name, arg.name);
                assert!(arg.min <= arg.max);
            }
        }
    }

    #[test]
    fn drive_accepts_straight_sentinel() {
        let drive = opcode_by_name("drive").unwrap();
        assert_eq!(drive.encoded_len(), 5);
        assert!(drive.args[1].accepts(RADIUS_STRAIGHT));
        assert!(drive.args[1].accepts(-2000));
        assert!(!drive.args[1].accepts(2001));
        assert!(!drive.args[0].accepts(501));
    }

    #[test]
    fn lookup_by_value() {
        assert_eq!(opcode_by_value(128).map(|o| o.name), Some("start"));
        assert!(opcode_by_value(0).is_none());
    }
}
