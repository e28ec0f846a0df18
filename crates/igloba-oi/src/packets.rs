//! Static sensor packet table.

use crate::types::{FieldKind, FieldSpec, PacketSpec};

/// Packets read by `get_all_sensors`, in query order.
pub const SUMMARY_PACKETS: [u8; 5] = [7, 11, 12, 13, 19];

/// Header byte of a stream frame.
pub const STREAM_HEADER: u8 = 19;

const CHARGING_LABELS: &[&str] = &["not_charging", "full", "charging", "fault"];
const MODE_LABELS: &[&str] = &["off", "passive", "safe", "full"];
const GUIDE_LABELS: &[&str] = &["none", "dock_center", "dock_right", "dock_left"];

const fn flag(name: &'static str, offset: u8, width: u8, bit: u8) -> FieldSpec {
    FieldSpec {
        name,
        offset,
        width,
        kind: FieldKind::Flag { bit },
    }
}

const fn word(name: &'static str, offset: u8, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        offset,
        width: 2,
        kind,
    }
}

const fn guide_signal(name: &'static str, shift: u8) -> FieldSpec {
    FieldSpec {
        name,
        offset: 0,
        width: 2,
        kind: FieldKind::Enumerated {
            shift,
            mask: 0x03,
            labels: GUIDE_LABELS,
        },
    }
}

pub static PACKETS: &[PacketSpec] = &[
    PacketSpec {
        id: 7,
        name: "bumps_and_drops",
        len: 2,
        fields: &[
            flag("bump_right", 0, 2, 0),
            flag("bump_left", 0, 2, 1),
            flag("wheel_drop", 0, 2, 2),
            flag("ir_bump_4", 0, 2, 3),
            flag("ir_bump_5", 0, 2, 4),
            flag("ir_bump_6", 0, 2, 5),
            flag("ir_bump_7", 0, 2, 6),
            flag("drop_1", 0, 2, 9),
            flag("drop_2", 0, 2, 10),
            flag("drop_3", 0, 2, 11),
        ],
    },
    PacketSpec {
        id: 8,
        name: "guide_sensor_flags",
        len: 2,
        fields: &[
            guide_signal("guide_1_signal", 0),
            guide_signal("guide_2_signal", 2),
            guide_signal("guide_3_signal", 4),
            guide_signal("guide_4_signal", 6),
            flag("guide_1_detected", 0, 2, 12),
            flag("guide_2_detected", 0, 2, 13),
            flag("guide_3_detected", 0, 2, 14),
            flag("guide_4_detected", 0, 2, 15),
        ],
    },
    PacketSpec {
        id: 9,
        name: "ir_signal_levels",
        len: 14,
        fields: &[
            word("ir_level_1", 0, FieldKind::Unsigned),
            word("ir_level_2", 2, FieldKind::Unsigned),
            word("ir_level_3", 4, FieldKind::Unsigned),
            word("ir_level_4", 6, FieldKind::Unsigned),
            word("ir_level_5", 8, FieldKind::Unsigned),
            word("ir_level_6", 10, FieldKind::Unsigned),
            word("ir_level_7", 12, FieldKind::Unsigned),
        ],
    },
    PacketSpec {
        id: 10,
        name: "guide_signal_levels",
        len: 8,
        fields: &[
            word("guide_level_1", 0, FieldKind::Unsigned),
            word("guide_level_2", 2, FieldKind::Unsigned),
            word("guide_level_3", 4, FieldKind::Unsigned),
            word("guide_level_4", 6, FieldKind::Unsigned),
        ],
    },
    PacketSpec {
        id: 11,
        name: "motor_overcurrents",
        len: 1,
        fields: &[
            flag("overcurrent_left_wheel", 0, 1, 0),
            flag("overcurrent_right_wheel", 0, 1, 1),
            flag("overcurrent_side_brush", 0, 1, 2),
            flag("overcurrent_vacuum", 0, 1, 3),
        ],
    },
    PacketSpec {
        id: 12,
        name: "charging_state",
        len: 1,
        fields: &[
            FieldSpec {
                name: "charging_state",
                offset: 0,
                width: 1,
                kind: FieldKind::Enumerated {
                    shift: 0,
                    mask: 0x03,
                    labels: CHARGING_LABELS,
                },
            },
            flag("charging_source_dc", 0, 1, 2),
            flag("charging_source_dock", 0, 1, 3),
        ],
    },
    PacketSpec {
        id: 13,
        name: "battery_voltage",
        len: 2,
        fields: &[
            word("battery_voltage_mv", 0, FieldKind::Unsigned),
            word(
                "battery_voltage_v",
                0,
                FieldKind::Scaled {
                    scale: 0.001,
                    signed: false,
                },
            ),
        ],
    },
    PacketSpec {
        id: 15,
        name: "requested_velocity",
        len: 2,
        fields: &[word("requested_velocity_mm_s", 0, FieldKind::Signed)],
    },
    PacketSpec {
        id: 16,
        name: "requested_radius",
        len: 2,
        fields: &[word("requested_radius_mm", 0, FieldKind::Signed)],
    },
    PacketSpec {
        id: 17,
        name: "requested_wheel_velocity",
        len: 4,
        fields: &[
            word("requested_left_velocity_mm_s", 0, FieldKind::Signed),
            word("requested_right_velocity_mm_s", 2, FieldKind::Signed),
        ],
    },
    PacketSpec {
        id: 18,
        name: "encoder_counts",
        len: 4,
        fields: &[
            word("left_encoder_count", 0, FieldKind::Unsigned),
            word("right_encoder_count", 2, FieldKind::Unsigned),
        ],
    },
    PacketSpec {
        id: 19,
        name: "operating_mode",
        len: 1,
        fields: &[FieldSpec {
            name: "operating_mode",
            offset: 0,
            width: 1,
            kind: FieldKind::Enumerated {
                shift: 0,
                mask: 0x03,
                labels: MODE_LABELS,
            },
        }],
    },
    PacketSpec {
        id: 20,
        name: "motor_currents",
        len: 8,
        fields: &[
            word("left_wheel_current_ma", 0, FieldKind::Unsigned),
            word("right_wheel_current_ma", 2, FieldKind::Unsigned),
            word("side_brush_current_ma", 4, FieldKind::Unsigned),
            word("main_brush_current_ma", 6, FieldKind::Unsigned),
        ],
    },
];

pub fn packet_by_id(id: u8) -> Option<&'static PacketSpec> {
    PACKETS.iter().find(|p| p.id == id)
}
