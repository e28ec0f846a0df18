//! igloba-oi: Open Interface protocol layer for the iGloba Ed robot vacuum
//!
//! Commands and sensor packets are described by static tables
//! ([`OPCODES`], [`PACKETS`]); the encoder and decoder are pure functions
//! over those tables, and [`Robot`] drives them over a [`serial_link::SerialLink`].

mod types;
pub use types::*;

mod error;
pub use error::{ProtocolError, Result};

mod opcodes;
pub use opcodes::{
    opcode_by_name, opcode_by_value, OPCODES, OP_QUERY_LIST, OP_SENSORS, OP_STREAM,
    RADIUS_STRAIGHT, RADIUS_STRAIGHT_ALT, RADIUS_TURN_CCW, RADIUS_TURN_CW,
};

mod packets;
pub use packets::{packet_by_id, PACKETS, STREAM_HEADER, SUMMARY_PACKETS};

mod encode;
pub use encode::{decode_command, encode, encode_id_list, encode_spec, hex};

mod decode;
pub use decode::{
    decode_packet, decode_spec, decode_stream_frame, stream_checksum, PacketFailure,
    SensorReading, SensorSnapshot, SensorValue,
};

mod status;
pub use status::SensorStatus;

mod config;
pub use config::{load_config_file, parse_config, RobotConfig};

mod metrics;
pub use metrics::{LinkMetrics, MetricsHub};

mod robot;
pub use robot::{Robot, MAX_SPEED_MM_S};
