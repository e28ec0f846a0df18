use crate::opcodes::{opcode_by_name, opcode_by_value};
use crate::types::{ArgSpec, OpcodeSpec};
use crate::{ProtocolError, Result};

/// Encode a table command by name.
pub fn encode(name: &str, args: &[i32]) -> Result<Vec<u8>> {
    let spec = opcode_by_name(name).ok_or_else(|| ProtocolError::UnknownCommand(name.into()))?;
    encode_spec(spec, args)
}

/// Validate every argument, then serialize opcode followed by big-endian
/// two's complement fields. Nothing is produced if any argument is rejected.
pub fn encode_spec(spec: &OpcodeSpec, args: &[i32]) -> Result<Vec<u8>> {
    if args.len() != spec.args.len() {
        return Err(ProtocolError::ArgumentCount {
            command: spec.name,
            expected: spec.args.len(),
            got: args.len(),
        });
    }
    for (arg, &value) in spec.args.iter().zip(args) {
        if !arg.accepts(value) {
            return Err(ProtocolError::InvalidArgument {
                command: spec.name,
                arg: arg.name,
                value,
                min: arg.min,
                max: arg.max,
            });
        }
    }
    let mut out = Vec::with_capacity(spec.encoded_len());
    out.push(spec.opcode);
    for (arg, &value) in spec.args.iter().zip(args) {
        push_arg(&mut out, arg, value);
    }
    Ok(out)
}

fn push_arg(out: &mut Vec<u8>, arg: &ArgSpec, value: i32) {
    match arg.width {
        1 => out.push(value as u8),
        // Sentinels such as 32767 are already in i16 range; truncation is the wire format.
        _ => out.extend_from_slice(&(value as i16).to_be_bytes()),
    }
}

/// Encode one of the variadic packet-list commands: `[opcode, n, ids...]`.
pub fn encode_id_list(opcode: u8, ids: &[u8]) -> Result<Vec<u8>> {
    let command = match opcode {
        crate::opcodes::OP_QUERY_LIST => "query_list",
        crate::opcodes::OP_STREAM => "stream",
        other => return Err(ProtocolError::UnknownOpcode(other)),
    };
    if ids.is_empty() || ids.len() > usize::from(u8::MAX) {
        return Err(ProtocolError::InvalidArgument {
            command,
            arg: "packet_count",
            value: ids.len() as i32,
            min: 1,
            max: i32::from(u8::MAX),
        });
    }
    let mut out = Vec::with_capacity(ids.len() + 2);
    out.push(opcode);
    out.push(ids.len() as u8);
    out.extend_from_slice(ids);
    Ok(out)
}

/// Parse one encoded table command back into its opcode entry and argument values.
pub fn decode_command(bytes: &[u8]) -> Result<(&'static OpcodeSpec, Vec<i32>)> {
    let (&opcode, mut rest) = bytes
        .split_first()
        .ok_or(ProtocolError::InvalidFrame("empty command"))?;
    let spec = opcode_by_value(opcode).ok_or(ProtocolError::UnknownOpcode(opcode))?;
    if bytes.len() != spec.encoded_len() {
        return Err(ProtocolError::InvalidFrame("command length mismatch"));
    }
    let mut args = Vec::with_capacity(spec.args.len());
    for arg in spec.args {
        let value = match (arg.width, arg.signed) {
            (1, false) => i32::from(rest[0]),
            (1, true) => i32::from(rest[0] as i8),
            (_, false) => i32::from(u16::from_be_bytes([rest[0], rest[1]])),
            (_, true) => i32::from(i16::from_be_bytes([rest[0], rest[1]])),
        };
        rest = &rest[usize::from(arg.width)..];
        args.push(value);
    }
    Ok((spec, args))
}

/// Format bytes as space separated upper-case hex, e.g. `89 00 C8 7F FF`.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::{OPCODES, OP_QUERY_LIST, RADIUS_STRAIGHT};

    #[test]
    fn drive_is_big_endian_twos_complement() {
        let bytes = encode("drive", &[-200, RADIUS_STRAIGHT]).unwrap();
        assert_eq!(bytes, vec![137, 0xFF, 0x38, 0x7F, 0xFF]);
    }

    #[test]
    fn every_command_round_trips_at_its_bounds() {
        for op in OPCODES {
            for pick in [0usize, 1] {
                let args: Vec<i32> = op
                    .args
                    .iter()
                    .map(|a| if pick == 0 { a.min } else { a.max })
                    .collect();
                let bytes = encode_spec(op, &args).unwrap();
                assert_eq!(bytes.len(), op.encoded_len(), "{}", op.name);
                let (spec, back) = decode_command(&bytes).unwrap();
                assert_eq!(spec.name, op.name);
                assert_eq!(back, args, "{}", op.name);
            }
        }
    }

    #[test]
    fn out_of_range_is_rejected() {
        let err = encode("drive_pwm", &[256, 0]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidArgument {
                arg: "left_pwm",
                value: 256,
                ..
            }
        ));
        assert!(matches!(
            encode("leds", &[4, 0]),
            Err(ProtocolError::InvalidArgument { arg: "color", .. })
        ));
    }

    #[test]
    fn arity_and_name_are_checked() {
        assert!(matches!(
            encode("drive", &[0]),
            Err(ProtocolError::ArgumentCount {
                expected: 2,
                got: 1,
                ..
            })
        ));
        assert!(matches!(
            encode("fly", &[]),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }

    #[test]
    fn id_list_prefixes_count() {
        assert_eq!(
            encode_id_list(OP_QUERY_LIST, &[7, 13]).unwrap(),
            vec![149, 2, 7, 13]
        );
        assert!(encode_id_list(OP_QUERY_LIST, &[]).is_err());
        assert!(matches!(
            encode_id_list(42, &[7]),
            Err(ProtocolError::UnknownOpcode(42))
        ));
    }

    #[test]
    fn decode_rejects_truncated_command() {
        assert!(matches!(
            decode_command(&[137, 0, 0]),
            Err(ProtocolError::InvalidFrame(_))
        ));
        assert!(matches!(
            decode_command(&[0xEE]),
            Err(ProtocolError::UnknownOpcode(0xEE))
        ));
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(hex(&[0x89, 0x00, 0xC8]), "89 00 C8");
        assert_eq!(hex(&[]), "");
    }
}
