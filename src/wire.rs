//! MySQL wire framing and length-encoded primitives.
//!
//! A packet is a 4-byte header (3-byte little-endian payload length, then
//! a 1-byte sequence number) followed by the payload. Client commands put
//! the command code in the first payload byte.

use crate::error::{DecodeError, Result};

pub const COM_QUERY: u8 = 0x03;

/// Try to pull one client command packet out of `buf`.
///
/// On success returns the command byte and the payload bytes after it,
/// and removes the consumed prefix from `buf`. Until a full packet (and
/// its command byte) is buffered, returns `Incomplete` and leaves `buf`
/// untouched. The command code is not interpreted here.
pub fn carve_packet(buf: &mut Vec<u8>) -> Result<(u8, Vec<u8>)> {
    // 4-byte header plus at least the command byte.
    if buf.len() < 5 {
        return Err(DecodeError::Incomplete);
    }
    let size = u32::from_le_bytes([buf[0], buf[1], buf[2], 0]) as usize;
    if size == 0 || buf.len() < size + 4 {
        return Err(DecodeError::Incomplete);
    }
    let command = buf[4];
    let payload = buf[5..size + 4].to_vec();
    buf.drain(..size + 4);
    Ok((command, payload))
}

/// Split an accumulated response buffer into complete packet payloads.
///
/// Unlike [`carve_packet`] this keeps the whole payload (responses have
/// no command byte). Trailing bytes that do not form a complete packet
/// are ignored.
pub fn split_packets(mut buf: &[u8]) -> Vec<&[u8]> {
    let mut packets = Vec::new();
    while buf.len() >= 4 {
        let size = u32::from_le_bytes([buf[0], buf[1], buf[2], 0]) as usize;
        if size == 0 || buf.len() < size + 4 {
            break;
        }
        packets.push(&buf[4..size + 4]);
        buf = &buf[size + 4..];
    }
    packets
}

/// Read a length-encoded integer. Returns the value (`None` for the NULL
/// marker `0xFB`) and the number of bytes consumed.
pub fn read_lenc_int(buf: &[u8]) -> Result<(Option<u64>, usize)> {
    let first = *buf.first().ok_or(DecodeError::Incomplete)?;
    match first {
        0xfb => Ok((None, 1)),
        0xfc => {
            if buf.len() < 3 {
                return Err(DecodeError::Incomplete);
            }
            Ok((Some(u16::from_le_bytes([buf[1], buf[2]]) as u64), 3))
        }
        0xfd => {
            if buf.len() < 4 {
                return Err(DecodeError::Incomplete);
            }
            Ok((Some(u32::from_le_bytes([buf[1], buf[2], buf[3], 0]) as u64), 4))
        }
        0xfe => {
            if buf.len() < 9 {
                return Err(DecodeError::Incomplete);
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[1..9]);
            Ok((Some(u64::from_le_bytes(raw)), 9))
        }
        0xff => Err(DecodeError::Malformed("invalid length-encoded integer prefix")),
        value => Ok((Some(value as u64), 1)),
    }
}

/// Read a length-encoded string: a length-encoded integer `L` followed by
/// `L` bytes. Returns the bytes (`None` for NULL) and the total consumed.
pub fn read_lenc_str(buf: &[u8]) -> Result<(Option<&[u8]>, usize)> {
    let (len, n) = read_lenc_int(buf)?;
    match len {
        None => Ok((None, n)),
        Some(len) => {
            let len = len as usize;
            if buf.len() < n + len {
                return Err(DecodeError::Incomplete);
            }
            Ok((Some(&buf[n..n + len]), n + len))
        }
    }
}

/// Human-readable name for a client command code, for debug logging.
pub fn command_name(command: u8) -> String {
    let name = match command {
        0x00 => "COM_SLEEP",
        0x01 => "COM_QUIT",
        0x02 => "COM_INIT_DB",
        0x03 => "COM_QUERY",
        0x04 => "COM_FIELD_LIST",
        0x05 => "COM_CREATE_DB",
        0x06 => "COM_DROP_DB",
        0x07 => "COM_REFRESH",
        0x08 => "COM_SHUTDOWN",
        0x09 => "COM_STATISTICS",
        0x0a => "COM_PROCESS_INFO",
        0x0b => "COM_CONNECT",
        0x0c => "COM_PROCESS_KILL",
        0x0d => "COM_DEBUG",
        0x0e => "COM_PING",
        0x0f => "COM_TIME",
        0x10 => "COM_DELAYED_INSERT",
        0x11 => "COM_CHANGE_USER",
        0x12 => "COM_BINLOG_DUMP",
        0x13 => "COM_TABLE_DUMP",
        0x14 => "COM_CONNECT_OUT",
        0x15 => "COM_REGISTER_SLAVE",
        0x16 => "COM_STMT_PREPARE",
        0x17 => "COM_STMT_EXECUTE",
        0x18 => "COM_STMT_SEND_LONG_DATA",
        0x19 => "COM_STMT_CLOSE",
        0x1a => "COM_STMT_RESET",
        0x1b => "COM_SET_OPTION",
        0x1c => "COM_STMT_FETCH",
        0x1d => "COM_DAEMON",
        0x1e => "COM_BINLOG_DUMP_GTID",
        0x1f => "COM_RESET_CONNECTION",
        other => return format!("UNKNOWN_COMMAND_{}", other),
    };
    name.to_string()
}
