//! Server response decoding for the verbose display.
//!
//! The accumulated response for one command may span several server
//! packets. They are re-framed first, then classified by the first
//! payload byte: OK, ERR, EOF, or a result set with column definitions
//! and (optionally) row values.

use crate::report::{CYAN, GREEN, RED, RESET, WHITE, YELLOW};
use crate::wire::{read_lenc_int, read_lenc_str, split_packets};

pub const OK_MARKER: u8 = 0x00;
pub const EOF_MARKER: u8 = 0xfe;
pub const ERR_MARKER: u8 = 0xff;
const NULL_MARKER: u8 = 0xfb;

/// Decode an accumulated response buffer into a one-line (or, with rows,
/// multi-line) human-readable description.
pub fn decode_response(buffer: &[u8], show_rows: bool) -> String {
    if buffer.is_empty() {
        return "empty response".to_string();
    }

    let packets = split_packets(buffer);
    let Some(first) = packets.first() else {
        return "incomplete response".to_string();
    };

    match first.first() {
        None => "empty packet".to_string(),
        Some(&OK_MARKER) => parse_ok(first),
        Some(&ERR_MARKER) => parse_err(first),
        Some(&EOF_MARKER) if first.len() < 9 => format!("{YELLOW}EOF{RESET}"),
        Some(_) => parse_result_set(&packets, show_rows),
    }
}

fn parse_ok(payload: &[u8]) -> String {
    if payload.len() < 7 {
        return format!("{GREEN}OK{RESET}");
    }

    let mut pos = 1; // skip the OK marker
    let (affected, n) = match read_lenc_int(&payload[pos..]) {
        Ok((Some(v), n)) => (v, n),
        _ => return format!("{GREEN}OK{RESET}"),
    };
    pos += n;
    let (last_insert_id, n) = match read_lenc_int(&payload[pos..]) {
        Ok((Some(v), n)) => (v, n),
        _ => (0, 0),
    };
    pos += n;

    let mut warnings = 0u16;
    if payload.len() >= pos + 4 {
        // 2-byte status flags, then the warning count
        pos += 2;
        warnings = u16::from_le_bytes([payload[pos], payload[pos + 1]]);
    }

    let mut out = format!("{GREEN}OK{RESET}");
    if affected > 0 {
        out.push_str(&format!(", {YELLOW}{affected} row(s) affected{RESET}"));
    }
    if last_insert_id > 0 {
        out.push_str(&format!(", {CYAN}last insert ID: {last_insert_id}{RESET}"));
    }
    if warnings > 0 {
        out.push_str(&format!(", {YELLOW}{warnings} warning(s){RESET}"));
    }
    out
}

fn parse_err(payload: &[u8]) -> String {
    if payload.len() < 9 {
        return format!("{RED}ERROR{RESET}");
    }

    let code = u16::from_le_bytes([payload[1], payload[2]]);
    let mut pos = 3;
    let mut sql_state = None;
    if payload[pos] == b'#' && payload.len() >= pos + 6 {
        sql_state = Some(String::from_utf8_lossy(&payload[pos + 1..pos + 6]).into_owned());
        pos += 6;
    }
    let message = String::from_utf8_lossy(&payload[pos..]);

    match sql_state {
        Some(state) => format!("{RED}ERROR {code} ({state}): {message}{RESET}"),
        None => format!("{RED}ERROR {code}: {message}{RESET}"),
    }
}

fn parse_result_set(packets: &[&[u8]], show_rows: bool) -> String {
    let column_count = match read_lenc_int(packets[0]) {
        Ok((Some(n), _)) if n > 0 => n as usize,
        _ => return "result set with 0 columns".to_string(),
    };

    let mut columns = Vec::with_capacity(column_count);
    let mut idx = 1;
    while columns.len() < column_count && idx < packets.len() {
        let pkt = packets[idx];
        if is_eof(pkt) {
            break;
        }
        columns.push(column_name(pkt).unwrap_or_default());
        idx += 1;
    }

    let mut out = format!("{GREEN}ResultSet: {column_count} column(s){RESET}");
    if !columns.is_empty() {
        out.push_str(&format!(" [{CYAN}{}{RESET}]", columns.join(", ")));
    }

    // The EOF after the column definitions is absent when the server
    // negotiated CLIENT_DEPRECATE_EOF; tolerate both.
    if packets.get(idx).copied().is_some_and(is_eof) {
        idx += 1;
    }

    if show_rows {
        let mut row_count = 0;
        out.push('\n');
        while idx < packets.len() {
            let pkt = packets[idx];
            if pkt.is_empty() {
                idx += 1;
                continue;
            }
            if is_eof(pkt) || pkt[0] == ERR_MARKER {
                break;
            }

            let values = row_values(pkt, column_count);
            if !values.is_empty() {
                row_count += 1;
                out.push_str(&format!("      {YELLOW}Row {row_count}:{RESET} "));
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let name = columns.get(i).map(String::as_str).unwrap_or("?");
                    out.push_str(&format!("{CYAN}{name}{RESET}={WHITE}{value}{RESET}"));
                }
                out.push('\n');
            }
            idx += 1;
        }

        if row_count > 0 {
            out.push_str(&format!("      {GREEN}Total: {row_count} row(s){RESET}"));
        } else {
            out.push_str(&format!("      {YELLOW}0 rows{RESET}"));
        }
    }

    out
}

fn is_eof(payload: &[u8]) -> bool {
    payload.first() == Some(&EOF_MARKER) && payload.len() < 9
}

/// Pull the column name out of a column-definition packet: five
/// length-encoded strings (catalog, schema, table, org table, name);
/// only the fifth is kept, trailing fixed-length metadata is ignored.
pub fn column_name(payload: &[u8]) -> Option<String> {
    let mut pos = 0;
    for _ in 0..4 {
        let (_, n) = read_lenc_str(&payload[pos..]).ok()?;
        pos += n;
    }
    let (name, _) = read_lenc_str(&payload[pos..]).ok()?;
    Some(String::from_utf8_lossy(name?).into_owned())
}

/// Decode one row packet: per column either the NULL marker byte or a
/// length-encoded string.
pub fn row_values(payload: &[u8], column_count: usize) -> Vec<String> {
    let mut values = Vec::with_capacity(column_count);
    let mut pos = 0;
    for _ in 0..column_count {
        if pos >= payload.len() {
            break;
        }
        if payload[pos] == NULL_MARKER {
            values.push("NULL".to_string());
            pos += 1;
            continue;
        }
        match read_lenc_str(&payload[pos..]) {
            Ok((Some(v), n)) => {
                values.push(String::from_utf8_lossy(v).into_owned());
                pos += n;
            }
            _ => break,
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frame a payload with the MySQL 4-byte header.
    fn packet(seq: u8, payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u32;
        let mut out = vec![
            (len & 0xff) as u8,
            ((len >> 8) & 0xff) as u8,
            ((len >> 16) & 0xff) as u8,
            seq,
        ];
        out.extend_from_slice(payload);
        out
    }

    fn lenc_str(out: &mut Vec<u8>, s: &str) {
        out.push(s.len() as u8);
        out.extend_from_slice(s.as_bytes());
    }

    /// ColumnDefinition41 payload for table `t1` in schema `lg`.
    fn col_def(name: &str) -> Vec<u8> {
        let mut p = Vec::new();
        lenc_str(&mut p, "def");
        lenc_str(&mut p, "lg");
        lenc_str(&mut p, "t1");
        lenc_str(&mut p, "t1");
        lenc_str(&mut p, name);
        lenc_str(&mut p, name); // org_name
        p.push(0x0c); // fixed metadata length
        p.extend_from_slice(&[0x3f, 0x00, 0x0b, 0x00, 0x00, 0x00, 0x03, 0x03, 0x42, 0x00, 0x00, 0x00]);
        p
    }

    /// Response for `select * from t1 where id = 1`: four columns, one row.
    fn select_response() -> Vec<u8> {
        let mut row = Vec::new();
        lenc_str(&mut row, "1");
        lenc_str(&mut row, "lg@example.com");
        lenc_str(&mut row, "2025-11-14 21:48:48");
        lenc_str(&mut row, "2025-11-14 21:48:48");

        let mut buf = packet(1, &[0x04]);
        buf.extend_from_slice(&packet(2, &col_def("id")));
        buf.extend_from_slice(&packet(3, &col_def("email")));
        buf.extend_from_slice(&packet(4, &col_def("created_at")));
        buf.extend_from_slice(&packet(5, &col_def("updated_at")));
        buf.extend_from_slice(&packet(6, &row));
        buf.extend_from_slice(&packet(7, &[0xfe, 0x00, 0x00, 0x22, 0x00, 0x00, 0x00]));
        buf
    }

    #[test]
    fn test_result_set_columns_and_row() {
        let buf = select_response();
        let packets = split_packets(&buf);
        assert_eq!(packets.len(), 7);

        let (count, _) = read_lenc_int(packets[0]).unwrap();
        assert_eq!(count, Some(4));

        let columns: Vec<String> = packets[1..5]
            .iter()
            .map(|p| column_name(p).unwrap())
            .collect();
        assert_eq!(columns, vec!["id", "email", "created_at", "updated_at"]);

        let row = row_values(packets[5], 4);
        assert_eq!(
            row,
            vec!["1", "lg@example.com", "2025-11-14 21:48:48", "2025-11-14 21:48:48"]
        );
    }

    #[test]
    fn test_decode_result_set_without_rows() {
        let out = decode_response(&select_response(), false);
        assert!(out.contains("ResultSet: 4 column(s)"), "got: {out}");
        assert!(out.contains("id, email, created_at, updated_at"), "got: {out}");
        assert!(!out.contains("Row 1"), "got: {out}");
    }

    #[test]
    fn test_decode_result_set_with_rows() {
        let out = decode_response(&select_response(), true);
        assert!(out.contains("Row 1"), "got: {out}");
        assert!(out.contains("lg@example.com"), "got: {out}");
        assert!(out.contains("Total: 1 row(s)"), "got: {out}");
    }

    #[test]
    fn test_row_with_null_value() {
        let mut row = Vec::new();
        lenc_str(&mut row, "7");
        row.push(0xfb);
        lenc_str(&mut row, "x");
        assert_eq!(row_values(&row, 3), vec!["7", "NULL", "x"]);
    }

    #[test]
    fn test_decode_ok_plain() {
        let buf = packet(1, &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        let out = decode_response(&buf, false);
        assert!(out.contains("OK"), "got: {out}");
        assert!(!out.contains("row(s) affected"), "got: {out}");
        assert!(!out.contains("last insert ID"), "got: {out}");
        assert!(!out.contains("warning"), "got: {out}");
    }

    #[test]
    fn test_decode_ok_affected_rows() {
        let buf = packet(1, &[0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00]);
        let out = decode_response(&buf, false);
        assert!(out.contains("5 row(s) affected"), "got: {out}");
        assert!(!out.contains("last insert ID"), "got: {out}");
    }

    #[test]
    fn test_decode_ok_last_insert_id() {
        let buf = packet(1, &[0x00, 0x00, 0x0a, 0x00, 0x00, 0x00, 0x00]);
        let out = decode_response(&buf, false);
        assert!(out.contains("last insert ID: 10"), "got: {out}");
        assert!(!out.contains("row(s) affected"), "got: {out}");
    }

    #[test]
    fn test_decode_ok_all_fields() {
        let buf = packet(1, &[0x00, 0x03, 0x64, 0x00, 0x00, 0x01, 0x00]);
        let out = decode_response(&buf, false);
        assert!(out.contains("3 row(s) affected"), "got: {out}");
        assert!(out.contains("last insert ID: 100"), "got: {out}");
        assert!(out.contains("1 warning(s)"), "got: {out}");
    }

    #[test]
    fn test_decode_err_without_sqlstate() {
        let mut payload = vec![0xff, 0x10, 0x04];
        payload.extend_from_slice(b"Too many connections");
        let out = decode_response(&packet(1, &payload), false);
        assert!(out.contains("ERROR 1040"), "got: {out}");
        assert!(out.contains("Too many connections"), "got: {out}");
    }

    #[test]
    fn test_decode_err_with_sqlstate() {
        let mut payload = vec![0xff, 0x15, 0x04];
        payload.extend_from_slice(b"#28000");
        payload.extend_from_slice(b"Access denied for user");
        let out = decode_response(&packet(1, &payload), false);
        assert!(out.contains("ERROR 1045 (28000)"), "got: {out}");
        assert!(out.contains("Access denied for user"), "got: {out}");
    }

    #[test]
    fn test_decode_eof() {
        let out = decode_response(&packet(1, &[0xfe, 0x00, 0x00, 0x02, 0x00]), false);
        assert!(out.contains("EOF"), "got: {out}");
    }

    #[test]
    fn test_decode_empty_and_incomplete() {
        assert_eq!(decode_response(&[], false), "empty response");
        // A header promising more bytes than present frames no packet.
        assert_eq!(
            decode_response(&[0x40, 0x00, 0x00, 0x01, 0x00], false),
            "incomplete response"
        );
    }

    #[test]
    fn test_result_set_tolerates_eof_after_columns() {
        let mut row = Vec::new();
        lenc_str(&mut row, "a");
        let mut buf = packet(1, &[0x01]);
        buf.extend_from_slice(&packet(2, &col_def("name")));
        buf.extend_from_slice(&packet(3, &[0xfe, 0x00, 0x00, 0x22, 0x00]));
        buf.extend_from_slice(&packet(4, &row));
        buf.extend_from_slice(&packet(5, &[0xfe, 0x00, 0x00, 0x22, 0x00]));

        let out = decode_response(&buf, true);
        assert!(out.contains("ResultSet: 1 column(s)"), "got: {out}");
        assert!(out.contains("Total: 1 row(s)"), "got: {out}");
    }
}
