pub mod balise;
pub mod error;
pub mod header;
pub mod io_status;
pub mod udp;

use model::eke_msg::{msg_name, EkeContent, EkeMsg};

pub use error::DecodeError;
use header::HEADER_LEN;

const MSG_TYPE_UDP: u8 = 1;
const MSG_TYPE_IO_STATUS: u8 = 2;
const MSG_TYPE_BALISE: u8 = 5;

/// A raw source row, as handed to the decoder by a source adapter.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub mqtt_topic: String,
    pub mqtt_timestamp: chrono::DateTime<chrono::Utc>,
    pub raw_hex: String,
}

/// Decodes one raw row into an `EkeMsg`. Returns `Ok(None)` for rows that
/// are intentionally filtered out (connection-status heartbeats) rather than
/// malformed, so callers can tell "nothing to do" apart from "decode failed".
pub fn decode(row: &RawRow) -> Result<Option<EkeMsg>, DecodeError> {
    if header::is_connection_status_topic(&row.mqtt_topic) {
        return Ok(None);
    }

    let vehicle = header::vehicle_from_topic(&row.mqtt_topic)?;
    let raw = hex::decode(&row.raw_hex)?;
    let head = header::parse_header(&raw)?;
    let body = &raw[HEADER_LEN..];

    let content = match head.msg_type {
        MSG_TYPE_UDP => EkeContent::Udp(udp::parse_udp(body)?),
        MSG_TYPE_IO_STATUS => EkeContent::IoStatus(io_status::parse_io_status(body)?),
        MSG_TYPE_BALISE => EkeContent::Balise(balise::parse_balise_half(body)?),
        _ if body.is_empty() => EkeContent::Empty,
        _ => EkeContent::Opaque {
            payload: body.to_vec(),
        },
    };

    Ok(Some(EkeMsg {
        msg_type: head.msg_type,
        msg_name: msg_name(head.msg_type).to_string(),
        msg_version: head.msg_version,
        ntp_time_valid: head.ntp_time_valid,
        eke_timestamp: head.eke_timestamp,
        ntp_timestamp: head.ntp_timestamp,
        vehicle,
        mqtt_timestamp: row.mqtt_timestamp,
        tst: None,
        tst_corrected: None,
        tst_source: None,
        tst_eke_correction_utc_secs: None,
        discard: false,
        incomplete: false,
        content,
        source_refs: Vec::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn hex_frame(msg_type: u8, body_len: usize) -> String {
        let head: u16 = ((msg_type as u16) << 11) | 1; // ntp_time_valid = true
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&head.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 5]); // eke_timestamp
        bytes.extend_from_slice(&[0u8; 5]); // ntp_timestamp
        bytes.extend(std::iter::repeat(0u8).take(body_len));
        hex::encode(bytes)
    }

    #[test]
    fn filters_connection_status_topic() {
        let row = RawRow {
            mqtt_topic: "eke/south/vehicle/12/udp/connectionStatus".to_string(),
            mqtt_timestamp: Utc::now(),
            raw_hex: hex_frame(1, 200),
        };
        assert!(decode(&row).unwrap().is_none());
    }

    #[test]
    fn decodes_udp_header() {
        let row = RawRow {
            mqtt_topic: "eke/south/vehicle/12/udp/data".to_string(),
            mqtt_timestamp: Utc::now(),
            raw_hex: hex_frame(1, 200),
        };
        let msg = decode(&row).unwrap().unwrap();
        assert_eq!(msg.msg_type, 1);
        assert_eq!(msg.vehicle, "12");
        assert!(msg.is_udp());
    }

    #[test]
    fn unknown_type_is_opaque() {
        let row = RawRow {
            mqtt_topic: "eke/south/vehicle/12/misc/data".to_string(),
            mqtt_timestamp: Utc::now(),
            raw_hex: hex_frame(9, 4),
        };
        let msg = decode(&row).unwrap().unwrap();
        assert!(matches!(msg.content, EkeContent::Opaque { .. }));
    }
}
