use chrono::{DateTime, TimeZone, Utc};

use crate::error::DecodeError;

pub const HEADER_LEN: usize = 12;

pub struct Header {
    pub msg_type: u8,
    pub msg_version: u16,
    pub ntp_time_valid: bool,
    pub eke_timestamp: DateTime<Utc>,
    pub ntp_timestamp: DateTime<Utc>,
}

/// Parses the fixed 12-byte header shared by every EKE message: a 16-bit
/// bit-packed head (bit 0 = LSB: msg_type in bits 0-4, msg_version in bits
/// 5-14, ntp_time_valid in bit 15), followed by two 5-byte timestamps (4
/// bytes of seconds, 1 byte of hundredths of a second).
pub fn parse_header(raw: &[u8]) -> Result<Header, DecodeError> {
    if raw.len() < HEADER_LEN {
        return Err(DecodeError::TooShort {
            need: HEADER_LEN,
            got: raw.len(),
        });
    }

    let head = u16::from_be_bytes([raw[0], raw[1]]);
    let msg_type = (head & 0b1_1111) as u8;
    let msg_version = (head >> 5) & 0b11_1111_1111;
    let ntp_time_valid = (head >> 15) != 0;

    let eke_timestamp = parse_timestamp(&raw[2..7]);
    let ntp_timestamp = parse_timestamp(&raw[7..12]);

    Ok(Header {
        msg_type,
        msg_version,
        ntp_time_valid,
        eke_timestamp,
        ntp_timestamp,
    })
}

/// 5-byte timestamp: big-endian u32 seconds since the Unix epoch, followed by
/// one byte of hundredths-of-a-second (each unit is 10 ms).
pub fn parse_timestamp(bytes: &[u8]) -> DateTime<Utc> {
    debug_assert_eq!(bytes.len(), 5);
    let secs = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64;
    let centis = bytes[4] as u32;
    let millis = centis * 10;
    Utc.timestamp_opt(secs, millis * 1_000_000)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(secs, 0).single().unwrap())
}

/// Extracts the vehicle id from the mqtt topic, e.g.
/// `eke/vehicle/12/udp` -> `"12"`.
pub fn vehicle_from_topic(topic: &str) -> Result<String, DecodeError> {
    topic
        .split('/')
        .nth(3)
        .map(str::to_string)
        .ok_or_else(|| DecodeError::MissingTopicSegment {
            topic: topic.to_string(),
            index: 3,
        })
}

/// `connectionStatus` messages are filtered out before decoding.
pub fn is_connection_status_topic(topic: &str) -> bool {
    topic.split('/').nth(5) == Some("connectionStatus")
}
