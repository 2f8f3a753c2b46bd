use model::eke_msg::IoStatusContent;

use crate::error::DecodeError;

const FLAGS_BYTE: usize = 0;

const BRAKING: u8 = 0b0000_0001;
const SANDING: u8 = 0b0000_0010;
const JKV_ON: u8 = 0b0000_0100;
const SAFETY_DEVICE_ON: u8 = 0b0000_1000;
const RAIL_BRAKE: u8 = 0b0001_0000;

/// IO status is a single byte of independent flags, one bit each.
pub fn parse_io_status(content: &[u8]) -> Result<IoStatusContent, DecodeError> {
    if content.is_empty() {
        return Err(DecodeError::TooShort { need: 1, got: 0 });
    }
    let flags = content[FLAGS_BYTE];
    Ok(IoStatusContent {
        braking: flags & BRAKING != 0,
        sanding: flags & SANDING != 0,
        jkv_on: flags & JKV_ON != 0,
        safety_device_on: flags & SAFETY_DEVICE_ON != 0,
        rail_brake: flags & RAIL_BRAKE != 0,
    })
}
