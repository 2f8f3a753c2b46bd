use model::eke_msg::{Cabin, UdpContent};

use crate::error::DecodeError;

/// Byte offsets below are relative to the start of the UDP content region
/// (i.e. byte 12 of the full frame, right after the header).
const PACKET_NO: usize = 0;
const SPEED: usize = 4;
const ODO: usize = 8;
const STANDSTILL: usize = 20;
const DOORS_OPEN: usize = 21;
const DOORS_OPEN_LEN: usize = 8;
const MAIN_BRAKE_PIPE_PRESSURE: usize = 92;
const ACTIVE_CABIN: usize = 143;
const VEHICLE_COUNT: usize = 144;
const VEHICLE_POS_ON_TRAIN: usize = 145;
const ALL_VEHICLES: usize = 146;
const TRAIN_NO: usize = 156;
const LOC_X: usize = 160;
const LOC_Y: usize = 164;
const TELESTE_TIMESTAMP: usize = 168;

const MIN_LEN: usize = TELESTE_TIMESTAMP + 4;

pub fn parse_udp(content: &[u8]) -> Result<UdpContent, DecodeError> {
    if content.len() < MIN_LEN {
        return Err(DecodeError::TooShort {
            need: MIN_LEN,
            got: content.len(),
        });
    }

    let packet_no = content[PACKET_NO];
    let speed = f32::from_be_bytes(content[SPEED..SPEED + 4].try_into().unwrap());
    let odo = u16::from_be_bytes(content[ODO..ODO + 2].try_into().unwrap());
    let standstill = content[STANDSTILL] != 0;
    let doors_open = content[DOORS_OPEN..DOORS_OPEN + DOORS_OPEN_LEN]
        .iter()
        .any(|&b| b & 0x3F != 0);
    let main_brake_pipe_pressure = f32::from_be_bytes(
        content[MAIN_BRAKE_PIPE_PRESSURE..MAIN_BRAKE_PIPE_PRESSURE + 4]
            .try_into()
            .unwrap(),
    );
    let active_cabin = parse_cabin(content[ACTIVE_CABIN]);
    let vehicle_count = content[VEHICLE_COUNT];
    let vehicle_pos_on_train = content[VEHICLE_POS_ON_TRAIN];
    let all_vehicles: [u8; 4] = content[ALL_VEHICLES..ALL_VEHICLES + 4].try_into().unwrap();
    let vehicle_no = all_vehicles[vehicle_pos_on_train as usize];
    let train_no = u16::from_be_bytes(content[TRAIN_NO..TRAIN_NO + 2].try_into().unwrap());
    let loc_x = f32::from_be_bytes(content[LOC_X..LOC_X + 4].try_into().unwrap()) as f64;
    let loc_y = f32::from_be_bytes(content[LOC_Y..LOC_Y + 4].try_into().unwrap()) as f64;
    let teleste_timestamp = u32::from_be_bytes(
        content[TELESTE_TIMESTAMP..TELESTE_TIMESTAMP + 4]
            .try_into()
            .unwrap(),
    )
    .to_string();

    Ok(UdpContent {
        packet_no,
        speed,
        odo,
        standstill,
        doors_open,
        active_cabin,
        vehicle_count,
        vehicle_pos_on_train,
        vehicle_no,
        all_vehicles,
        train_no,
        loc_x,
        loc_y,
        main_brake_pipe_pressure,
        teleste_timestamp,
    })
}

const CABIN_NONE: u8 = 0;
const CABIN_B: u8 = 1;
const CABIN_A: u8 = 2;
const CABIN_AB: u8 = 3;

fn parse_cabin(byte: u8) -> Option<Cabin> {
    match byte {
        CABIN_A => Some(Cabin::A),
        CABIN_B => Some(Cabin::B),
        CABIN_AB => Some(Cabin::Ab),
        CABIN_NONE => None,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    #[test]
    fn rejects_short_content() {
        let content = frame(MIN_LEN - 1);
        assert!(parse_udp(&content).is_err());
    }

    #[test]
    fn parses_fields_at_expected_offsets() {
        let mut content = frame(MIN_LEN);
        content[PACKET_NO] = 7;
        content[STANDSTILL] = 1;
        content[ACTIVE_CABIN] = CABIN_A;
        content[VEHICLE_COUNT] = 3;
        content[TRAIN_NO..TRAIN_NO + 2].copy_from_slice(&1234u16.to_be_bytes());

        let udp = parse_udp(&content).unwrap();
        assert_eq!(udp.packet_no, 7);
        assert!(udp.standstill);
        assert!(!udp.doors_open);
        assert_eq!(udp.active_cabin, Some(Cabin::A));
        assert_eq!(udp.vehicle_count, 3);
        assert_eq!(udp.train_no, 1234);
    }

    #[test]
    fn active_cabin_byte_values_map_correctly() {
        assert_eq!(parse_cabin(2), Some(Cabin::A));
        assert_eq!(parse_cabin(1), Some(Cabin::B));
        assert_eq!(parse_cabin(3), Some(Cabin::Ab));
        assert_eq!(parse_cabin(0), None);
    }

    #[test]
    fn vehicle_no_is_indexed_by_position_on_train() {
        let mut content = frame(MIN_LEN);
        content[VEHICLE_POS_ON_TRAIN] = 2;
        content[ALL_VEHICLES..ALL_VEHICLES + 4].copy_from_slice(&[11, 12, 13, 14]);

        let udp = parse_udp(&content).unwrap();
        assert_eq!(udp.all_vehicles, [11, 12, 13, 14]);
        assert_eq!(udp.vehicle_no, 13);
    }

    #[test]
    fn doors_open_ignores_top_two_bits() {
        let mut content = frame(MIN_LEN);
        content[DOORS_OPEN] = 0b1100_0000;
        assert!(!parse_udp(&content).unwrap().doors_open);

        content[DOORS_OPEN] = 0b0000_0001;
        assert!(parse_udp(&content).unwrap().doors_open);
    }
}
