use std::{cmp::Ordering, collections::BinaryHeap};

use chrono::{DateTime, Duration, TimeZone, Utc};
use model::eke_msg::EkeMsg;

const CACHE_MAX_SIZE: usize = 1_000;
const UNEXPECTED_TIME_DIFF_SECS: i64 = 30;
const SEQUENCE_MODULUS: u32 = 255;

struct HeapEntry {
    timestamp: DateTime<Utc>,
    // Tie-breaker so the heap has a total order even when two records share
    // a timestamp; insertion order then decides.
    counter: u64,
    msg: EkeMsg,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.counter == other.counter
    }
}
impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so `.peek()`/`.pop()` give the
        // smallest timestamp first.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.counter.cmp(&self.counter))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct UdpOrderState {
    heap: BinaryHeap<HeapEntry>,
    waiting_for_no: Option<u8>,
    last_released_tst: DateTime<Utc>,
    next_counter: u64,
}

impl Default for UdpOrderState {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            waiting_for_no: None,
            last_released_tst: Utc.timestamp_opt(0, 0).single().unwrap(),
            next_counter: 0,
        }
    }
}

impl UdpOrderState {
    fn push(&mut self, msg: EkeMsg) {
        let entry = HeapEntry {
            timestamp: msg.ntp_timestamp,
            counter: self.next_counter,
            msg,
        };
        self.next_counter += 1;
        self.heap.push(entry);
    }

    /// Drains the heap while its head is releasable: any non-UDP record
    /// releases immediately; a UDP record only releases once its
    /// `packet_no` matches `waiting_for_no`.
    fn drain(&mut self) -> Vec<EkeMsg> {
        let mut released = Vec::new();
        while let Some(top) = self.heap.peek() {
            let is_udp = top.msg.is_udp();
            if !is_udp {
                let entry = self.heap.pop().unwrap();
                released.push(entry.msg);
                continue;
            }
            let packet_no = top.msg.as_udp().unwrap().packet_no;
            if Some(packet_no) == self.waiting_for_no {
                let entry = self.heap.pop().unwrap();
                self.last_released_tst = entry.timestamp;
                self.waiting_for_no = Some(next_packet_no(packet_no));
                released.push(entry.msg);
            } else {
                break;
            }
        }
        released
    }

    fn fast_forward(&mut self) {
        if let Some(top) = self.heap.peek() {
            self.waiting_for_no = Some(top.msg.as_udp().unwrap().packet_no);
        }
    }
}

fn next_packet_no(packet_no: u8) -> u8 {
    ((packet_no as u32 + 1) % SEQUENCE_MODULUS) as u8
}

/// Restores per-vehicle monotonic order of UDP packets under an 8-bit
/// wrapping sequence number, buffering out-of-order arrivals in a
/// timestamp-ordered heap and releasing a prefix once the expected packet
/// shows up (or the wait has gone on too long / the cache has overflowed).
pub fn apply(state: &mut UdpOrderState, msg: EkeMsg) -> Vec<EkeMsg> {
    if !msg.is_udp() {
        let should_buffer = state
            .heap
            .peek()
            .is_some_and(|top| msg.ntp_timestamp > top.timestamp);
        if should_buffer {
            state.push(msg);
            return state.drain();
        }
        return vec![msg];
    }

    let udp = msg.as_udp().unwrap();
    let packet_no = udp.packet_no;
    let ntp_time_valid = msg.ntp_time_valid;
    let ntp_timestamp = msg.ntp_timestamp;

    if !ntp_time_valid {
        let mut msg = msg;
        msg.discard = true;
        return vec![msg];
    }

    let Some(waiting_for_no) = state.waiting_for_no else {
        state.waiting_for_no = Some(next_packet_no(packet_no));
        state.last_released_tst = ntp_timestamp;
        return vec![msg];
    };

    if ntp_timestamp < state.last_released_tst {
        let mut msg = msg;
        msg.discard = true;
        return vec![msg];
    }

    let elapsed = ntp_timestamp - state.last_released_tst;
    let heap_top_older = state
        .heap
        .peek()
        .is_some_and(|top| top.timestamp < ntp_timestamp);

    if packet_no != waiting_for_no
        || elapsed > Duration::seconds(UNEXPECTED_TIME_DIFF_SECS)
        || heap_top_older
    {
        state.push(msg);
        if state.heap.len() > CACHE_MAX_SIZE {
            state.fast_forward();
        }
        return state.drain();
    }

    state.last_released_tst = ntp_timestamp;
    state.waiting_for_no = Some(next_packet_no(packet_no));
    let mut released = vec![msg];
    released.extend(state.drain());
    released
}
