pub mod baliseparts;
pub mod balisedirection;
pub mod dedup;
pub mod events;
pub mod stationevents;
pub mod tstvalidator;
pub mod udporder;
pub mod worker;
