#![doc = include_str!("../README.md")]

pub use wirebound_pack as pack;
pub use wirebound_unpack as unpack;
pub use wirebound_wire as wire;
