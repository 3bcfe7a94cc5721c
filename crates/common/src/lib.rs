// squadlink-common: shared types and wire protocol for the Squadlink workspace

pub mod protocol;
pub mod types;
