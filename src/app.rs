pub mod approot;
pub mod outfmt;

pub const SHARELEDGER_APP_VERSION: &str = env!("CARGO_PKG_VERSION");
