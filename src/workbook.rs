pub mod batch;
pub mod classify;
pub mod extract;
pub mod normalize;
pub mod sheet_common;

#[cfg(feature = "xlsx_read")]
pub mod excel;

pub use self::sheet_common::*;
