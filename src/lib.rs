pub mod app;
#[cfg(all(feature = "cliapp", feature = "xlsx_read"))]
pub mod cmd;
pub mod import;
pub mod log;
pub mod registry;
pub mod store;
pub mod tracing;
pub mod util;
pub mod workbook;

extern crate lazy_static;

#[cfg(any(test, feature = "testlib"))]
pub mod testlib;
