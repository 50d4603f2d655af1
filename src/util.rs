pub mod basic;
pub mod date;
pub mod http;
pub mod rw;

#[cfg(not(target_arch = "wasm32"))]
pub mod os;
