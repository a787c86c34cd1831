pub mod client;
pub mod devices;
pub mod err;
pub mod mems;
pub mod proto;
pub mod regs;
pub mod server;

pub use client::*;
pub use devices::*;
pub use err::*;
pub use mems::*;
pub use regs::*;
pub use server::*;
