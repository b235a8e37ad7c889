#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use capz_controller_azure as azure;
pub use capz_controller_core as core;
pub use capz_controller_k8s_api as k8s;
pub use capz_controller_scopes as scopes;

mod args;
mod index;

pub use self::args::Args;
