//! Control-plane provisioning specs

mod local;
mod one_shot;
mod remote;
