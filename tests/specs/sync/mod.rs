//! Archive and sync engine specs

mod restore_all;
mod round_trip;
