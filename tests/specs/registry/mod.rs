//! Agent registry specs

mod concurrent;
