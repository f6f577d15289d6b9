#![allow(dead_code)]

pub mod fleet;
pub mod schedule;
pub mod world;
