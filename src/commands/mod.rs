pub mod ccs;
pub mod command;
