pub mod antisnipe;
pub mod commands;
pub mod model;
