pub mod activity;
pub mod auction;
pub mod bidding;
pub mod database;
pub mod error;
pub mod handlers;
pub mod lock;
pub mod message_broker;
pub mod participant;
pub mod query;
pub mod room;
pub mod scheduler;
