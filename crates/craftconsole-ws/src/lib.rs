pub mod client;

pub use client::{LinkError, WsClient, WsConnectConfig, WsFrame, WsLink};
