pub mod calendar;
pub mod collections;
pub mod config;
pub mod debounce;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod firestore;
pub mod form;
pub mod genai;
pub mod http_client;
pub mod hub;
pub mod memory_store;
pub mod session;
pub mod state;
pub mod store;
pub mod supervisor;
pub mod vod;
pub mod writer;
