mod album;
mod order;
mod payment;
mod purchase;
mod seller_config;
mod webhook_event;

pub use album::*;
pub use order::*;
pub use payment::*;
pub use purchase::*;
pub use seller_config::*;
pub use webhook_event::*;
