pub mod config;
pub mod error;
pub mod report;
pub mod request;
pub mod window;

pub use config::Config;
pub use error::*;
pub use report::*;
pub use request::*;
pub use window::TimeWindow;
