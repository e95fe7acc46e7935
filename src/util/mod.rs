pub mod exception;
pub mod serde;
pub mod telemetry;
pub mod thread_name;

pub use self::exception::*;
pub use self::serde::*;
pub use self::telemetry::*;
pub use self::thread_name::*;
