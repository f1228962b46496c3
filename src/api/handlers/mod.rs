pub mod callback;
pub use self::callback::callback;

pub mod error;
pub use self::error::ErrorBody;

pub mod health;
pub use self::health::health;

pub mod start_auth;
pub use self::start_auth::start_auth;
