pub mod debounce;
pub mod runner;
pub mod state;
pub mod throttle;

pub use debounce::Debouncer;
pub use state::AppState;
pub use throttle::RateLimiter;
