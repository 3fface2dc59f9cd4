//! Application wiring - shared state and the process runtime.

mod runtime;
mod state;

pub use runtime::run;
pub use state::AppState;
