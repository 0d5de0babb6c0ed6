//! Typed wrappers over the engine's in-database analytics procedures.
//!
//! Everything here is mechanical parameter marshalling: a wrapper turns its
//! typed arguments into a property string and drives the invocation helper
//! of `pushframe_core`. The heavy lifting — materialization, temporary
//! object lifecycle, the call protocol — lives in the core.

pub mod discretization;
pub mod errors;
pub mod exploration;
pub mod model_manager;
pub mod predictive;
pub mod preparation;

pub use errors::{AnalyticsError, Result};
pub use model_manager::ModelManager;

/// Chainable setter for an optional parameter field.
macro_rules! opt_fn {
    ($name:ident, $ty:ty) => {
        pub fn $name(mut self, $name: impl Into<$ty>) -> Self {
            self.$name = Some($name.into());
            self
        }
    };
}
pub(crate) use opt_fn;
