//! Hot code reloading for long-running scripts.
//!
//! Scripts are written in a small embedded language. A class or function
//! decorated with `@reloadr` is replaced by a proxy: whenever a trigger
//! fires, the proxy re-reads its definition from the file, re-executes it
//! inside the running module and swaps the new version in. Instances built
//! through a class proxy keep their fields and pick up the new methods.
//!
//! ```text
//! @reloadr
//! class Car {
//!     x = 0;
//!     fn move(self, dx) { self.x = self.x + dx; }
//! }
//! ```
//!
//! From Rust, load a module and drive the proxies directly:
//!
//! ```ignore
//! let module = reloadr::script::Module::load("car.rl")?;
//! for proxy in module.proxies() {
//!     proxy.reload()?;
//! }
//! ```

pub mod config;
pub mod logger;
pub mod reload;
pub mod script;
pub mod utils;

pub use reload::{Proxy, ReloadError, ReloadOutcome, autoreload, reloadr};
pub use script::{Module, Value};
