//! Embedded script runtime.
//!
//! Reloadable code lives in `.rl` script files interpreted by this module.
//! It provides the two host facilities the reload engine needs: a parser
//! that can find a named definition in a file, and a way to execute source
//! text inside an already-running module's namespace.
//!
//! # Modules
//!
//! - `token` / `lexer` - `logos`-based tokenizer with byte spans
//! - `ast` / `parser` - syntax tree and recursive-descent parser
//! - `value` - runtime values (functions, classes, instances, proxies)
//! - `interp` - tree-walking evaluator
//! - `module` - a file's global namespace
//! - `builtins` - `print`, `str`, `len`, `sleep`, `reloadr`, `autoreload`
//!
//! # Example
//!
//! ```text
//! @reloadr
//! class Car {
//!     x = 0;
//!     fn init(self, x) { self.x = x; }
//!     fn move(self, dx) { self.x = self.x + dx; }
//! }
//!
//! fn main() {
//!     let car = Car(1000);
//!     while true {
//!         car.move(1);
//!         print("Car on", car.x);
//!         sleep(0.3);
//!         Car._reload();
//!     }
//! }
//! ```

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod token;
pub mod value;

pub use error::{RuntimeError, ScriptError, SyntaxError};
pub use interp::{call_value, construct, get_attr};
pub use module::Module;
pub use value::{Class, Function, Instance, Value};
