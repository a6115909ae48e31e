pub mod interpreter;
pub mod tokenizer;
pub mod value;

pub use interpreter::{Interpreter, Limits, Program, Termination};
