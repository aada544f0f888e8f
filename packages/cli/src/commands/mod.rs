pub mod check;
pub mod eval;
pub mod fill;

pub use check::{check, CheckArgs};
pub use eval::{eval, EvalArgs};
pub use fill::{fill, FillArgs};
