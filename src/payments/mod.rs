mod yookassa;

pub use yookassa::*;
