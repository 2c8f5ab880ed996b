pub mod knowledge;
pub mod prompt;
