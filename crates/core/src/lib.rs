#![forbid(unsafe_code)]

pub mod answer_store;
pub mod model;
pub mod time;

pub use answer_store::AnswerStore;
pub use time::Clock;
