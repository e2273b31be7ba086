pub mod commands;
pub mod progress;
pub mod ui;

pub use progress::{ConsoleRenderer, render_event};
pub use ui::Output;
