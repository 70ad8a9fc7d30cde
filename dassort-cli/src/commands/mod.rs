pub mod args;
pub mod check;
pub mod poll;
pub mod watch;
