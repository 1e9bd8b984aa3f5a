pub mod config;
pub mod dialog;
pub mod page;
pub mod poller;
pub mod reminder;
pub mod schedule;
pub mod seqno;

#[cfg(test)]
mod testing;
