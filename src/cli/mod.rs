pub mod app;
pub mod commands;
pub mod context;
pub mod criteria;
pub mod dispatch;
pub mod dump;
pub mod env;
pub mod find;
pub mod info;
pub mod labels;
pub mod matching;
pub mod output;
pub mod resolve;
pub mod runtime;
