pub mod add;
pub mod common;
pub mod delete;
pub mod edit;
pub mod export;
pub mod list;
pub mod mode;
pub mod navigate;
pub mod view;
