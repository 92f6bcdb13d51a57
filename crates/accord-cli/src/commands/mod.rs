pub mod fund;
pub mod init;
pub mod property;
pub mod query;
