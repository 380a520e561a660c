pub mod buffer;
pub mod connection;
pub mod migrations;
pub mod repositories;

pub use buffer::ScheduleWriter;
pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    InMemoryOnCallRepository, OnCallRepository, RepositoryError, SqlOnCallRepository,
};
