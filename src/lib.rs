//! Personal task board: categories, tasks and checklist subtasks.
//!
//! [`store::TodoStore`] owns the board and derives task status from each
//! task's checklist. It persists through a [`gateway::Gateway`], which can be
//! process memory, a SQLite file ([`db::SqliteGateway`]) or a REST record
//! store ([`remote::RemoteGateway`]). [`web`] renders the board over HTTP.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod remote;
pub mod store;
pub mod web;
