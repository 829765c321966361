//! tellycache library
//!
//! Typed, two-tier caching of TMDB detail records (shows, seasons, movies and
//! people) in front of the network, with single-flight fetching per key.
//!
//! The `tellycache` binary runs one command and exits, so it purges on
//! request (`tellycache purge`). Long-running embedders can start
//! [`sweep::SweepHandle`] to purge expired entries on an interval instead.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod services;
pub mod sweep;
