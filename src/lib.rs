//! Feed aggregator library.
//!
//! Scrapes registered RSS feeds on a fixed schedule, stores each new item
//! once, and serves users, feeds, follows and aggregated posts over a JSON
//! API.

pub mod config;
pub mod db;
pub mod scraper;
pub mod web;
