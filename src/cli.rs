//! Command-line interface parsing for fortune-cache
//!
//! This module handles parsing of CLI arguments using clap: lifecycle commands
//! for the response store, request handling through the strategy engine, and
//! memoized backend data loads.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::DataSet;
use crate::intercept::{Destination, InterceptedRequest};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified data set name is not recognized
    #[error("Invalid data set: '{0}'. Valid data sets: dreams_feed, tarots_feed, sajus_feed, hot_dreams, hot_tarots, hot_sajus, live_activity, my_dreams, my_tarots, my_sajus")]
    InvalidDataSet(String),

    /// The specified destination is not recognized
    #[error("Invalid destination: '{0}'. Valid destinations: document, image, font, script, style, manifest, empty, other")]
    InvalidDestination(String),
}

/// fortune-cache - offline-first caching for the fortune reading client
#[derive(Parser, Debug)]
#[command(name = "fortune-cache")]
#[command(about = "Response store lifecycle, request strategies and memoized data loads")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the static generation for the configured version and precache assets
    Install,
    /// Delete generations from other versions and make this version current
    Activate,
    /// Serve a request through the strategy engine
    Fetch(RequestArgs),
    /// Show which strategy a request would use
    Classify(RequestArgs),
    /// List generations in the response store
    Generations,
    /// Load a backend data set through the memoizing cache
    Data {
        /// Data set name, e.g. tarots_feed
        dataset: String,
    },
}

/// Describes an intercepted request on the command line
#[derive(clap::Args, Debug, Clone)]
pub struct RequestArgs {
    /// Absolute request URL
    pub url: String,

    /// HTTP method
    #[arg(long, default_value = "GET")]
    pub method: String,

    /// Resource type: document, image, font, script, style, manifest, empty, other
    #[arg(long, default_value = "empty")]
    pub destination: String,

    /// Treat the request as a top-level page navigation
    #[arg(long)]
    pub navigate: bool,
}

impl RequestArgs {
    /// Builds the request descriptor handed to the engine
    pub fn to_request(&self) -> Result<InterceptedRequest, CliError> {
        let destination = parse_destination_arg(&self.destination)?;
        Ok(InterceptedRequest {
            url: self.url.clone(),
            method: self.method.clone(),
            destination,
            navigation: self.navigate,
        })
    }
}

/// Parses a data set name as used in cache keys
pub fn parse_dataset_arg(s: &str) -> Result<DataSet, CliError> {
    DataSet::from_key(&s.to_lowercase()).ok_or_else(|| CliError::InvalidDataSet(s.to_string()))
}

/// Parses a request destination name
pub fn parse_destination_arg(s: &str) -> Result<Destination, CliError> {
    s.parse::<Destination>()
        .map_err(|_| CliError::InvalidDestination(s.to_string()))
}
