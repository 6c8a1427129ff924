use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// gebruiksruimte - nutrient usage space for Dutch farm administrations
#[derive(Parser, Debug)]
#[command(name = "gebruiksruimte")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// DuckDB database file (in-memory when absent)
    #[arg(long, env = "GEBRUIKSRUIMTE_DB", global = true)]
    pub db: Option<PathBuf>,

    /// User whose administration is read and written
    #[arg(long, env = "GEBRUIKSRUIMTE_USER", global = true, default_value = "local")]
    pub user: String,

    /// Act on behalf of another user
    #[arg(long, global = true)]
    pub acting_as: Option<String>,

    /// Load reference and entity files from this directory before running the command
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load `<table>.parquet` / `<table>.csv` files into the database
    Load {
        /// Directory holding the files
        #[arg(long)]
        dir: PathBuf,
    },

    /// Resolve, create and maintain usage norms
    #[command(subcommand)]
    Norm(NormCommand),

    /// Show category, context and working coefficient for a fertiliser application
    Classify {
        /// Fertiliser name as it appears in the catalogue
        #[arg(long)]
        fertilizer: String,

        /// Declared application type, e.g. "dierlijke mest" or "kunstmest"
        #[arg(long = "type", default_value = "dierlijke mest")]
        application_type: String,

        /// Manure produced on the farm itself
        #[arg(long)]
        own_farm: bool,

        /// Crop name of the usage norm
        #[arg(long, default_value = "")]
        crop: String,

        /// Soil label of the parcel
        #[arg(long, default_value = "")]
        soil: String,

        /// Application date (DD-MM-YYYY or YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },

    /// Record a fertiliser application against a usage norm
    Apply {
        /// Usage norm id
        #[arg(long)]
        norm: String,

        /// Fertiliser id
        #[arg(long)]
        fertilizer: String,

        /// Application date (DD-MM-YYYY or YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Quantity in kg per hectare
        #[arg(long)]
        quantity: f64,

        /// Manual nitrogen in kg/ha (required for animal manure)
        #[arg(long)]
        n: Option<f64>,

        /// Manual phosphate in kg P2O5/ha
        #[arg(long)]
        p2o5: Option<f64>,

        /// Manual potassium in kg K2O/ha
        #[arg(long)]
        k2o: Option<f64>,

        /// Manure produced on the farm itself
        #[arg(long)]
        own_farm: bool,

        #[arg(long)]
        notes: Option<String>,

        /// Replace this existing application instead of adding one
        #[arg(long)]
        edit: Option<String>,
    },

    /// Allowed versus applied nutrients per company for one year
    Report {
        #[arg(long)]
        year: i32,

        /// Move all non-animal nitrogen and phosphate to this company
        #[arg(long)]
        head_company: Option<String>,

        /// Only report these companies
        #[arg(long, value_delimiter = ',')]
        company: Option<Vec<String>>,

        /// Print one line per counted application
        #[arg(long)]
        audit: bool,

        /// Emit JSON instead of cards
        #[arg(long)]
        json: bool,
    },

    /// Print the contents of a table
    Show {
        table: String,

        /// Maximum rows
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Write a table to a Parquet file
    Export {
        table: String,

        /// Output path
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum NormCommand {
    /// Resolve norms for a parcel and crop without storing them
    Resolve {
        #[arg(long)]
        parcel: String,

        /// Crop id from the crop norm table
        #[arg(long)]
        crop: String,

        #[arg(long)]
        year: i32,

        #[arg(long)]
        derogation: bool,
    },

    /// Resolve and store a usage norm
    Create {
        #[arg(long)]
        company: String,

        #[arg(long)]
        parcel: String,

        /// Crop id from the crop norm table
        #[arg(long)]
        crop: String,

        #[arg(long)]
        year: i32,

        #[arg(long)]
        derogation: bool,
    },

    /// Re-resolve a stored usage norm against the current tables
    Recalculate {
        id: String,

        /// Switch derogation on or off
        #[arg(long)]
        derogation: Option<bool>,
    },

    /// Create usage norms from a CSV or Parquet file (company, parcel, crop, year, derogation)
    Import {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// List the stored usage norms
    List {
        #[arg(long)]
        year: Option<i32>,
    },
}
