use clap::Subcommand;
use std::path::PathBuf;

pub mod execute;
pub mod scene;
pub mod verify;

#[derive(Subcommand)]
pub enum Commands {
    /// Show a summary of an XBF file
    Info {
        /// XBF file to inspect
        file: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the node hierarchy
    Tree {
        /// XBF file to read
        file: PathBuf,
    },

    /// List texture file names referenced by the scene
    Textures {
        /// XBF file to read
        file: PathBuf,
    },

    /// Check that files decode and re-encode to identical bytes
    Verify {
        /// XBF file or directory to search recursively
        path: PathBuf,

        /// Suppress progress bar and per-file lines
        #[arg(short, long)]
        quiet: bool,
    },

    /// Decode a file and write it back out
    Resave {
        /// Source XBF file
        file: PathBuf,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },
}
