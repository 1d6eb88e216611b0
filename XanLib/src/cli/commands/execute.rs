//! Command execution implementations

use super::Commands;
use super::{scene, verify};

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Info { file, json } => scene::info(file, *json),
            Commands::Tree { file } => scene::tree(file),
            Commands::Textures { file } => scene::textures(file),
            Commands::Verify { path, quiet } => verify::execute(path, *quiet),
            Commands::Resave { file, output } => scene::resave(file, output),
        }
    }
}
