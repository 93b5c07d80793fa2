use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use binder_core::selector::StorageMode;

#[derive(Parser)]
#[command(name = "binder")]
#[command(about = "Organize notes and files in nested folders")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding Binder's local databases
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Signed-in user id; enables cloud storage
    #[arg(long, global = true, env = "BINDER_USER_ID", value_name = "ID")]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the current folder
    #[command(alias = "list")]
    Ls {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change folder: a name or ID prefix, `..` or `/`
    Cd {
        /// Target folder
        target: String,
    },
    /// Print the current folder path
    Pwd,
    /// Create a folder in the current folder
    Mkdir {
        /// Folder name
        name: String,
    },
    /// Create a note in the current folder
    Note {
        /// Note name
        name: String,
        /// Note text (read from stdin when omitted)
        text: Vec<String>,
    },
    /// Replace the text of a note
    Edit {
        /// Note name or ID prefix
        target: String,
        /// New text (read from stdin when omitted)
        text: Vec<String>,
    },
    /// Upload files into the current folder
    Upload {
        /// Files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Rename a folder or file
    #[command(alias = "mv")]
    Rename {
        /// Name or ID prefix
        target: String,
        /// New name
        name: String,
    },
    /// Delete a folder (with everything inside) or a file
    #[command(alias = "delete")]
    Rm {
        /// Name or ID prefix
        target: String,
    },
    /// Show a file's content
    #[command(alias = "view")]
    Cat {
        /// File name or ID prefix
        target: String,
    },
    /// Save a file to disk
    Get {
        /// File name or ID prefix
        target: String,
        /// Output path (defaults to the file name in the working directory)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Export a folder as a ZIP archive
    Export {
        /// Folder name or ID prefix
        target: String,
        /// Output path (defaults to `<folder>.zip` in the working directory)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Show or change the storage mode
    Mode {
        /// Mode to switch to
        #[arg(value_enum)]
        mode: Option<ModeArg>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    Local,
    Cloud,
}

impl From<ModeArg> for StorageMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Local => Self::Local,
            ModeArg::Cloud => Self::Cloud,
        }
    }
}
