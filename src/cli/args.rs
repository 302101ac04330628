//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--repo <path>`: Content repository (default: current directory)
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Folio - serve and edit a website stored in a git repository
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Content repository (default: current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; only warnings and errors are logged
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a file from the repository
    #[command(
        name = "cat",
        after_help = "\
EXAMPLES:
    # Current version (cached HEAD)
    folio cat index.html

    # As of an older commit
    folio cat index.html --rev HEAD~3"
    )]
    Cat {
        /// Repository path
        path: String,

        /// Revision to read from
        #[arg(long, default_value = "HEAD")]
        rev: String,
    },

    /// Show the history of a file
    #[command(name = "log")]
    Log {
        /// Repository path
        path: String,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Expand a page and print the result
    #[command(
        name = "render",
        long_about = "Expand a page and print the resulting HTML.\n\n\
            The page is looked up like a URL: 'about' tries about.html, then \
            about/index.html. Includes are spliced in, slots substituted and \
            editable regions marked. With --lang, the first language the page \
            declares and has an overlay for is used.",
        after_help = "\
EXAMPLES:
    # Render the home page
    folio render /

    # Render in German, falling back to the page's primary language
    folio render about --lang de-AT --lang de

    # Show where each editable region comes from
    folio render about --positions"
    )]
    Render {
        /// Page URL path
        page: String,

        /// Preferred language (repeatable, best first)
        #[arg(long = "lang", value_name = "CODE")]
        langs: Vec<String>,

        /// Print the edit position index as JSON instead of HTML
        #[arg(long)]
        positions: bool,
    },

    /// Write a file, commit and push
    #[command(name = "put")]
    Put {
        /// Repository path to write
        path: String,

        /// Local file with the new content
        file: PathBuf,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Upload a file into a directory, reusing an identical existing file
    #[command(
        name = "upload",
        long_about = "Upload a file into a repository directory.\n\n\
            If the directory already holds a file with identical content, its \
            path is printed and nothing is written. Otherwise the file is stored \
            under its own name, or name-1, name-2, ... if that is taken.",
        after_help = "\
EXAMPLES:
    folio upload img ~/Pictures/photo.png -m \"Add photo\""
    )]
    Upload {
        /// Repository directory
        dir: String,

        /// Local file to upload
        file: PathBuf,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Replace the content of an editable region
    #[command(
        name = "edit",
        long_about = "Replace the content of an editable region of a page.\n\n\
            The id is the generated edit id shown by 'folio render --positions'. \
            In the page's primary language the file the region was written in \
            is changed in place; in any other language the page's overlay file \
            (lang-<code>.html) is updated.",
        after_help = "\
EXAMPLES:
    # Fix a typo in the home page title
    folio edit / index-title title.html -m \"Fix title\"

    # Translate it
    folio edit / index-title title.de.html --lang de -m \"Translate title\""
    )]
    Edit {
        /// Page URL path
        page: String,

        /// Generated edit id
        id: String,

        /// Local file with the new HTML content
        file: PathBuf,

        /// Language to save in (repeatable, best first)
        #[arg(long = "lang", value_name = "CODE")]
        langs: Vec<String>,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    # Bash
    folio completion bash > ~/.local/share/bash-completion/completions/folio

    # Zsh
    folio completion zsh > ~/.zfunc/_folio"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion generation.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
