use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level parser for the `rehearse` binary.
#[derive(Debug, Parser)]
#[command(name = "rehearse", version, about = "Rehearse job interviews by voice")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Settings file (defaults to the platform config dir)
    #[arg(long, global = true, env = "REHEARSE_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create an account and sign in.
    Signup(SignUpArgs),
    /// Sign in (username locally, email with cloud accounts).
    Signin(SignInArgs),
    /// Forget the signed-in user.
    Signout,
    /// Show the signed-in user.
    Whoami,
    /// Create a new interview.
    Generate(GenerateArgs),
    /// List stored interviews and results.
    List,
    /// Run an interview session.
    Interview(InterviewArgs),
    /// Show a scored result.
    Feedback(FeedbackArgs),
    /// Print the effective settings.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct SignUpArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "REHEARSE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Args)]
pub struct SignInArgs {
    /// Username, or email when cloud accounts are enabled
    pub login: String,
    #[arg(long, env = "REHEARSE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Answer the five intake questions by voice
    #[arg(long, conflicts_with_all = ["role", "kind", "experience", "technology", "count"])]
    pub voice: bool,

    #[arg(long, required_unless_present = "voice")]
    pub role: Option<String>,

    /// technical, behavioral or system design
    #[arg(long = "type", value_name = "TYPE", required_unless_present = "voice")]
    pub kind: Option<String>,

    /// junior, mid or senior
    #[arg(long, required_unless_present = "voice")]
    pub experience: Option<String>,

    #[arg(long, required_unless_present = "voice")]
    pub technology: Option<String>,

    /// Number of questions (default 5)
    #[arg(long)]
    pub count: Option<String>,
}

#[derive(Debug, Args)]
pub struct InterviewArgs {
    pub id: String,

    /// Type answers instead of speaking them
    #[arg(long)]
    pub typed: bool,
}

#[derive(Debug, Args)]
pub struct FeedbackArgs {
    pub result_id: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write the effective settings back to disk
    #[arg(long)]
    pub save: bool,
}
