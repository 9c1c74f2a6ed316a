use clap::{Args, Parser, Subcommand, ValueEnum};

use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(name = "fortune", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Config file (default: `{config_dir}/fortune/fortune.toml`)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log directory (default: `{data_dir}/fortune/logs`)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(name = "login", about = "Sign in with email, phone or username")]
    Login(LoginArg),
    #[command(name = "register", about = "Create an account")]
    Register(RegisterArg),
    #[command(name = "logout", about = "Sign out and forget stored tokens")]
    Logout,
    #[command(alias = "me", name = "profile")]
    Profile,
    #[command(alias = "ls", name = "history")]
    History(HistoryArg),
    #[command(name = "stats")]
    Stats,
    #[command(name = "show", about = "Show one reading")]
    Show(ShowArg),
    #[command(name = "ask", about = "Ask a question")]
    Ask(AskArg),
    #[command(name = "rate", about = "Rate a reading")]
    Rate(RateArg),
}

#[derive(Clone, Debug, Args)]
pub struct LoginArg {
    pub identifier: String,
    #[arg(short, long)]
    pub password: String,
    #[arg(long)]
    pub remember_me: bool,
}

#[derive(Clone, Debug, Args)]
pub struct RegisterArg {
    pub email: String,
    #[arg(short, long)]
    pub password: String,
    /// Derived from the email when omitted
    #[arg(short, long)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct HistoryArg {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, Args)]
pub struct ShowArg {
    pub id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Time,
    Number,
    Manual,
}

#[derive(Clone, Debug, Args)]
pub struct AskArg {
    pub question: String,
    #[arg(short, long, value_enum, default_value_t = MethodArg::Time)]
    pub method: MethodArg,
    /// RFC 3339 moment for time casting (default: now)
    #[arg(long)]
    pub datetime: Option<String>,
    /// Numbers for number casting
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub numbers: Vec<u32>,
    #[arg(long)]
    pub upper: Option<String>,
    #[arg(long)]
    pub lower: Option<String>,
    #[arg(long)]
    pub moving_line: Option<u8>,
}

#[derive(Clone, Debug, Args)]
pub struct RateArg {
    pub id: String,
    #[arg(long)]
    pub overall: u8,
    #[arg(long)]
    pub accuracy: Option<u8>,
    #[arg(long)]
    pub helpfulness: Option<u8>,
    #[arg(long)]
    pub feedback: Option<String>,
}
