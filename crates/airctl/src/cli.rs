//! Clap derive structures for the `airctl` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

use airctl_core::{FanSpeed, Mode};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// airctl -- control air-conditioning units from the command line
#[derive(Debug, Parser)]
#[command(
    name = "airctl",
    version,
    about = "Control air-conditioning units from the command line",
    long_about = "Lists homes and AC units, shows their live state, stages and sends\n\
        mode/fan/temperature changes, and waits for the unit to confirm them.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Service profile to use
    #[arg(long, short = 'p', env = "AIRCTL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Service base URL (overrides profile)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "AIRCTL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "AIRCTL_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "AIRCTL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List homes
    Homes(HomesArgs),

    /// List AC units and show their state
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Change mode, fan speed, temperature or power of a unit
    Set(SetArgs),

    /// Power a unit on or off right away
    Power(PowerArgs),

    /// Follow a unit live until interrupted
    Watch(TargetArgs),

    /// Sign in and remember the session
    Login(LoginArgs),

    /// End the session and forget the stored token
    Logout,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Targeting ────────────────────────────────────────────────────────

/// Which home and unit to act on. Defaults to the remembered selection.
#[derive(Debug, Clone, Copy, Args)]
pub struct TargetArgs {
    /// Home ID
    #[arg(long = "home", short = 'H')]
    pub home: Option<i64>,

    /// Device ID
    #[arg(long = "device", short = 'd')]
    pub device: Option<i64>,
}

// ── Homes ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct HomesArgs {
    #[command(subcommand)]
    pub command: HomesCommand,
}

#[derive(Debug, Subcommand)]
pub enum HomesCommand {
    /// List homes
    #[command(alias = "ls")]
    List,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List units of a home
    #[command(alias = "ls")]
    List {
        /// Home ID
        #[arg(long = "home", short = 'H')]
        home: Option<i64>,
    },

    /// Show the state of a unit
    Status(TargetArgs),

    /// Flip power of a listed unit
    Toggle {
        /// Device ID
        device: i64,

        /// Home ID
        #[arg(long = "home", short = 'H')]
        home: Option<i64>,

        #[command(flatten)]
        wait: WaitArgs,
    },
}

// ── Set / Power ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Args)]
pub struct WaitArgs {
    /// Return once the service accepted the command, without waiting
    /// for the unit to confirm it
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Operating mode (cool, heat, dry, fan, auto, off)
    #[arg(long, short = 'm')]
    pub mode: Option<Mode>,

    /// Fan speed (auto, low, medium, high)
    #[arg(long, short = 'f')]
    pub fan: Option<FanSpeed>,

    /// Target temperature in °C (rounded, clamped to 16-30)
    #[arg(long, short = 't')]
    pub temperature: Option<f64>,

    /// Nudge the target temperature by this many degrees
    #[arg(long, allow_negative_numbers = true, conflicts_with = "temperature")]
    pub step: Option<i32>,

    /// Power state to stage together with the other changes
    #[arg(long)]
    pub power: Option<PowerState>,

    #[command(flatten)]
    pub wait: WaitArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct PowerArgs {
    #[command(subcommand)]
    pub command: PowerCommand,
}

#[derive(Debug, Subcommand)]
pub enum PowerCommand {
    /// Power the unit on
    On(PowerTarget),
    /// Power the unit off
    Off(PowerTarget),
    /// Power the unit opposite to its current state
    Toggle(PowerTarget),
}

#[derive(Debug, Clone, Copy, Args)]
pub struct PowerTarget {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub wait: WaitArgs,
}

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account email (defaults to the profile's)
    #[arg(long, short = 'e')]
    pub email: Option<String>,

    /// Also store the password in the system keyring
    #[arg(long)]
    pub remember: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets redacted)
    Show,

    /// Set a configuration value on the active profile
    Set {
        /// Config key (api_base_url, variant, email, password_env,
        /// insecure, timeout, refresh_interval_secs, ca_cert)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store the account password in the system keyring
    SetPassword {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
