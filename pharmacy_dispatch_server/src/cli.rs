use std::{env, env::VarError};

/// What the binary has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    /// Run one timeout sweep against the configured database and exit.
    Sweep,
    Help,
}

impl Command {
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Self {
        let args = args.into_iter().skip(1).collect::<Vec<_>>();
        match args.as_slice() {
            [] => Command::Serve,
            [cmd] if cmd == "sweep" => Command::Sweep,
            _ => Command::Help,
        }
    }
}

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn parse_command_line_args() -> Command {
    Command::from_args(env::args())
}

pub fn display_help() {
    display_readme();
    display_envs();
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "PDS_HOST",
        "PDS_PORT",
        "PDS_DATABASE_URL",
        "PDS_DB_MAX_CONNECTIONS",
        "PDS_DISPATCH_RADIUS_M",
        "PDS_MAX_TARGETED_PHARMACIES",
        "PDS_RESPONSE_TIMEOUT_MINUTES",
        "PDS_SWEEP_INTERVAL_SECS",
        "PDS_RUN_SWEEPER",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
