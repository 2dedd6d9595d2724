use dotenvy::dotenv;
use log::*;
use pharmacy_dispatch_server::{
    cli::{display_help, parse_command_line_args, Command},
    config::ServerConfig,
    server::run_server,
    timeout_sweeper::run_single_sweep,
};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let command = parse_command_line_args();
    if command == Command::Help {
        display_help();
        return;
    }
    let config = ServerConfig::from_env_or_default();
    match command {
        Command::Sweep => match run_single_sweep(&config).await {
            Ok(result) => println!("{} emergency orders expired", result.count()),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            },
        },
        _ => match run_server(config).await {
            Ok(_) => println!("Bye!"),
            Err(e) => {
                error!("🚀️ Server stopped with an error. {e}");
                eprintln!("{e}");
            },
        },
    }
}
