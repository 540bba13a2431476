mod arg_parser;
mod client_cli;
mod logging;

use arg_parser::{ArgParser, ConfigAction, SubCommand};
use client_cli::ClientCli;
use liltlib::settings::SettingsStore;

use clap::Parser;
use std::{error, process};

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    let args = ArgParser::parse();
    logging::init(args.verbose);

    let settings = match args.config {
        Some(path) => SettingsStore::at(path),
        None => SettingsStore::user_default()?,
    };
    let mut client = ClientCli::new(settings);

    match args.sub_command {
        SubCommand::Run(run_args) => {
            let succeeded = client.run_job(run_args).await;
            client.shutdown();
            if !succeeded? {
                process::exit(1);
            }
        }
        SubCommand::Find { name } => client.find_binary(&name).await?,
        SubCommand::Config { action } => match action {
            ConfigAction::Show => client.show_config()?,
            ConfigAction::Reset => client.reset_config()?,
        },
        SubCommand::Open { url } => client.open_url(&url)?,
        SubCommand::Version => println!("{}", env!("CARGO_PKG_VERSION")),
    }

    Ok(())
}
