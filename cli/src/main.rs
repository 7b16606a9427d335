use std::io::BufRead;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ouath::config::{ClientConfig, Configuration};
use ouath::crypto::{self, PasswordManager};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Hash a password for the `users` section of `config.yaml`.
    HashPassword {
        /// Read from standard input when omitted.
        password: Option<String>,
    },
    /// Print a new client entry for the `clients` section of `config.yaml`.
    NewClient {
        /// Name shown on the login prompt.
        #[clap(long, short)]
        name: String,
        /// Allowed redirect URI, repeat for several.
        #[clap(long = "redirect-uri", short, required = true)]
        redirect_uris: Vec<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let result = match args.cmd {
        Commands::HashPassword { password } => hash_password(password),
        Commands::NewClient {
            name,
            redirect_uris,
        } => new_client(name, redirect_uris),
    };

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        },
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        },
    }
}

fn hash_password(
    password: Option<String>,
) -> Result<String, Box<dyn std::error::Error>> {
    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_owned()
        },
    };
    if password.is_empty() {
        return Err("password is empty".into());
    }

    // Same parameters as the server when `argon2` is not configured.
    let config = Configuration::default();
    let pwd = PasswordManager::new(config.argon2)?;

    Ok(pwd.hash_password(password)?)
}

fn new_client(
    name: String,
    redirect_uris: Vec<String>,
) -> Result<String, Box<dyn std::error::Error>> {
    let client = ClientConfig {
        client_id: Some(format!("client-{}", crypto::random_hex(8)?)),
        client_secret: Some(crypto::opaque_token()?),
        name,
        description: None,
        redirect_uris,
        owner_id: None,
    };

    // Fail here rather than at server startup.
    let mut config = Configuration::default();
    config.clients.push(client.clone());
    config.with_overrides(None, None)?;

    Ok(serde_yaml::to_string(&vec![client])?)
}
