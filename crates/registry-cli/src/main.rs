use anyhow::Result;
use clap::{Parser, Subcommand};
use registry_mempool::wallet;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "registry-cli")]
#[command(about = "CLI client for the star registry node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a wallet: prints the secret key and the address
    Keygen,
    /// Sign a message with a wallet secret key
    Sign {
        #[arg(long)]
        secret: String,
        #[arg(long)]
        message: String,
    },
    /// Open a validation request for an address
    RequestValidation {
        #[arg(long)]
        address: String,
    },
    /// Submit the signed validation message to obtain a license
    Validate {
        #[arg(long)]
        address: String,
        #[arg(long)]
        signature: String,
    },
    /// Request, sign and validate in one go using a secret key
    Authorize {
        #[arg(long)]
        secret: String,
    },
    /// Register a star for a licensed address
    Submit {
        #[arg(long)]
        address: String,
        #[arg(long)]
        story: String,
        #[arg(long)]
        dec: Option<String>,
        #[arg(long)]
        ra: Option<String>,
        #[arg(long)]
        mag: Option<String>,
        #[arg(long)]
        cen: Option<String>,
    },
    /// Fetch a block by height
    Block { height: u64 },
    /// Fetch a star by block hash
    StarByHash { hash: String },
    /// Fetch every star of an address
    StarsByAddress { address: String },
}

#[derive(Serialize)]
struct AddressOut<'a> {
    address: &'a str,
}

#[derive(Serialize)]
struct SignatureOut<'a> {
    address: &'a str,
    signature: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StarOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    declination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    right_ascension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    magnitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    constellation: Option<String>,
    story: String,
}

#[derive(Serialize)]
struct ClaimOut<'a> {
    address: &'a str,
    star: StarOut,
}

async fn print_response(res: reqwest::Response) -> Result<String> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    println!("{body}");
    Ok(body)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node;
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Keygen => {
            let key = wallet::generate_wallet();
            println!("secret:  {}", wallet::secret_hex(&key));
            println!("address: {}", wallet::address_of(&key));
        }
        Command::Sign { secret, message } => {
            let key = wallet::signing_key_from_hex(&secret)?;
            println!("{}", wallet::sign_message(&key, &message));
        }
        Command::RequestValidation { address } => {
            let res = client
                .post(format!("{node}/requestValidation"))
                .json(&AddressOut { address: &address })
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Validate { address, signature } => {
            let res = client
                .post(format!("{node}/message-signature/validate"))
                .json(&SignatureOut {
                    address: &address,
                    signature: &signature,
                })
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Authorize { secret } => {
            let key = wallet::signing_key_from_hex(&secret)?;
            let address = wallet::address_of(&key);
            let request: serde_json::Value = client
                .post(format!("{node}/requestValidation"))
                .json(&AddressOut { address: &address })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let message = request["message"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("node returned no message: {request}"))?;
            debug!(message, "signing validation message");
            let signature = wallet::sign_message(&key, message);
            let res = client
                .post(format!("{node}/message-signature/validate"))
                .json(&SignatureOut {
                    address: &address,
                    signature: &signature,
                })
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Submit {
            address,
            story,
            dec,
            ra,
            mag,
            cen,
        } => {
            let claim = ClaimOut {
                address: &address,
                star: StarOut {
                    declination: dec,
                    right_ascension: ra,
                    magnitude: mag,
                    constellation: cen,
                    story,
                },
            };
            let res = client.post(format!("{node}/block")).json(&claim).send().await?;
            print_response(res).await?;
        }
        Command::Block { height } => {
            let res = client.get(format!("{node}/block/{height}")).send().await?;
            print_response(res).await?;
        }
        Command::StarByHash { hash } => {
            let res = client.get(format!("{node}/stars/hash/{hash}")).send().await?;
            print_response(res).await?;
        }
        Command::StarsByAddress { address } => {
            let res = client
                .get(format!("{node}/stars/address/{address}"))
                .send()
                .await?;
            print_response(res).await?;
        }
    }
    Ok(())
}
