use clap::Parser;

use vlmdock_client::{build_payload, InferClient, DEFAULT_URL};

/// Send one frame and command to a running vlmdock-server.
#[derive(Parser, Debug)]
#[command(name = "vlmdock-client")]
struct Args {
    /// Image file to send (PNG, JPEG, ...)
    image_path: String,

    /// Operator command, e.g. "move forward"
    command: String,

    /// Inference endpoint
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Reading the image is not a connection problem; let it abort.
    let payload = build_payload(&args.image_path, &args.command)?;
    let client = InferClient::new(args.url)?;

    match client.infer(&payload).await {
        Ok(body) => println!("Server response: {body}"),
        Err(e) => println!("Error connecting to server: {e:#}"),
    }

    Ok(())
}
