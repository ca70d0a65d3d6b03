use argh::FromArgs;
use std::path::PathBuf;

mod messages;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Vectorize client for uploading images and fetching generated SVGs
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Image(ImageCommand),
    Style(StyleCommand),
    Generate(GenerateCommand),
    Status(StatusCommand),
    Result(ResultCommand),
    Download(DownloadCommand),
}

#[derive(FromArgs)]
/// Select the image to vectorize
#[argh(subcommand, name = "image")]
struct ImageCommand {
    /// the path to the image
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// declared media type, e.g. image/png
    #[argh(option, short = 'm')]
    mime_type: Option<String>,
}

#[derive(FromArgs)]
/// Pick the vectorization style
#[argh(subcommand, name = "style")]
struct StyleCommand {
    /// style name, e.g. "Low Poly Geometric" or low-poly
    #[argh(positional)]
    style: String,
}

#[derive(FromArgs)]
/// Start generating vectors for the selected image
#[argh(subcommand, name = "generate")]
struct GenerateCommand {}

#[derive(FromArgs)]
/// Show the processing status
#[argh(subcommand, name = "status")]
struct StatusCommand {}

#[derive(FromArgs)]
/// Show the generation result
#[argh(subcommand, name = "result")]
struct ResultCommand {}

#[derive(FromArgs)]
/// Save the generated SVG into a directory
#[argh(subcommand, name = "download")]
struct DownloadCommand {
    /// output directory
    #[argh(option, short = 'o', default = "PathBuf::from(\".\")")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let response = match args.command {
        ClientCommands::Image(command) => {
            client
                .post(format!("http://{}/image", addr))
                .json(&messages::ImageRequest {
                    image_path: command.image_path,
                    mime_type: command.mime_type,
                })
                .send()
                .await?
        }
        ClientCommands::Style(command) => {
            client
                .post(format!("http://{}/style", addr))
                .json(&messages::StyleRequest {
                    style: command.style,
                })
                .send()
                .await?
        }
        ClientCommands::Generate(_) => {
            client
                .post(format!("http://{}/generate", addr))
                .send()
                .await?
        }
        ClientCommands::Status(_) => {
            client
                .get(format!("http://{}/status", addr))
                .send()
                .await?
        }
        ClientCommands::Result(_) => {
            client
                .get(format!("http://{}/result", addr))
                .send()
                .await?
        }
        ClientCommands::Download(command) => {
            let result = client
                .get(format!("http://{}/result", addr))
                .send()
                .await?
                .json::<serde_json::Value>()
                .await?;

            if result["status"] != "success" {
                println!("Result: {}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            let generated: messages::GenerationResponse =
                serde_json::from_value(result["response"].clone())?;
            let path = command.out_dir.join(&generated.filename);
            std::fs::write(&path, generated.markup.as_bytes())?;
            println!("Saved {} vectors to {}", generated.style, path.display());
            return Ok(());
        }
    };

    let result = response.json::<serde_json::Value>().await?;
    println!("Result: {}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
