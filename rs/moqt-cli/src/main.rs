mod config;
mod publish;
mod subscribe;

use config::*;

use clap::{Parser, Subcommand};
use url::Url;

#[derive(Parser, Clone)]
#[command(name = "moqt", version, about = "Publish or subscribe to moqt tracks")]
pub struct Cli {
	#[command(flatten)]
	log: moqt_native::Log,

	/// The QUIC client configuration.
	#[command(flatten)]
	client: moqt_native::ClientConfig,

	/// The WebTransport URL of the moqt endpoint, ex. https://localhost:4443/moq
	#[arg(long, env = "MOQT_URL")]
	url: Url,

	#[command(flatten)]
	tracks: TrackArgs,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
	/// Send each line of stdin as an object on a raw track.
	Publish {
		/// The label of the track to send on, defaulting to the first raw track.
		#[arg(long)]
		label: Option<String>,
	},
	/// Print received text and play out received media.
	Subscribe,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	cli.log.init();

	let file = cli.tracks.load()?;
	let connector = cli.client.init()?;
	let client = moqt::Client::new(connector, file.session.clone());

	tracing::info!(url = %cli.url, tracks = file.tracks.len(), "connecting");
	client.connect(cli.url).await?;

	let res = match cli.command {
		Command::Publish { label } => publish::run(&client, file, label, tokio::io::stdin()).await,
		Command::Subscribe => subscribe::run(&client, file).await,
	};

	client.disconnect().await?;
	res
}
