use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = cover_api::Args::parse();

	cover_api::run(args).await
}
