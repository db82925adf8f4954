use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = stow_api::Args::parse();
	stow_api::run(args).await
}
