use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = blastflow_worker::Args::parse();

	blastflow_worker::run(args).await
}
