use clap::Parser;
use runlab_cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();
    if let Err(err) = runlab_cli::run(cli, &mut stdout) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
