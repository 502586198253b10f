use std::process::ExitCode;

mod cli;
mod coalescer;
mod config;
mod debounce;
mod directory;
mod proxy;
mod render;
mod stream;
mod sync;
mod watch;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    // Initialize the logger
    env_logger::init();

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let template = cli::get_cli_args().template.as_deref();
    let renderer = match render::Renderer::from_path(template) {
        Ok(renderer) => renderer,
        Err(err) => {
            log::error!("Unable to read the config template: {err}");
            return ExitCode::FAILURE;
        }
    };

    // A lost stream connection lands here; restart policy belongs to the
    // process supervisor, not to this loop.
    if let Err(err) = sync::run(&config, renderer).await {
        log::error!("{err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
