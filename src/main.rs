use class_timetable::config::Config;
use class_timetable::server;
use log::error;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = server::run_server(config).await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}
