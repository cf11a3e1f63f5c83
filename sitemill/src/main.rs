use clap::Parser;
use env_logger::Env;
use sitemill::cli::Cli;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    sitemill::run(Cli::parse()).await
}
