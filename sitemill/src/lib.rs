pub mod cli;
pub mod handlers;
pub mod sitemill;

use std::env;
use std::io;
use std::net::SocketAddr;

use actix_web::dev::ServerHandle;
use actix_web::{App, HttpServer, middleware::Logger};
use anyhow::{Context, Result, anyhow};
use log::info;

use crate::cli::{Cli, Command};
pub use crate::sitemill::{BuildOptions, BuildResult, SiteConfig, build, parse_frontmatter};

pub async fn run(cli: Cli) -> Result<()> {
    let cwd = match cli.cwd {
        Some(cwd) => cwd,
        None => env::current_dir().context("reading the process working directory")?,
    };
    let site = SiteConfig::load(&cwd)?;
    let options = BuildOptions::load(&cwd);

    match cli.command.unwrap_or_default() {
        Command::Build => {
            build(&site, &options).await?;
        }
        Command::Serve => {
            let server = serve(&site, &options).await?;
            tokio::signal::ctrl_c().await?;
            info!("stopping dev server");
            server.stop().await?;
        }
    }
    Ok(())
}

/// A running preview server over the build output.
pub struct DevServer {
    addr: SocketAddr,
    handle: ServerHandle,
    task: tokio::task::JoinHandle<io::Result<()>>,
}

impl DevServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.addr.port())
    }

    /// Stop listening, letting in-flight requests finish.
    pub async fn stop(self) -> Result<()> {
        self.handle.stop(true).await;
        self.wait().await
    }

    /// Wait until the server shuts down.
    pub async fn wait(self) -> Result<()> {
        self.task.await.context("dev server task failed")??;
        Ok(())
    }
}

/// Build the site, then serve the output directory on `options.port`
/// (`0` picks a free port). Must run inside the actix runtime.
pub async fn serve(site: &SiteConfig, options: &BuildOptions) -> Result<DevServer> {
    build(site, options).await?;

    let paths = crate::sitemill::ResolvedPaths::resolve(options)?;
    let root = paths.out_dir;

    let server = HttpServer::new(move || {
        let root = root.clone();
        App::new()
            .wrap(Logger::default())
            .configure(|conf| handlers::config(conf, root))
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", options.port))
    .with_context(|| format!("binding dev server to port {}", options.port))?;

    let addr = server
        .addrs()
        .first()
        .copied()
        .ok_or_else(|| anyhow!("dev server did not bind an address"))?;

    let server = server.run();
    let handle = server.handle();
    let task = actix_web::rt::spawn(server);

    let dev = DevServer { addr, handle, task };
    info!("serving at {}", dev.url());
    Ok(dev)
}
