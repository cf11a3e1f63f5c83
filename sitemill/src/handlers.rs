use std::path::PathBuf;

use actix_files::Files;
use actix_web::web;

/// Serve the built site from `root`, with `index.html` as directory index.
pub fn config(conf: &mut web::ServiceConfig, root: PathBuf) {
    conf.service(
        Files::new("/", root)
            .index_file("index.html")
            .redirect_to_slash_directory()
            .prefer_utf8(true)
            .use_last_modified(true),
    );
}
