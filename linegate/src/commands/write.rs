use clap::Parser;
use linegate_types::Precision;
use tokio::{
    fs::File,
    io::{self, AsyncReadExt},
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Client(#[from] linegate_client::Error),

    #[error("error reading file: {0}")]
    Io(#[from] io::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
#[clap(visible_alias = "w")]
pub(crate) struct Config {
    /// The URL of the running linegate server
    #[clap(
        short = 'H',
        long = "host",
        env = "LINEGATE_HOST_URL",
        default_value = "http://127.0.0.1:8181",
        action
    )]
    host_url: String,

    /// The database to write to
    #[clap(short = 'd', long = "db", env = "LINEGATE_DATABASE_NAME", action)]
    database_name: String,

    /// The precision of timestamps in the write data (n, u, ms, or s)
    #[clap(long = "precision", action)]
    precision: Option<Precision>,

    /// File path to load the write data from
    ///
    /// Currently, only files containing line protocol are supported.
    #[clap(short = 'f', long = "file", action)]
    file_path: String,

    /// Gzip-compress the body before sending
    #[clap(long = "gzip", action)]
    gzip: bool,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let client = linegate_client::Client::new(config.host_url)?;

    let mut f = File::open(config.file_path).await?;
    let mut writes = Vec::new();
    f.read_to_end(&mut writes).await?;

    let mut req = client.write(config.database_name).gzip(config.gzip);
    if let Some(precision) = config.precision {
        req = req.precision(precision);
    }
    req.body(writes).send().await?;

    println!("success");

    Ok(())
}
