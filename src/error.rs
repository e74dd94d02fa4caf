//! Command-line Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the image cache")]
    Cache,
    #[display("could not set up the HTTP transport")]
    Transport,
    #[display("could not list the disk cache")]
    List,
    #[display("the {_0} cache policy has no disk cache")]
    NoDiskCache(#[error(not(source))] imgload_fetch::CachePolicy),
}
