mod config;
mod documents;
mod query;
mod serve;
mod status;
mod upload;

pub use config::ConfigCommand;
pub use documents::DocumentsCommand;
pub use query::QueryArgs;
pub use serve::ServeArgs;
pub use upload::UploadArgs;

pub use config::handle_config;
pub use documents::handle_documents;
pub use query::handle_query;
pub use serve::handle_serve;
pub use status::handle_status;
pub use upload::handle_upload;
