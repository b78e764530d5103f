//! Client entry point and its configuration.

use crate::db::Database;
use crate::error::{MongoError, Result};
use crate::transport::Transport;
use std::sync::Arc;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Application name, recorded on log spans.
    pub app_name: Option<String>,
    /// Kill a cursor left open by a failed drain.
    pub kill_cursors_on_error: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            app_name: None,
            kill_cursors_on_error: true,
        }
    }
}

impl ClientOptions {
    /// Create a builder.
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// Parse options from a connection string.
    ///
    /// Unrecognized parameters belong to the transport and are ignored here.
    pub fn parse(uri: &str) -> Result<Self> {
        let mut options = ClientOptions::default();

        let Some((_, query)) = uri.split_once('?') else {
            return Ok(options);
        };

        for param in query.split('&') {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            match key {
                "appName" => {
                    options.app_name = Some(value.to_string());
                }
                "killCursorsOnError" => {
                    options.kill_cursors_on_error = match value {
                        "true" => true,
                        "false" => false,
                        other => {
                            return Err(MongoError::invalid_argument(format!(
                                "killCursorsOnError must be true or false, got {:?}",
                                other
                            )))
                        }
                    };
                }
                _ => {}
            }
        }

        Ok(options)
    }
}

/// Builder for ClientOptions.
#[derive(Debug, Clone, Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.options.app_name = Some(name.into());
        self
    }

    /// Enable or disable killing cursors after a failed drain.
    pub fn kill_cursors_on_error(mut self, enabled: bool) -> Self {
        self.options.kill_cursors_on_error = enabled;
        self
    }

    /// Build the options.
    pub fn build(self) -> ClientOptions {
        self.options
    }
}

/// A client running aggregations over a [`Transport`].
///
/// # Example
///
/// ```ignore
/// use mongo_aggregate::Client;
///
/// let client = Client::with_transport("mongodb://localhost/mydb?appName=reports", transport)?;
/// let db = client.default_database().expect("URI names a database");
/// let docs = db.collection("mycol").aggregate(pipeline).await?;
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    uri: String,
    options: ClientOptions,
}

impl Client {
    /// Create a client whose options are parsed from `uri`.
    pub fn with_transport(uri: &str, transport: Arc<dyn Transport>) -> Result<Self> {
        let options = ClientOptions::parse(uri)?;
        Ok(Self::with_options(uri, transport, options))
    }

    /// Create a client with explicit options.
    pub fn with_options(uri: &str, transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        Self {
            transport,
            uri: uri.to_string(),
            options,
        }
    }

    /// Get a database handle.
    pub fn database(&self, name: &str) -> Database {
        Database::new(name.to_string(), self.transport.clone(), self.options.clone())
    }

    /// Get the default database from the connection URI.
    ///
    /// Returns `None` if no default database is specified in the URI.
    pub fn default_database(&self) -> Option<Database> {
        default_database_name(&self.uri).map(|name| self.database(name))
    }

    /// Get the connection URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get the client options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("uri", &self.uri)
            .field("options", &self.options)
            .finish()
    }
}

// mongodb://[user:pass@]host[:port][,host...]/dbname[?options]
fn default_database_name(uri: &str) -> Option<&str> {
    let without_scheme = uri
        .strip_prefix("mongodb://")
        .or_else(|| uri.strip_prefix("mongodb+srv://"))?;
    let (_, path) = without_scheme.split_once('/')?;
    let db_name = path.split('?').next()?;
    if db_name.is_empty() {
        None
    } else {
        Some(db_name)
    }
}
