//! JSON-lines request service
//!
//! Dispatches [`Request`]s to the backend registry and serves them over stdio,
//! one request and one response per line.

pub mod protocol;


pub use protocol::{CollectionList, Request, Response, TableList};

use crate::ScopeError;
use crate::database::models::VectorEndpoint;
use crate::database::registry::BackendRegistry;
use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

pub struct Service {
    registry: Arc<BackendRegistry>,
}

impl Service {
    #[inline]
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    #[inline]
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Handle one request, mapping failures to status codes
    #[inline]
    pub async fn handle(&self, request: Request) -> Response {
        let op = request.op();
        debug!("Handling {} request", op);

        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                error!("{} request failed: {}", op, e);
                Response::from(&e)
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response, ScopeError> {
        let response = match request {
            Request::Connect { host, port, path } => {
                let endpoint = match path {
                    Some(path) => VectorEndpoint::local(path),
                    None => {
                        let defaults = &self.registry.config().vector;
                        VectorEndpoint::remote(
                            host.as_deref().unwrap_or(&defaults.host),
                            port.unwrap_or(u32::from(defaults.port)),
                        )?
                    }
                };
                Response::ok(&self.registry.connect_vector(endpoint).await?)
            }
            Request::Disconnect => {
                let message = if self.registry.disconnect_vector().await {
                    "Disconnected from vector store"
                } else {
                    "No active vector store connection"
                };
                Response::ok(&json!({ "status": "success", "message": message }))
            }
            Request::ListCollections => {
                let collections = self.registry.vector().await?.list_collections().await?;
                Response::ok(&CollectionList {
                    total_count: collections.len(),
                    collections,
                })
            }
            Request::DescribeCollection { name } => {
                Response::ok(&self.registry.vector().await?.describe_collection(&name).await?)
            }
            Request::ScanCollection { name, limit } => Response::ok(
                &self
                    .registry
                    .vector()
                    .await?
                    .scan_collection(&name, limit)
                    .await?,
            ),
            Request::Search {
                name,
                vectors,
                limit,
                search_params,
            } => Response::ok(
                &self
                    .registry
                    .vector()
                    .await?
                    .search(&name, &vectors, limit, search_params)
                    .await?,
            ),
            Request::UploadDatabase { path, file_name } => {
                let file_name = match file_name {
                    Some(name) => name,
                    None => path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                };
                Response::ok(&self.registry.upload_database(&path, &file_name).await?)
            }
            Request::ListTables => {
                let tables = self.registry.analytical().await?.list_tables().await?;
                Response::ok(&TableList {
                    total_count: tables.len(),
                    tables,
                })
            }
            Request::DescribeTable { name } => {
                Response::ok(&self.registry.analytical().await?.describe_table(&name).await?)
            }
            Request::ScanTable { name, limit } => Response::ok(
                &self
                    .registry
                    .analytical()
                    .await?
                    .scan_table(&name, limit)
                    .await?,
            ),
            Request::Execute { query } => {
                Response::ok(&self.registry.analytical().await?.execute(&query).await?)
            }
            Request::Health => Response::ok(&self.registry.health().await),
        };

        Ok(response)
    }

    /// Parse and handle one input line
    #[inline]
    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                Response::bad_request(&format!("Invalid request: {}", e))
            }
        }
    }

    /// Serve requests from `reader` until EOF, writing responses to `writer`
    ///
    /// The registry is shut down once the input is exhausted.
    #[inline]
    pub async fn serve<R, W>(&self, reader: R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = reader;
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, shutting down");
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    let response = self.handle_line(line).await;
                    Self::send_response(writer, &response).await?;
                }
                Err(e) => {
                    error!("Error reading input: {}", e);
                    break;
                }
            }
        }

        self.registry.shutdown().await?;
        info!("Service stopped");
        Ok(())
    }

    /// Serve over stdin/stdout
    #[inline]
    pub async fn serve_stdio(&self) -> Result<()> {
        info!("Starting service on stdio");

        let reader = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        self.serve(reader, &mut stdout).await
    }

    async fn send_response<W>(writer: &mut W, response: &Response) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let json = serde_json::to_string(response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}
