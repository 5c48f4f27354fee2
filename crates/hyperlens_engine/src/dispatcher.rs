//! Request Dispatcher: validates caller input, builds one engine request per
//! operation and decodes the answer into a typed payload.

use hyperlens_protocol::defaults::SAMPLE_ROW_LIMIT;
use hyperlens_protocol::{
    has_hyper_extension, DiscoverResult, EnginePayload, EngineRequest, ExportOptions,
    ExportResult, InspectResult, Operation,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapter::Engine;
use crate::cancel::CancellationToken;
use crate::error::{DispatchError, EngineError};
use crate::validate;

/// Stateless front door to the engine. Cheap to clone; share one per process.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<dyn Engine>,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    pub fn from_engine<E: Engine + 'static>(engine: E) -> Self {
        Self::new(Arc::new(engine))
    }

    /// List the `.hyper` files under `directory`.
    pub async fn discover(
        &self,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Result<DiscoverResult, DispatchError> {
        validate::readable_directory(directory)?;

        let payload = self.call(EngineRequest::discover(directory), cancel).await?;
        let mut result = match payload {
            EnginePayload::Discover(result) => result,
            other => return Err(mismatch(Operation::Discover, &other)),
        };

        let before = result.files.len();
        result.files.retain(|file| {
            has_hyper_extension(&file.name) && file.absolute_path.is_file()
        });
        if result.files.len() != before {
            debug!(
                "Dropped {} discover entries that were not reachable .hyper files",
                before - result.files.len()
            );
        }
        result.files_found = result.files.len();
        if result.directory.is_empty() {
            result.directory = directory.display().to_string();
        }

        info!(
            "Discovered {} .hyper file(s) in {}",
            result.files_found,
            directory.display()
        );
        Ok(result)
    }

    /// Read schemas, tables, row counts and a few sample rows from `file`.
    pub async fn inspect(
        &self,
        file: &Path,
        cancel: &CancellationToken,
    ) -> Result<InspectResult, DispatchError> {
        validate::hyper_file(file)?;

        let payload = self.call(EngineRequest::inspect(file), cancel).await?;
        let mut result = match payload {
            EnginePayload::Inspect(result) => result,
            other => return Err(mismatch(Operation::Inspect, &other)),
        };

        let sample_limit = SAMPLE_ROW_LIMIT as usize;
        for table in &mut result.tables {
            if table.sample_data.len() > sample_limit {
                table.sample_data.truncate(sample_limit);
            }
        }
        result.total_tables = result.tables.len();

        info!(
            "Inspected {}: {} table(s), {} row(s)",
            result.file_name, result.total_tables, result.total_rows
        );
        Ok(result)
    }

    /// Extract row data from `file`, honoring the sample/limit options.
    pub async fn export(
        &self,
        file: &Path,
        options: &ExportOptions,
        cancel: &CancellationToken,
    ) -> Result<ExportResult, DispatchError> {
        if options.max_rows == Some(0) && !options.sample_only {
            return Err(DispatchError::invalid(
                "maxRows must be a positive integer, got 0",
            ));
        }
        validate::hyper_file(file)?;

        let payload = self
            .call(EngineRequest::export(file, options), cancel)
            .await?;
        let mut result = match payload {
            EnginePayload::Export(result) => result,
            other => return Err(mismatch(Operation::Export, &other)),
        };

        let limit = options.row_limit();
        let truncated = result.enforce_row_limit(limit);
        if truncated > 0 {
            warn!(
                "Engine returned more than {:?} rows for {} table(s); truncated",
                limit, truncated
            );
        }
        result.export_type = options.export_type();
        result.max_rows_per_table = limit;

        info!(
            "Exported {} row(s) from {} table(s) of {}",
            result.total_rows_exported, result.total_tables, result.file_name
        );
        Ok(result)
    }

    async fn call(
        &self,
        request: EngineRequest,
        cancel: &CancellationToken,
    ) -> Result<EnginePayload, DispatchError> {
        let operation = request.operation();
        let wrap = |source: EngineError| DispatchError::Engine { operation, source };

        debug!("Dispatching {} {}", operation, request.target().display());
        let response = self
            .engine
            .invoke(&request.to_argv(), cancel)
            .await
            .map_err(wrap)?;

        if !response.success {
            let message = response
                .error
                .unwrap_or_else(|| format!("engine reported {} as unsuccessful", operation));
            return Err(wrap(EngineError::Rejected { message }));
        }

        EnginePayload::decode(operation, &response.payload).map_err(|err| {
            wrap(EngineError::MalformedResponse {
                reason: format!("unexpected {} payload: {}", operation, err),
                raw: response.payload.to_string(),
            })
        })
    }
}

fn mismatch(expected: Operation, payload: &EnginePayload) -> DispatchError {
    DispatchError::Engine {
        operation: expected,
        source: EngineError::MalformedResponse {
            reason: format!("expected {} payload, got {}", expected, payload.operation()),
            raw: serde_json::to_string(payload).unwrap_or_default(),
        },
    }
}
