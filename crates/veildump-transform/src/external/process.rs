//! External transformer processes.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use veildump_core::Row;

use crate::definition::{TransformContext, TransformerDefinition};
use crate::error::{TransformError, TransformResult};
use crate::registry::TransformerRegistry;
use crate::transformer::Transformer;

use super::protocol::{ExternalDefinition, RowReply, RowRequest, SetupColumn, SetupMessage};

/// Config entry for one external transformer executable.
#[derive(Debug, Clone)]
pub struct CustomTransformerSpec {
    /// Executable path, resolved relative to the config file.
    pub executable: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
}

fn spawn(spec: &CustomTransformerSpec) -> TransformResult<ExternalProcess> {
    let mut child = Command::new(&spec.executable)
        .args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| {
            TransformError::Protocol(format!(
                "cannot spawn {}: {e}",
                spec.executable.display()
            ))
        })?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| TransformError::Protocol("child stdin unavailable".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TransformError::Protocol("child stdout unavailable".into()))?;
    Ok(ExternalProcess {
        child,
        stdin: Some(BufWriter::new(stdin)),
        stdout: BufReader::new(stdout),
        line: String::new(),
    })
}

struct ExternalProcess {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl ExternalProcess {
    fn read_line(&mut self) -> TransformResult<&str> {
        self.line.clear();
        let n = self.stdout.read_line(&mut self.line)?;
        if n == 0 {
            return Err(TransformError::Protocol("child closed its stdout".into()));
        }
        Ok(self.line.trim_end_matches('\n'))
    }

    fn write_line(&mut self, line: &str) -> TransformResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(TransformError::Protocol("child stdin already closed".into()));
        };
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    fn read_definition(&mut self) -> TransformResult<ExternalDefinition> {
        let line = self.read_line()?;
        serde_json::from_str(line)
            .map_err(|e| TransformError::Protocol(format!("bad definition line: {e}")))
    }

    /// Sends the end-of-input marker and waits for a clean exit.
    fn shutdown(&mut self) -> TransformResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.write_all(b"\n")?;
            stdin.flush()?;
            drop(stdin);
        }
        let status = self.child.wait()?;
        if !status.success() {
            return Err(TransformError::Protocol(format!(
                "child exited with {status}"
            )));
        }
        Ok(())
    }
}

impl Drop for ExternalProcess {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "external transformer did not shut down cleanly");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

struct ExternalTransformer {
    name: String,
    process: ExternalProcess,
    bound: Vec<usize>,
    row_no: u64,
}

impl ExternalTransformer {
    fn start(
        name: &str,
        spec: &CustomTransformerSpec,
        ctx: &TransformContext,
    ) -> TransformResult<Self> {
        let mut process = spawn(spec)?;
        // The instance handshake repeats the definition line; discard it.
        let _ = process.read_definition()?;

        let mut columns = Vec::new();
        let mut bound = Vec::new();
        let mut params: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        for (param_name, value) in ctx.params.iter() {
            params.insert(param_name.clone(), value.value.clone());
            if let Some(column) = &value.column {
                bound.push(column.ordinal);
                columns.push(SetupColumn {
                    index: column.ordinal,
                    name: column.name.clone(),
                    type_name: column.type_name.clone(),
                });
            }
        }
        bound.sort_unstable();
        bound.dedup();

        let setup = SetupMessage { columns, params };
        let setup_line = serde_json::to_string(&setup)
            .map_err(|e| TransformError::Protocol(format!("cannot encode setup: {e}")))?;
        process.write_line(&setup_line)?;
        Ok(Self { name: name.to_owned(), process, bound, row_no: 0 })
    }
}

impl Transformer for ExternalTransformer {
    fn transform(&mut self, row: &mut Row) -> TransformResult<()> {
        self.row_no += 1;
        let mut cells = Vec::with_capacity(row.len());
        for index in 0..row.len() {
            let cell = row
                .raw(index)?
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
            cells.push(cell);
        }
        let request = RowRequest { row: cells, row_no: self.row_no };
        let request_line = serde_json::to_string(&request)
            .map_err(|e| TransformError::Protocol(format!("cannot encode row: {e}")))?;
        self.process.write_line(&request_line)?;

        let reply_line = self.process.read_line()?;
        let reply: RowReply = serde_json::from_str(reply_line)
            .map_err(|e| TransformError::Protocol(format!("bad reply line: {e}")))?;

        if let Some(error) = reply.error {
            return Err(TransformError::failure(&self.name, error));
        }
        let Some(new_row) = reply.row else {
            return Err(TransformError::Protocol("reply carries neither row nor error".into()));
        };
        if new_row.len() != row.len() {
            return Err(TransformError::Protocol(format!(
                "reply row has {} cells, expected {}",
                new_row.len(),
                row.len()
            )));
        }
        // Only bound columns may change; the rest of the reply is ignored so
        // the identity path stays byte-stable.
        for &index in &self.bound {
            match &new_row[index] {
                None => row.set_column(index, veildump_core::RowValue::Null)?,
                Some(text) => {
                    row.set_column(index, veildump_core::RowValue::from(text.as_str()))?;
                }
            }
        }
        if let Some(warnings) = reply.warnings {
            for warning in warnings {
                debug!(transformer = %self.name, msg = %warning.msg, "external transformer warning");
            }
        }
        Ok(())
    }
}

/// Spawns each configured executable once to collect its definition and
/// registers a definition whose factory starts a fresh process per table.
///
/// # Errors
///
/// Returns [`TransformError::Protocol`] if an executable cannot be spawned
/// or announces a malformed definition, and
/// [`TransformError::DuplicateRegistration`] if a name collides.
pub fn bootstrap_custom_transformers(
    registry: &mut TransformerRegistry,
    specs: &[CustomTransformerSpec],
) -> TransformResult<()> {
    for spec in specs {
        let mut probe = spawn(spec)?;
        let external = probe.read_definition()?;
        probe.shutdown()?;
        debug!(name = %external.name, executable = %spec.executable.display(), "registered external transformer");

        let spec = spec.clone();
        let name = external.name.clone();
        let definition = TransformerDefinition::new(
            external.name,
            external.description,
            external.parameters,
            move |ctx| {
                let transformer = ExternalTransformer::start(&name, &spec, ctx)?;
                Ok(Box::new(transformer))
            },
        );
        registry.register(definition)?;
    }
    Ok(())
}
