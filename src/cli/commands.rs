//! CLI command implementations
//!
//! Every command answers with exactly one JSON envelope on stdout. Engine
//! failures become `{"status":"error","code":...}`; only configuration and
//! I/O failures abort the process.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;

use crate::compiler::CapabilityRegistry;
use crate::composer::{ComposeRequest, EdgeComposer, EdgeComposition};
use crate::config::Config;
use crate::context::RequestContext;
use crate::dsl::{parse as parse_dsl, SliceMode};
use crate::error::{EngineError, EngineResult};
use crate::graph::{enumerate_paths, Graph, PathEnumeration};
use crate::observability::init_logging;
use crate::planning::{EdgePlan, EdgeQueryPlanner, ExplainPlan};
use crate::slices::{
    ingest as ingest_response, ConnectorResponse, FileSliceStore, IngestSummary,
    ReconciledSeries, SliceDims, SliceError, SliceErrorCode, SliceSelector,
};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response, write_text};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    init_logging();
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Parse { query } => parse(&query),
        Command::Paths {
            graph,
            from,
            to,
            config,
        } => paths(&graph, &from, &to, config.as_deref()),
        Command::Plan {
            config,
            graph,
            edge,
            connection,
            mode,
            explain,
            annotate,
        } => plan(
            &config,
            &graph,
            &edge,
            &connection,
            mode.map(SliceMode::from),
            explain,
            annotate.as_deref(),
        ),
        Command::Ingest {
            config,
            param,
            mode,
            slice,
        } => ingest(&config, &param, mode.into(), &slice),
        Command::Select {
            config,
            param,
            mode,
            slice,
        } => select(&config, &param, mode.into(), &slice),
        Command::Compose {
            config,
            graph,
            edge,
            slice,
            as_of,
            what_if,
        } => compose(&config, &graph, &edge, &slice, as_of.as_deref(), what_if.as_deref()),
    }
}

/// Parse a constraint and print its canonical form
pub fn parse(query: &str) -> CliResult<()> {
    respond(parse_dsl(query).map_err(EngineError::from).map(|c| {
        json!({
            "canonical": c.canonical(),
            "mode": c.mode(),
            "constraint": c,
        })
    }))
}

/// Enumerate simple paths between two nodes
pub fn paths(graph_path: &Path, from: &str, to: &str, config_path: Option<&Path>) -> CliResult<()> {
    let budget = match config_path {
        Some(path) => Config::load(path)?.search,
        None => Default::default(),
    };
    let text = read_file(graph_path)?;
    respond(enumerate(&text, from, to, &budget))
}

/// Plan an edge's query, optionally writing the annotated graph
pub fn plan(
    config_path: &Path,
    graph_path: &Path,
    edge_id: &str,
    connection: &str,
    mode: Option<SliceMode>,
    explain: bool,
    annotate: Option<&Path>,
) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let text = read_file(graph_path)?;
    let registry = config.capability_registry();
    let mut ctx = RequestContext::new(config.search)
        .with_metadata("command", json!("plan"))
        .with_metadata("edge", json!(edge_id));

    let result = plan_edge(&config, &registry, &mut ctx, &text, edge_id, connection, mode);

    if explain {
        let explained = match &result {
            Ok((plan, _)) => ExplainPlan::from_plan(plan),
            Err(e) => ExplainPlan::from_error(edge_id, e),
        };
        return write_text(&explained.to_string());
    }

    match result {
        Ok((plan, graph)) => {
            if let Some(out) = annotate {
                let document = serde_json::to_string_pretty(&graph.to_document())?;
                fs::write(out, document).map_err(|e| {
                    CliError::io_error(format!("Failed to write {}: {}", out.display(), e))
                })?;
            }
            write_response(serde_json::to_value(&plan)?)
        }
        Err(e) => write_error(e.code(), &e.to_string()),
    }
}

/// Store a connector response read from stdin
pub fn ingest(config_path: &Path, param_id: &str, mode: SliceMode, slice: &str) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let response: ConnectorResponse = serde_json::from_value(read_request()?)?;
    respond(ingest_into_store(&config, &response, param_id, mode, slice))
}

/// Select the reconciled series for a parameter
pub fn select(config_path: &Path, param_id: &str, mode: SliceMode, slice: &str) -> CliResult<()> {
    let config = Config::load(config_path)?;
    respond(select_series(&config, param_id, mode, slice))
}

/// Compose evidence and forecast for one edge
pub fn compose(
    config_path: &Path,
    graph_path: &Path,
    edge_id: &str,
    slice: &str,
    as_of: Option<&str>,
    what_if: Option<&str>,
) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let text = read_file(graph_path)?;
    let as_of = match as_of {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| CliError::invalid_input(format!("Invalid --as-of '{}': {}", s, e)))?,
        None => Utc::now().date_naive(),
    };
    respond(compose_edge(&config, &text, edge_id, slice, as_of, what_if))
}

// === Engine calls ===

fn enumerate(
    graph_text: &str,
    from: &str,
    to: &str,
    budget: &crate::budget::SearchBudget,
) -> EngineResult<PathEnumeration> {
    let graph = Graph::from_json(graph_text)?;
    Ok(enumerate_paths(&graph, from, to, budget)?)
}

fn plan_edge(
    config: &Config,
    registry: &CapabilityRegistry,
    ctx: &mut RequestContext,
    graph_text: &str,
    edge_id: &str,
    connection: &str,
    mode: Option<SliceMode>,
) -> EngineResult<(EdgePlan, Graph)> {
    let mut graph = Graph::from_json(graph_text)?;
    let plan = EdgeQueryPlanner::plan_and_annotate(
        &mut graph,
        registry,
        config.upstream_lookback_days,
        ctx,
        edge_id,
        connection,
        mode,
    )?;
    Ok((plan, graph))
}

fn ingest_into_store(
    config: &Config,
    response: &ConnectorResponse,
    param_id: &str,
    mode: SliceMode,
    slice: &str,
) -> EngineResult<IngestSummary> {
    let dims = SliceDims::parse(slice)?;
    let store = FileSliceStore::open(config.data_path())?;
    Ok(ingest_response(&store, response, param_id, &dims, mode)?)
}

fn select_series(
    config: &Config,
    param_id: &str,
    mode: SliceMode,
    slice: &str,
) -> EngineResult<ReconciledSeries> {
    let dims = SliceDims::parse(slice)?;
    let store = FileSliceStore::open(config.data_path())?;
    Ok(SliceSelector::new(&store, &config.mece).select(param_id, &dims, mode)?)
}

fn compose_edge(
    config: &Config,
    graph_text: &str,
    edge_id: &str,
    slice: &str,
    as_of: NaiveDate,
    what_if: Option<&str>,
) -> EngineResult<EdgeComposition> {
    let graph = Graph::from_json(graph_text)?;
    let edge = graph.edge(edge_id)?;
    let what_if = what_if.map(parse_dsl).transpose()?;
    let dims = SliceDims::parse(slice)?;

    // Without a parameter there is nothing to select; the nominal p stands.
    let (cohort, window) = match edge.parameter_id() {
        Some(param_id) => {
            let store = FileSliceStore::open(config.data_path())?;
            let selector = SliceSelector::new(&store, &config.mece);
            (
                optional(selector.select(param_id, &dims, SliceMode::Cohort))?,
                optional(selector.select(param_id, &dims, SliceMode::Window))?,
            )
        }
        None => (None, None),
    };
    let latency = edge.parameter_id().and_then(|p| config.latency_model(p));

    Ok(EdgeComposer::compose(&ComposeRequest {
        edge,
        cohort: cohort.as_ref(),
        window: window.as_ref(),
        latency,
        as_of,
        what_if: what_if.as_ref(),
    })?)
}

/// A missing series is an absent input, not a failure
fn optional(result: Result<ReconciledSeries, SliceError>) -> EngineResult<Option<ReconciledSeries>> {
    match result {
        Ok(series) => Ok(Some(series)),
        Err(e) if e.code() == SliceErrorCode::DqSliceNotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// === Helpers ===

fn read_file(path: &Path) -> CliResult<String> {
    fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", path.display(), e)))
}

fn respond<T: Serialize>(result: EngineResult<T>) -> CliResult<()> {
    match result {
        Ok(data) => write_response(serde_json::to_value(&data)?),
        Err(e) => write_error(e.code(), &e.to_string()),
    }
}
