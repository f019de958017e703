//! The composition root: owns the current diagram, its history and the file
//! session, and turns shell commands into state transitions.
//!
//! Every mutator validates first and changes nothing on failure. On success it
//! records exactly one history entry and hands back the new collections.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::collision::resolve_with;
use crate::config::{Config, LayoutConfig, NodeMetrics};
use crate::edge::{
    self, Connection, EdgeUpdate, ReconnectState, apply_reconnect, apply_update,
    create_edge_at, prune_broken_edges,
};
use crate::error::{EngineError, Result};
use crate::format::html::{html_file_name, to_html};
use crate::format::{
    ExportFormat, Format, backfill_attribute_ids, default_file_name, import, json, today, xml,
};
use crate::history::{History, Snapshot};
use crate::host::{AlertLevel, FileFilter, FileOutcome, Host, Prompt};
use crate::layout::{LayoutDirection, layout_with};
use crate::logging::Logger;
use crate::model::{Diagram, EdgeEndpoint, HandlePosition, Metadata, Node, NodeData, Position};

pub const NEW_DIAGRAM_TITLE: &str = "New Diagram";
pub const NEW_DIAGRAM_MESSAGE: &str = "Are you sure? Any unsaved changes will be lost.";
const EXPORT_FAILED: &str = "Export Failed";

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug)]
pub struct DiagramController {
    diagram: Diagram,
    history: History<Snapshot>,
    metadata: Metadata,
    current_path: Option<PathBuf>,
    config: Config,
    logger: Logger,
    clock: fn() -> i64,
    revision: u64,
    generation: u64,
    reconnect: ReconnectState,
}

impl DiagramController {
    pub fn new(config: Config) -> Self {
        Self::from_diagram(Diagram::new(), config)
    }

    pub fn from_diagram(diagram: Diagram, config: Config) -> Self {
        let history = History::with_initial(Snapshot::of(&diagram), config.history.max_entries);
        Self {
            diagram,
            history,
            metadata: Metadata::default(),
            current_path: None,
            config,
            logger: Logger::new(),
            clock: now_millis,
            revision: 0,
            generation: 0,
            reconnect: ReconnectState::default(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Replaces the millisecond clock used to stamp new edge ids.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.metadata.name = name.into();
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bumped by every change to the diagram, including undo and loads.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn history(&self) -> &History<Snapshot> {
        &self.history
    }

    pub fn reconnect_state(&self) -> &ReconnectState {
        &self.reconnect
    }

    fn commit(&mut self, action: fmt::Arguments<'_>) -> &Diagram {
        self.revision += 1;
        self.history.push(Snapshot::of(&self.diagram));
        self.logger.debug(format_args!(
            "{action} ({} nodes, {} edges, history {})",
            self.diagram.nodes.len(),
            self.diagram.edges.len(),
            self.history.len()
        ));
        &self.diagram
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.diagram
            .node_mut(id)
            .ok_or_else(|| EngineError::UnknownNode(id.to_string()))
    }

    fn edge_index(&self, id: &str) -> Result<usize> {
        self.diagram
            .edges
            .iter()
            .position(|edge| edge.id == id)
            .ok_or_else(|| EngineError::UnknownEdge(id.to_string()))
    }

    // Nodes

    /// Adds a default platform at `position` with the next numeric id.
    pub fn add_node(&mut self, position: Position) -> &Diagram {
        let id = self.diagram.next_node_id();
        self.diagram.nodes.push(Node::platform(id.clone(), position));
        self.commit(format_args!("added node {id}"))
    }

    /// Replaces the node's data. Attributes without an id get a stable one.
    pub fn update_node(&mut self, id: &str, data: NodeData) -> Result<&Diagram> {
        self.node_mut(id)?.data = data;
        backfill_attribute_ids(&mut self.diagram);
        Ok(self.commit(format_args!("updated node {id}")))
    }

    /// Moves a node verbatim, with no overlap check.
    pub fn move_node(&mut self, id: &str, position: Position) -> Result<&Diagram> {
        self.node_mut(id)?.position = position;
        Ok(self.commit(format_args!("moved node {id}")))
    }

    /// Drops a dragged node at `position`, nudged clear of its neighbours.
    pub fn drag_node(&mut self, id: &str, position: Position) -> Result<&Diagram> {
        let mut dragged = self
            .diagram
            .node(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownNode(id.to_string()))?;
        dragged.position = position;
        let resolution = resolve_with(
            &dragged,
            &self.diagram.nodes,
            &self.config.collision,
            &self.config.metrics,
        );
        if !resolution.converged {
            self.logger.warn(format_args!(
                "node {id} still overlaps after {} collision steps",
                resolution.iterations
            ));
        }
        self.node_mut(id)?.position = resolution.position;
        Ok(self.commit(format_args!("dragged node {id}")))
    }

    /// Removes the node and every edge touching it in one history entry.
    pub fn delete_node(&mut self, id: &str) -> Result<&Diagram> {
        if !self.diagram.contains_node(id) {
            return Err(EngineError::UnknownNode(id.to_string()));
        }
        self.diagram.nodes.retain(|node| node.id != id);
        let before = self.diagram.edges.len();
        self.diagram.edges.retain(|edge| !edge.touches(id));
        let removed = before - self.diagram.edges.len();
        Ok(self.commit(format_args!("deleted node {id} and {removed} edges")))
    }

    // Edges

    /// Validates the gesture and adds a unidirectional edge. Parallel edges are
    /// allowed; the id's millisecond suffix is bumped until it is unique.
    pub fn connect(&mut self, connection: &Connection) -> Result<&Diagram> {
        for id in [&connection.source, &connection.target] {
            if !self.diagram.contains_node(id) {
                return Err(EngineError::UnknownNode(id.clone()));
            }
        }
        let mut millis = (self.clock)();
        while self
            .diagram
            .edge(&edge::edge_id(&connection.source, &connection.target, millis))
            .is_some()
        {
            millis += 1;
        }
        let edge = create_edge_at(connection, millis)?;
        let id = edge.id.clone();
        self.diagram.edges.push(edge);
        Ok(self.commit(format_args!("connected {id}")))
    }

    pub fn update_edge(&mut self, id: &str, update: EdgeUpdate) -> Result<&Diagram> {
        let idx = self.edge_index(id)?;
        apply_update(&mut self.diagram.edges[idx], update);
        Ok(self.commit(format_args!("updated edge {id}")))
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<&Diagram> {
        let idx = self.edge_index(id)?;
        self.diagram.edges.remove(idx);
        Ok(self.commit(format_args!("deleted edge {id}")))
    }

    /// Swaps the edge's endpoints in place, keeping its id.
    pub fn reverse_edge(&mut self, id: &str) -> Result<&Diagram> {
        let idx = self.edge_index(id)?;
        let reversed = edge::reverse(&self.diagram.edges[idx]);
        self.diagram.edges[idx] = reversed;
        Ok(self.commit(format_args!("reversed edge {id}")))
    }

    // Reconnection

    pub fn begin_reconnect(&mut self, edge_id: &str, endpoint: EdgeEndpoint) -> Result<()> {
        let idx = self.edge_index(edge_id)?;
        self.reconnect.begin(&self.diagram.edges[idx], endpoint)?;
        self.logger.debug(format_args!(
            "reconnecting {} of edge {edge_id}",
            endpoint.as_str()
        ));
        Ok(())
    }

    pub fn choose_reconnect_handle(&mut self, position: HandlePosition) -> Result<()> {
        self.reconnect.choose_position(position)
    }

    /// Finishes the flow on `node_id`. Returns `Ok(None)` when the click is
    /// ignored because no handle position has been chosen yet.
    pub fn pick_reconnect_node(&mut self, node_id: &str) -> Result<Option<&Diagram>> {
        let Some(reconnect) = self.reconnect.pick_node(node_id) else {
            return Ok(None);
        };
        apply_reconnect(&mut self.diagram, &reconnect)?;
        Ok(Some(self.commit(format_args!(
            "reconnected {} of edge {} to {}:{}",
            reconnect.endpoint.as_str(),
            reconnect.edge_id,
            reconnect.node_id,
            reconnect.handle
        ))))
    }

    pub fn cancel_reconnect(&mut self) {
        self.reconnect.cancel();
    }

    // History

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> Option<&Diagram> {
        let snapshot = self.history.undo()?.clone();
        Some(self.replay(snapshot, "undo"))
    }

    pub fn redo(&mut self) -> Option<&Diagram> {
        let snapshot = self.history.redo()?.clone();
        Some(self.replay(snapshot, "redo"))
    }

    fn replay(&mut self, snapshot: Snapshot, action: &str) -> &Diagram {
        self.diagram = snapshot.into_diagram();
        self.history.finish_replay();
        self.revision += 1;
        self.reconnect.cancel();
        self.logger.debug(format_args!(
            "{action}: {} nodes, {} edges",
            self.diagram.nodes.len(),
            self.diagram.edges.len()
        ));
        &self.diagram
    }

    // Layout

    /// Lays the diagram out immediately.
    pub fn apply_layout(&mut self, direction: LayoutDirection) -> &Diagram {
        self.diagram.nodes = layout_with(
            &self.diagram.nodes,
            &self.diagram.edges,
            direction,
            &self.config.layout,
            &self.config.metrics,
        );
        self.commit(format_args!("auto layout {}", direction.as_token()))
    }

    /// Captures what a layout needs so it can run off the controller. A later
    /// call supersedes every job handed out before it.
    pub fn begin_layout(&mut self, direction: LayoutDirection) -> LayoutJob {
        self.generation += 1;
        LayoutJob {
            generation: self.generation,
            revision: self.revision,
            direction,
            diagram: self.diagram.clone(),
            config: self.config.layout,
            metrics: self.config.metrics,
        }
    }

    /// Applies a finished job unless a newer job was started or the diagram
    /// changed since it was captured; stale results give `None`.
    pub fn finish_layout(&mut self, outcome: LayoutOutcome) -> Option<&Diagram> {
        if outcome.generation != self.generation || outcome.revision != self.revision {
            self.logger.warn(format_args!(
                "dropping stale layout result (job {}, latest {})",
                outcome.generation, self.generation
            ));
            return None;
        }
        self.diagram.nodes = outcome.nodes;
        Some(self.commit(format_args!(
            "auto layout {}",
            outcome.direction.as_token()
        )))
    }

    // Session

    /// Clears the board and the file session. A non-empty diagram is only
    /// discarded after the user confirms. Returns false if they declined.
    pub fn new_diagram(&mut self, prompt: &mut dyn Prompt) -> bool {
        if !self.diagram.is_empty() && !prompt.confirm(NEW_DIAGRAM_TITLE, NEW_DIAGRAM_MESSAGE) {
            return false;
        }
        self.replace(Diagram::new(), Metadata::default());
        self.current_path = None;
        self.logger.info(format_args!("started a new diagram"));
        true
    }

    /// Replaces the diagram with parsed `text`. Broken edges are dropped. On
    /// failure the current diagram stays as it was.
    pub fn load(&mut self, text: &str, format: Format) -> Result<&Diagram> {
        let mut imported = import(text, format)?;
        let pruned = prune_broken_edges(&mut imported.diagram);
        if pruned > 0 {
            self.logger
                .warn(format_args!("removed {pruned} broken edges from loaded diagram"));
        }
        self.replace(imported.diagram, imported.metadata);
        Ok(&self.diagram)
    }

    fn replace(&mut self, diagram: Diagram, metadata: Metadata) {
        self.diagram = diagram;
        self.metadata = metadata;
        self.history.reset(Snapshot::of(&self.diagram));
        self.reconnect.cancel();
        self.revision += 1;
    }

    pub fn to_json(&self) -> Result<String> {
        json::to_json(&self.diagram, &self.metadata)
    }

    pub fn to_xml(&self) -> Result<String> {
        xml::to_xml(&self.diagram, &self.metadata)
    }

    pub fn open(&mut self, host: &mut Host<'_>) -> Result<FileOutcome> {
        let Some(path) = host.dialogs.pick_open(&FileFilter::diagrams()) else {
            return Ok(FileOutcome::Cancelled);
        };
        let loaded = host
            .fs
            .read_text(&path)
            .and_then(|text| self.load(&text, Format::Auto).map(|_| ()));
        if let Err(err) = loaded {
            return Err(self.report(host.prompt, "Open Failed", err));
        }
        self.logger.info(format_args!(
            "opened {} ({} nodes, {} edges)",
            path.display(),
            self.diagram.nodes.len(),
            self.diagram.edges.len()
        ));
        self.current_path = Some(path.clone());
        Ok(FileOutcome::Opened(path))
    }

    /// Writes JSON to the current file, or asks for one first.
    pub fn save(&mut self, host: &mut Host<'_>) -> Result<FileOutcome> {
        let Some(path) = self.current_path.clone() else {
            return self.save_as(host);
        };
        self.write_json(host, path)
    }

    pub fn save_as(&mut self, host: &mut Host<'_>) -> Result<FileOutcome> {
        let default_name = default_file_name("json", today());
        let filters = [FileFilter::new("JSON Files", &["json"])];
        let Some(path) = host.dialogs.pick_save(&default_name, &filters) else {
            return Ok(FileOutcome::Cancelled);
        };
        self.write_json(host, path)
    }

    fn write_json(&mut self, host: &mut Host<'_>, path: PathBuf) -> Result<FileOutcome> {
        let written = self
            .to_json()
            .and_then(|data| host.fs.write_text(&path, &data));
        if let Err(err) = written {
            return Err(self.report(host.prompt, "Save Failed", err));
        }
        self.logger.info(format_args!("saved {}", path.display()));
        self.current_path = Some(path.clone());
        Ok(FileOutcome::Saved(path))
    }

    /// Serializes or rasterizes the diagram, then asks where to put it. The
    /// diagram and the file session are never changed by an export.
    pub fn export(&mut self, host: &mut Host<'_>, format: ExportFormat) -> Result<FileOutcome> {
        let date = today();
        let prepared = match format {
            ExportFormat::Json => self
                .to_json()
                .map(|data| (default_file_name("json", date), data.into_bytes())),
            ExportFormat::Xml => self
                .to_xml()
                .map(|data| (default_file_name("xml", date), data.into_bytes())),
            ExportFormat::Html => to_html(
                &self.diagram,
                &self.metadata.name,
                date,
                &self.config.theme,
                &self.config.metrics,
            )
            .map(|page| (html_file_name(&self.metadata.name, date), page.into_bytes())),
            ExportFormat::Png | ExportFormat::Jpeg | ExportFormat::Svg | ExportFormat::Pdf => {
                match format.image() {
                    Some(image) => host
                        .rasterizer
                        .rasterize(&self.diagram, image)
                        .map(|bytes| (default_file_name(format.extension(), date), bytes)),
                    None => Err(EngineError::Export(format!(
                        "no image format for {}",
                        format.extension()
                    ))),
                }
            }
        };
        let (default_name, bytes) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return Err(self.report(host.prompt, EXPORT_FAILED, err)),
        };

        let filters = FileFilter::for_extension(format.extension());
        let Some(path) = host.dialogs.pick_save(&default_name, &filters) else {
            return Ok(FileOutcome::Cancelled);
        };
        if let Err(err) = host.fs.write_bytes(&path, &bytes) {
            return Err(self.report(host.prompt, EXPORT_FAILED, err));
        }
        self.logger.info(format_args!(
            "exported {} to {}",
            format.extension(),
            path.display()
        ));
        Ok(FileOutcome::Exported(path))
    }

    fn report(&self, prompt: &mut dyn Prompt, title: &str, err: EngineError) -> EngineError {
        self.logger.error(format_args!("{title}: {err}"));
        prompt.alert(title, &err.to_string(), AlertLevel::Error);
        err
    }
}

impl Default for DiagramController {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// A detached layout request. Owns copies of everything it reads, so it can
/// be moved to another thread.
#[derive(Debug, Clone)]
pub struct LayoutJob {
    generation: u64,
    revision: u64,
    direction: LayoutDirection,
    diagram: Diagram,
    config: LayoutConfig,
    metrics: NodeMetrics,
}

impl LayoutJob {
    pub fn direction(&self) -> LayoutDirection {
        self.direction
    }

    pub fn run(self) -> LayoutOutcome {
        let nodes = layout_with(
            &self.diagram.nodes,
            &self.diagram.edges,
            self.direction,
            &self.config,
            &self.metrics,
        );
        LayoutOutcome {
            generation: self.generation,
            revision: self.revision,
            direction: self.direction,
            nodes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayoutOutcome {
    generation: u64,
    revision: u64,
    direction: LayoutDirection,
    nodes: Vec<Node>,
}

impl LayoutOutcome {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}
