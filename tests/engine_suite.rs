use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use archgraph::controller::{NEW_DIAGRAM_MESSAGE, NEW_DIAGRAM_TITLE};
use archgraph::edge::Connection;
use archgraph::format::html::{EMPTY_DIAGRAM_MESSAGE, extract_payload};
use archgraph::format::{ExportFormat, Format, import};
use archgraph::host::{
    AlertLevel, FileDialogs, FileFilter, FileOutcome, FileSystem, Host, ImageFormat, Prompt,
    Rasterizer,
};
use archgraph::logging::{Logger, MemorySink};
use archgraph::model::Position;
use archgraph::render::SvgRasterizer;
use archgraph::{Config, Diagram, DiagramController, EngineError, LayoutDirection};
use log::Level;

const PAYMENTS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/payments.json"
));
const LEGACY: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/legacy.xml"
));

#[derive(Default)]
struct MemoryFs {
    files: RefCell<HashMap<PathBuf, Vec<u8>>>,
    fail_writes: bool,
}

impl MemoryFs {
    fn with_file(path: &str, content: &str) -> Self {
        let fs = Self::default();
        fs.files
            .borrow_mut()
            .insert(PathBuf::from(path), content.as_bytes().to_vec());
        fs
    }

    fn text(&self, path: &str) -> Option<String> {
        self.files
            .borrow()
            .get(Path::new(path))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl FileSystem for MemoryFs {
    fn read_text(&self, path: &Path) -> archgraph::Result<String> {
        self.files
            .borrow()
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .ok_or_else(|| EngineError::Io(format!("{}: not found", path.display())))
    }

    fn write_text(&self, path: &Path, content: &str) -> archgraph::Result<()> {
        self.write_bytes(path, content.as_bytes())
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> archgraph::Result<()> {
        if self.fail_writes {
            return Err(EngineError::Io(format!("{}: disk full", path.display())));
        }
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedDialogs {
    opens: VecDeque<Option<PathBuf>>,
    saves: VecDeque<Option<PathBuf>>,
    save_requests: Vec<(String, Vec<FileFilter>)>,
}

impl FileDialogs for ScriptedDialogs {
    fn pick_open(&mut self, _filters: &[FileFilter]) -> Option<PathBuf> {
        self.opens.pop_front().flatten()
    }

    fn pick_save(&mut self, default_name: &str, filters: &[FileFilter]) -> Option<PathBuf> {
        self.save_requests
            .push((default_name.to_string(), filters.to_vec()));
        self.saves.pop_front().flatten()
    }
}

#[derive(Default)]
struct ScriptedPrompt {
    answer: bool,
    confirms: Vec<(String, String)>,
    alerts: Vec<(String, String, AlertLevel)>,
}

impl Prompt for ScriptedPrompt {
    fn confirm(&mut self, title: &str, message: &str) -> bool {
        self.confirms.push((title.to_string(), message.to_string()));
        self.answer
    }

    fn alert(&mut self, title: &str, message: &str, level: AlertLevel) {
        self.alerts
            .push((title.to_string(), message.to_string(), level));
    }
}

struct BrokenRasterizer;

impl Rasterizer for BrokenRasterizer {
    fn rasterize(&self, _diagram: &Diagram, format: ImageFormat) -> archgraph::Result<Vec<u8>> {
        Err(EngineError::Export(format!("{} capture failed", format.as_str())))
    }
}

struct Shell {
    fs: MemoryFs,
    dialogs: ScriptedDialogs,
    prompt: ScriptedPrompt,
    rasterizer: Box<dyn Rasterizer>,
}

impl Shell {
    fn new(fs: MemoryFs) -> Self {
        Self {
            fs,
            dialogs: ScriptedDialogs::default(),
            prompt: ScriptedPrompt::default(),
            rasterizer: Box::new(SvgRasterizer::default()),
        }
    }

    fn host(&mut self) -> Host<'_> {
        Host {
            fs: &self.fs,
            dialogs: &mut self.dialogs,
            prompt: &mut self.prompt,
            rasterizer: self.rasterizer.as_ref(),
        }
    }
}

fn quiet(diagram: Diagram) -> DiagramController {
    DiagramController::from_diagram(diagram, Config::default()).with_logger(Logger::silent())
}

#[test]
fn open_prunes_broken_edges_and_names_the_session() {
    let sink = MemorySink::new();
    let mut shell = Shell::new(MemoryFs::with_file("/work/payments.json", PAYMENTS));
    shell
        .dialogs
        .opens
        .push_back(Some(PathBuf::from("/work/payments.json")));
    let mut ctl = DiagramController::new(Config::default()).with_logger(Logger::with_sink(sink.clone()));

    let outcome = ctl.open(&mut shell.host()).unwrap();

    assert_eq!(outcome, FileOutcome::Opened(PathBuf::from("/work/payments.json")));
    assert_eq!(ctl.name(), "Payments Platform");
    assert_eq!(ctl.current_path(), Some(Path::new("/work/payments.json")));
    assert_eq!(ctl.diagram().nodes.len(), 4);
    assert_eq!(ctl.diagram().edges.len(), 3);
    assert!(ctl.diagram().edge("e4-2-stale").is_none());
    assert_eq!(
        ctl.diagram().node("2").unwrap().data.attributes[0].id,
        "attr-2-0"
    );
    assert!(!ctl.can_undo());
    assert!(sink.contains(Level::Warn, "removed 1 broken edges"));
    assert!(sink.contains(Level::Info, "opened /work/payments.json"));
}

#[test]
fn cancelled_open_changes_nothing() {
    let mut shell = Shell::new(MemoryFs::default());
    shell.dialogs.opens.push_back(None);
    let mut ctl = quiet(Diagram::sample());

    let outcome = ctl.open(&mut shell.host()).unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(ctl.diagram(), &Diagram::sample());
    assert!(shell.prompt.alerts.is_empty());
}

#[test]
fn malformed_file_fails_closed() {
    let mut shell = Shell::new(MemoryFs::with_file("/work/bad.json", "{\"nodes\": [}"));
    shell
        .dialogs
        .opens
        .push_back(Some(PathBuf::from("/work/bad.json")));
    let mut ctl = quiet(Diagram::sample());
    ctl.add_node(Position::new(900.0, 900.0));
    let before = ctl.diagram().clone();

    let err = ctl.open(&mut shell.host()).unwrap_err();

    assert!(matches!(err, EngineError::Parse { format: "JSON", .. }));
    assert_eq!(ctl.diagram(), &before);
    assert!(ctl.can_undo());
    assert_eq!(ctl.current_path(), None);
    assert_eq!(shell.prompt.alerts.len(), 1);
    assert_eq!(shell.prompt.alerts[0].0, "Open Failed");
    assert_eq!(shell.prompt.alerts[0].2, AlertLevel::Error);
}

#[test]
fn first_save_asks_for_a_path_then_reuses_it() {
    let mut shell = Shell::new(MemoryFs::default());
    shell
        .dialogs
        .saves
        .push_back(Some(PathBuf::from("/work/out.json")));
    let mut ctl = quiet(Diagram::sample());
    ctl.set_name("Demo");

    let first = ctl.save(&mut shell.host()).unwrap();
    ctl.add_node(Position::new(0.0, 600.0));
    let second = ctl.save(&mut shell.host()).unwrap();

    assert_eq!(first, FileOutcome::Saved(PathBuf::from("/work/out.json")));
    assert_eq!(second, first);
    assert_eq!(shell.dialogs.save_requests.len(), 1);
    let (default_name, filters) = &shell.dialogs.save_requests[0];
    assert!(default_name.starts_with("diagram-") && default_name.ends_with(".json"));
    assert_eq!(filters[0].extensions, vec!["json".to_string()]);

    let saved = import(&shell.fs.text("/work/out.json").unwrap(), Format::Auto).unwrap();
    assert_eq!(&saved.diagram, ctl.diagram());
    assert_eq!(saved.metadata.name, "Demo");
    assert!(saved.metadata.created.is_some());
}

#[test]
fn failed_write_alerts_and_keeps_session() {
    let mut shell = Shell::new(MemoryFs {
        fail_writes: true,
        ..MemoryFs::default()
    });
    shell
        .dialogs
        .saves
        .push_back(Some(PathBuf::from("/work/out.json")));
    let mut ctl = quiet(Diagram::sample());

    let err = ctl.save_as(&mut shell.host()).unwrap_err();

    assert!(matches!(err, EngineError::Io(message) if message.contains("disk full")));
    assert_eq!(ctl.current_path(), None);
    assert_eq!(shell.prompt.alerts[0].0, "Save Failed");
}

#[test]
fn legacy_xml_opens_and_exports_back_to_xml() {
    let mut shell = Shell::new(MemoryFs::with_file("/work/legacy.xml", LEGACY));
    shell
        .dialogs
        .opens
        .push_back(Some(PathBuf::from("/work/legacy.xml")));
    shell
        .dialogs
        .saves
        .push_back(Some(PathBuf::from("/work/copy.xml")));
    let mut ctl = quiet(Diagram::new());

    ctl.open(&mut shell.host()).unwrap();
    assert_eq!(ctl.name(), "Legacy & Co");
    assert_eq!(ctl.diagram().edges.len(), 1);
    let mobile = ctl.diagram().node("1").unwrap();
    assert_eq!(mobile.data.attributes[0].id, "attr-1-0");
    assert_eq!(mobile.data.attributes[0].value, "iOS <17");

    let outcome = ctl.export(&mut shell.host(), ExportFormat::Xml).unwrap();
    assert_eq!(outcome, FileOutcome::Exported(PathBuf::from("/work/copy.xml")));
    assert!(shell.dialogs.save_requests[0].0.ends_with(".xml"));
    // Exporting does not move the session to the exported file.
    assert_eq!(ctl.current_path(), Some(Path::new("/work/legacy.xml")));

    let copy = import(&shell.fs.text("/work/copy.xml").unwrap(), Format::Auto).unwrap();
    assert_eq!(&copy.diagram, ctl.diagram());
    assert_eq!(copy.metadata.name, "Legacy & Co");
}

#[test]
fn html_export_refuses_empty_diagram() {
    let mut shell = Shell::new(MemoryFs::default());
    let mut ctl = quiet(Diagram::new());

    let err = ctl.export(&mut shell.host(), ExportFormat::Html).unwrap_err();

    assert_eq!(err, EngineError::Export(EMPTY_DIAGRAM_MESSAGE.to_string()));
    assert!(shell.dialogs.save_requests.is_empty());
    assert_eq!(
        shell.prompt.alerts,
        vec![(
            "Export Failed".to_string(),
            EMPTY_DIAGRAM_MESSAGE.to_string(),
            AlertLevel::Error
        )]
    );
}

#[test]
fn html_export_embeds_the_diagram() {
    let mut shell = Shell::new(MemoryFs::default());
    shell
        .dialogs
        .saves
        .push_back(Some(PathBuf::from("/work/share.html")));
    let mut ctl = quiet(Diagram::sample());
    ctl.set_name("Payments API (v2)");

    ctl.export(&mut shell.host(), ExportFormat::Html).unwrap();

    let (default_name, _) = &shell.dialogs.save_requests[0];
    assert!(default_name.starts_with("payments-api--v2--"));
    assert!(default_name.ends_with(".html"));
    let page = shell.fs.text("/work/share.html").unwrap();
    assert!(page.contains("<title>Payments API (v2) - Diagram Viewer</title>"));
    assert_eq!(&extract_payload(&page).unwrap(), ctl.diagram());
}

#[test]
fn image_export_goes_through_the_rasterizer() {
    let mut shell = Shell::new(MemoryFs::default());
    shell
        .dialogs
        .saves
        .push_back(Some(PathBuf::from("/work/diagram.svg")));
    let mut ctl = quiet(Diagram::sample());

    ctl.export(&mut shell.host(), ExportFormat::Svg).unwrap();

    let svg = shell.fs.text("/work/diagram.svg").unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("API Gateway"));
    assert!(shell.dialogs.save_requests[0].0.ends_with(".svg"));
}

#[test]
fn failed_rasterization_never_touches_the_diagram() {
    let mut shell = Shell::new(MemoryFs::default());
    shell.rasterizer = Box::new(BrokenRasterizer);
    let mut ctl = quiet(Diagram::sample());
    let revision = ctl.revision();

    let err = ctl.export(&mut shell.host(), ExportFormat::Png).unwrap_err();

    assert_eq!(err, EngineError::Export("png capture failed".to_string()));
    assert_eq!(ctl.diagram(), &Diagram::sample());
    assert_eq!(ctl.revision(), revision);
    assert!(shell.dialogs.save_requests.is_empty());
    assert!(shell.fs.files.borrow().is_empty());
    assert_eq!(shell.prompt.alerts[0].0, "Export Failed");
}

#[test]
fn cancelled_export_writes_nothing() {
    let mut shell = Shell::new(MemoryFs::default());
    shell.dialogs.saves.push_back(None);
    let mut ctl = quiet(Diagram::sample());

    let outcome = ctl.export(&mut shell.host(), ExportFormat::Json).unwrap();

    assert!(outcome.is_cancelled());
    assert!(shell.fs.files.borrow().is_empty());
}

#[test]
fn new_diagram_confirms_only_when_there_is_something_to_lose() {
    let mut shell = Shell::new(MemoryFs::default());
    let mut ctl = quiet(Diagram::sample());
    ctl.set_name("Keep me");

    assert!(!ctl.new_diagram(&mut shell.prompt));
    assert_eq!(ctl.diagram(), &Diagram::sample());
    assert_eq!(
        shell.prompt.confirms,
        vec![(NEW_DIAGRAM_TITLE.to_string(), NEW_DIAGRAM_MESSAGE.to_string())]
    );

    shell.prompt.answer = true;
    assert!(ctl.new_diagram(&mut shell.prompt));
    assert!(ctl.diagram().is_empty());
    assert_eq!(ctl.name(), "Untitled Diagram");
    assert!(!ctl.can_undo());

    assert!(ctl.new_diagram(&mut shell.prompt));
    assert_eq!(shell.prompt.confirms.len(), 2);
}

#[test]
fn editing_session_undoes_and_redoes_every_step() {
    fn clock() -> i64 {
        42
    }
    let mut ctl = DiagramController::new(Config::default())
        .with_logger(Logger::silent())
        .with_clock(clock);
    let mut states = vec![ctl.diagram().clone()];

    states.push(ctl.add_node(Position::new(0.0, 0.0)).clone());
    states.push(ctl.add_node(Position::new(600.0, 0.0)).clone());
    states.push(ctl.add_node(Position::new(1200.0, 0.0)).clone());
    states.push(
        ctl.connect(&Connection::new("1", "right-source", "2", "left-target"))
            .unwrap()
            .clone(),
    );
    states.push(
        ctl.connect(&Connection::new("2", "bottom-source", "3", "top-target"))
            .unwrap()
            .clone(),
    );
    states.push(ctl.drag_node("3", Position::new(610.0, 10.0)).unwrap().clone());
    states.push(ctl.apply_layout(LayoutDirection::LeftRight).clone());
    states.push(ctl.delete_node("2").unwrap().clone());

    let last = states.len() - 1;
    assert!(states[last].edges.is_empty());
    for expected in states[..last].iter().rev() {
        assert_eq!(ctl.undo().unwrap(), expected);
    }
    assert!(ctl.undo().is_none());
    for expected in &states[1..] {
        assert_eq!(ctl.redo().unwrap(), expected);
    }
    assert!(ctl.redo().is_none());
}

#[test]
fn layout_started_before_an_edit_is_discarded() {
    let mut ctl = quiet(import(PAYMENTS, Format::Json).unwrap().diagram);
    let job = ctl.begin_layout(LayoutDirection::TopBottom);
    let worker = std::thread::spawn(move || job.run());
    ctl.move_node("1", Position::new(-500.0, -500.0)).unwrap();
    let moved = ctl.diagram().clone();

    assert!(ctl.finish_layout(worker.join().unwrap()).is_none());
    assert_eq!(ctl.diagram(), &moved);

    let fresh = ctl.begin_layout(LayoutDirection::TopBottom).run();
    let laid_out = ctl.finish_layout(fresh).unwrap();
    let min_x = laid_out
        .nodes
        .iter()
        .map(|node| node.position.x)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(min_x, 50.0);
}
