//! End-to-end editing against a JSON store and an HTML file surface.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use richnote::config::SessionConfig;
use richnote::gate::{LoadState, ScriptLoadGate};
use richnote::host::{CursorSelection, ImmediateLoader, RecordRef, RecordStore};
use richnote::session::{Collaborators, EditorSession, Message};
use richnote::store::JsonFileStore;
use richnote::surface::{HtmlFileMount, SurfaceWatcher};

fn write_store(path: &Path) {
    let data = json!({
        "tables": {
            "tasks": {
                "rec1": {
                    "Notes": "# Groceries\n\n[ ] milk\n[x] bread",
                    "Files": [
                        { "id": "att7", "filename": "list.png", "url": "https://files/list.png" }
                    ]
                },
                "rec2": { "Notes": "Second" },
                "rec3": {}
            }
        }
    });
    fs::write(path, serde_json::to_string_pretty(&data).unwrap()).unwrap();
}

fn open(
    store: &Path,
    html: &Path,
    gate: &Arc<ScriptLoadGate>,
) -> EditorSession<JsonFileStore> {
    let host = Collaborators {
        store: JsonFileStore::open(store).unwrap(),
        mount: Box::new(HtmlFileMount::new(html)),
        loader: Arc::new(ImmediateLoader),
    };
    EditorSession::new(
        SessionConfig::default(),
        Arc::clone(gate),
        host,
        Some(RecordRef::new("tasks", "rec1")),
    )
    .unwrap()
}

fn notes_on_disk(store: &Path, record: &str) -> Option<String> {
    JsonFileStore::open(store)
        .unwrap()
        .get_field(&RecordRef::new("tasks", record), "Notes")
        .unwrap()
}

#[test]
fn test_stored_tasks_render_as_checklist() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("notes.json");
    let html = dir.path().join("note.html");
    write_store(&store);

    let session = open(&store, &html, &Arc::new(ScriptLoadGate::new("x")));

    let rendered = fs::read_to_string(&html).unwrap();
    assert_eq!(session.load_state(), LoadState::Loaded);
    assert!(rendered.contains("<h1>Groceries</h1>"), "got: {rendered}");
    assert!(rendered.contains("type=\"checkbox\""), "got: {rendered}");
}

#[test]
fn test_edits_are_saved_after_quiet_period() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("notes.json");
    let html = dir.path().join("note.html");
    write_store(&store);
    let mut session = open(&store, &html, &Arc::new(ScriptLoadGate::new("x")));
    session.handle(Message::SurfaceInitialized, 0).unwrap();

    let edited = "<h1>Groceries</h1><p>buy <strong>eggs</strong></p>";
    fs::write(&html, edited).unwrap();
    session
        .handle(Message::ContentChanged(edited.to_string()), 1_000)
        .unwrap();

    assert!(!session.poll(1_400).unwrap());
    assert_eq!(
        notes_on_disk(&store, "rec1").as_deref(),
        Some("# Groceries\n\n[ ] milk\n[x] bread")
    );

    assert!(session.poll(1_500).unwrap());
    assert_eq!(
        notes_on_disk(&store, "rec1").as_deref(),
        Some("# Groceries\n\nbuy **eggs**")
    );
}

#[test]
fn test_untouched_round_trip_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("notes.json");
    let html = dir.path().join("note.html");
    write_store(&store);
    let mut session = open(&store, &html, &Arc::new(ScriptLoadGate::new("x")));

    session.handle(Message::SaveRequested, 0).unwrap();
    let first = notes_on_disk(&store, "rec1").unwrap();
    assert_eq!(first, "# Groceries\n\n- [ ] milk\n- [x] bread");

    // Reopening and saving again changes nothing.
    let mut again = open(&store, &html, &Arc::new(ScriptLoadGate::new("x")));
    again.handle(Message::SaveRequested, 0).unwrap();
    assert_eq!(notes_on_disk(&store, "rec1").unwrap(), first);
}

#[test]
fn test_image_insertion_lands_in_file_and_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("notes.json");
    let html = dir.path().join("note.html");
    write_store(&store);
    let mut session = open(&store, &html, &Arc::new(ScriptLoadGate::new("x")));

    session.handle(Message::ImageInsertRequested, 0).unwrap();
    session.handle(Message::ImageConfirmed(None), 10).unwrap();
    session.flush().unwrap();

    let surface = fs::read_to_string(&html).unwrap();
    assert!(
        surface.ends_with("<img src=\"https://files/list.png\" width=\"900\">"),
        "got: {surface}"
    );
    let stored = notes_on_disk(&store, "rec1").unwrap();
    assert!(stored.contains("https://files/list.png =900x*"), "got: {stored}");
}

#[test]
fn test_following_selection_saves_previous_record_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("notes.json");
    let html = dir.path().join("note.html");
    write_store(&store);
    let mut session = open(&store, &html, &Arc::new(ScriptLoadGate::new("x")));

    session
        .handle(Message::ContentChanged("<p>changed</p>".to_string()), 0)
        .unwrap();
    session
        .handle(
            Message::CursorChanged(CursorSelection::new("tasks", &["rec2"])),
            100,
        )
        .unwrap();

    assert_eq!(notes_on_disk(&store, "rec1").as_deref(), Some("changed"));
    assert!(fs::read_to_string(&html).unwrap().contains("Second"));
}

#[test]
fn test_remounted_placeholder_is_not_saved_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("notes.json");
    let html = dir.path().join("note.html");
    write_store(&store);
    let mut session = open(&store, &html, &Arc::new(ScriptLoadGate::new("x")));
    let mut watcher = SurfaceWatcher::new(&html, Duration::from_millis(50)).unwrap();
    std::thread::sleep(Duration::from_millis(300));

    session
        .handle(
            Message::CursorChanged(CursorSelection::new("tasks", &["rec3"])),
            100,
        )
        .unwrap();
    let remounted = fs::read_to_string(&html).unwrap();
    assert!(remounted.contains("Add some notes"), "got: {remounted}");
    watcher.acknowledge(session.surface_content().unwrap());

    // The host's own remount does not come back from the watcher...
    let deadline = Instant::now() + Duration::from_millis(800);
    while Instant::now() < deadline {
        assert_eq!(watcher.poll_change(), None);
        std::thread::sleep(Duration::from_millis(25));
    }
    // ...and an echo that reaches the session anyway is not an edit.
    session
        .handle(Message::ContentChanged(remounted), 200)
        .unwrap();

    assert!(!session.poll(10_000).unwrap());
    assert_eq!(notes_on_disk(&store, "rec3"), None);
}

#[test]
fn test_inserted_image_echo_adds_no_write() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("notes.json");
    let html = dir.path().join("note.html");
    write_store(&store);
    let mut session = open(&store, &html, &Arc::new(ScriptLoadGate::new("x")));

    session.handle(Message::ImageInsertRequested, 0).unwrap();
    session.handle(Message::ImageConfirmed(None), 10).unwrap();
    assert!(session.flush().unwrap());

    let echoed = fs::read_to_string(&html).unwrap();
    session
        .handle(Message::ContentChanged(echoed), 300)
        .unwrap();
    assert!(!session.has_pending_write());
}
