//! Line commands accepted on stdin by `richnote edit`.

use crate::host::{CursorSelection, RecordStore};
use crate::session::{EditorSession, Message, SessionError, View};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Forward straight to the session.
    Session(Message),
    /// Insert an image, optionally choosing it by filename.
    Image(Option<String>),
    /// Print the session's state.
    Status,
    /// Flush and exit.
    Quit,
}

pub const HELP: &str = "commands: save | lock | unlock | image [FILENAME] | select TABLE RECORD | status | quit";

/// Parse one input line. Blank and unknown lines yield `None`.
pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let mut words = line.split_whitespace();
    let command = match words.next()? {
        "save" | "s" => ConsoleCommand::Session(Message::SaveRequested),
        "lock" => ConsoleCommand::Session(Message::LockChanged(true)),
        "unlock" => ConsoleCommand::Session(Message::LockChanged(false)),
        "image" | "img" => {
            let name = words.collect::<Vec<_>>().join(" ");
            ConsoleCommand::Image((!name.is_empty()).then_some(name))
        }
        "select" => {
            let table = words.next()?;
            let record = words.next()?;
            ConsoleCommand::Session(Message::CursorChanged(CursorSelection::new(
                table,
                &[record],
            )))
        }
        "status" => ConsoleCommand::Status,
        "quit" | "q" | "exit" => ConsoleCommand::Quit,
        _ => return None,
    };
    Some(command)
}

/// Report a freshly mounted surface as initialized.
///
/// File surfaces are usable as soon as they are written, so the console
/// host confirms every mount itself, including the one after a record switch.
/// Returns whether a confirmation was sent.
///
/// # Errors
/// Returns an error if the session rejects the message.
pub fn confirm_surface_ready<S: RecordStore>(
    session: &mut EditorSession<S>,
    now_ms: u64,
) -> Result<bool, SessionError> {
    let View::Editor(view) = session.view() else {
        return Ok(false);
    };
    if view.initialized {
        return Ok(false);
    }
    session.handle(Message::SurfaceInitialized, now_ms)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::SessionConfig;
    use crate::gate::{LoadState, ScriptLoadGate};
    use crate::host::{ImmediateLoader, RecordRef};
    use crate::session::Collaborators;
    use crate::store::{MemoryStore, StoreData};
    use crate::surface::HtmlFileMount;

    #[test]
    fn test_session_commands() {
        assert_eq!(
            parse_command("save"),
            Some(ConsoleCommand::Session(Message::SaveRequested))
        );
        assert_eq!(
            parse_command("  lock "),
            Some(ConsoleCommand::Session(Message::LockChanged(true)))
        );
        assert_eq!(
            parse_command("unlock"),
            Some(ConsoleCommand::Session(Message::LockChanged(false)))
        );
    }

    #[test]
    fn test_image_with_and_without_name() {
        assert_eq!(parse_command("image"), Some(ConsoleCommand::Image(None)));
        assert_eq!(
            parse_command("image my photo.png"),
            Some(ConsoleCommand::Image(Some("my photo.png".to_string())))
        );
    }

    #[test]
    fn test_select_needs_table_and_record() {
        assert_eq!(parse_command("select tbl"), None);
        assert_eq!(
            parse_command("select tbl rec9"),
            Some(ConsoleCommand::Session(Message::CursorChanged(
                CursorSelection::new("tbl", &["rec9"])
            )))
        );
    }

    #[test]
    fn test_blank_and_unknown_lines() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("dance"), None);
        assert_eq!(parse_command("q"), Some(ConsoleCommand::Quit));
    }

    #[test]
    fn test_surface_confirmed_again_after_record_switch() {
        let dir = tempfile::tempdir().unwrap();
        let data: StoreData = serde_json::from_value(json!({
            "tables": { "tbl": { "rec1": { "Notes": "one" }, "rec2": { "Notes": "two" } } }
        }))
        .unwrap();
        let host = Collaborators {
            store: MemoryStore::new(data),
            mount: Box::new(HtmlFileMount::new(dir.path().join("note.html"))),
            loader: Arc::new(ImmediateLoader),
        };
        let mut session = EditorSession::new(
            SessionConfig::default(),
            Arc::new(ScriptLoadGate::new("x")),
            host,
            Some(RecordRef::new("tbl", "rec1")),
        )
        .unwrap();

        assert!(confirm_surface_ready(&mut session, 0).unwrap());
        assert!(!confirm_surface_ready(&mut session, 5).unwrap());
        assert_eq!(session.load_state(), LoadState::Initialized);

        let Some(ConsoleCommand::Session(select)) = parse_command("select tbl rec2") else {
            panic!("select should parse");
        };
        session.handle(select, 10).unwrap();
        assert_eq!(session.load_state(), LoadState::Loaded);

        assert!(confirm_surface_ready(&mut session, 20).unwrap());
        assert_eq!(session.load_state(), LoadState::Initialized);
        assert!(matches!(session.view(), View::Editor(view) if view.initialized));
    }
}
